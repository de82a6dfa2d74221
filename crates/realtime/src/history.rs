use crate::items::{ItemStatus, RealtimeContent, RealtimeItem, Role};

/// The ordered conversation history of a realtime session.
///
/// Item IDs are unique: updating an item replaces it where it stands.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct History {
    items: Vec<RealtimeItem>,
}

impl History {
    /// Creates an empty history.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the items in conversation order.
    #[inline]
    pub fn items(&self) -> &[RealtimeItem] {
        &self.items
    }

    /// Returns the item with the given ID.
    pub fn get(&self, item_id: &str) -> Option<&RealtimeItem> {
        self.items.iter().find(|item| item.item_id() == item_id)
    }

    /// Returns the number of items.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if there are no items.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Applies an updated item.
    ///
    /// An existing item is replaced in place. A new item is inserted right
    /// after its previous item, or appended when that one is unknown.
    /// Returns `true` if the item is new.
    pub fn upsert(&mut self, item: RealtimeItem) -> bool {
        if let Some(pos) = self.position(item.item_id()) {
            self.items[pos] = item;
            return false;
        }
        let after = item.previous_item_id().and_then(|id| self.position(id));
        match after {
            Some(pos) => self.items.insert(pos + 1, item),
            None => self.items.push(item),
        }
        true
    }

    /// Removes an item, returning `true` if it existed.
    pub fn remove(&mut self, item_id: &str) -> bool {
        let len = self.items.len();
        self.items.retain(|item| item.item_id() != item_id);
        self.items.len() != len
    }

    /// Merges a completed input transcription into the audio parts of a
    /// user message and marks the message completed.
    ///
    /// Returns `false` if no such user message exists.
    pub fn merge_transcript(
        &mut self,
        item_id: &str,
        transcript: &str,
    ) -> bool {
        let Some(pos) = self.position(item_id) else {
            return false;
        };
        let RealtimeItem::Message(msg) = &mut self.items[pos] else {
            return false;
        };
        if msg.role != Role::User {
            return false;
        }
        for part in &mut msg.content {
            if let RealtimeContent::InputAudio { transcript: t, .. } = part {
                *t = Some(transcript.to_owned());
            }
        }
        msg.status = Some(ItemStatus::Completed);
        true
    }

    fn position(&self, item_id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.item_id() == item_id)
    }
}

impl From<History> for Vec<RealtimeItem> {
    #[inline]
    fn from(history: History) -> Self {
        history.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::RealtimeMessageItem;

    fn ids(history: &History) -> Vec<&str> {
        history.items().iter().map(RealtimeItem::item_id).collect()
    }

    fn audio_message(item_id: &str) -> RealtimeItem {
        RealtimeItem::Message(RealtimeMessageItem {
            item_id: item_id.to_owned(),
            previous_item_id: None,
            role: Role::User,
            content: vec![RealtimeContent::InputAudio {
                audio: None,
                transcript: None,
            }],
            status: Some(ItemStatus::InProgress),
        })
    }

    #[test]
    fn test_upsert_ordering() {
        let mut history = History::new();
        assert!(history.upsert(RealtimeItem::user_text("a", "1")));
        assert!(history.upsert(RealtimeItem::user_text("c", "3")));
        let b = RealtimeItem::user_text("b", "2").with_previous_item_id("a");
        assert!(history.upsert(b));
        assert_eq!(ids(&history), ["a", "b", "c"]);

        // Unknown previous items append.
        let d = RealtimeItem::user_text("d", "4").with_previous_item_id("x");
        assert!(history.upsert(d));
        assert_eq!(ids(&history), ["a", "b", "c", "d"]);

        // Updates keep the position, whatever the previous item says.
        let updated =
            RealtimeItem::user_text("b", "two").with_previous_item_id("d");
        assert!(!history.upsert(updated.clone()));
        assert_eq!(ids(&history), ["a", "b", "c", "d"]);
        assert_eq!(history.get("b"), Some(&updated));
    }

    #[test]
    fn test_remove() {
        let mut history = History::new();
        history.upsert(RealtimeItem::user_text("a", "1"));
        history.upsert(RealtimeItem::user_text("b", "2"));
        assert!(history.remove("a"));
        assert!(!history.remove("a"));
        assert_eq!(ids(&history), ["b"]);
    }

    #[test]
    fn test_merge_transcript() {
        let mut history = History::new();
        history.upsert(audio_message("a"));
        assert!(history.merge_transcript("a", "hello there"));
        assert!(!history.merge_transcript("missing", "hello"));

        let Some(RealtimeItem::Message(msg)) = history.get("a") else {
            panic!("the message is gone");
        };
        assert_eq!(msg.status, Some(ItemStatus::Completed));
        assert_eq!(
            msg.content,
            [RealtimeContent::InputAudio {
                audio: None,
                transcript: Some("hello there".to_owned()),
            }]
        );
    }
}
