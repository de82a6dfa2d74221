use serde::{Deserialize, Serialize};

/// The author of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// System instructions.
    System,
    /// The user.
    User,
    /// The model.
    Assistant,
}

/// Progress of an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// The item is still being produced.
    InProgress,
    /// The item is complete.
    Completed,
    /// The item was cut short, e.g. by an interruption.
    Incomplete,
}

/// A content part of a message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeContent {
    /// Text typed by the user.
    InputText {
        /// The text.
        text: String,
    },
    /// Audio spoken by the user.
    InputAudio {
        /// Base64 encoded audio, when the transport keeps it.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audio: Option<String>,
        /// The transcript, once transcription completed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transcript: Option<String>,
    },
    /// Text produced by the model.
    Text {
        /// The text.
        text: String,
    },
    /// Audio produced by the model.
    Audio {
        /// Base64 encoded audio, when the transport keeps it.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audio: Option<String>,
        /// What the model said.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transcript: Option<String>,
    },
}

/// A message of the conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RealtimeMessageItem {
    /// Unique ID of the item.
    pub item_id: String,
    /// The item this one follows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_item_id: Option<String>,
    /// The author.
    pub role: Role,
    /// The content parts.
    pub content: Vec<RealtimeContent>,
    /// Progress of the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
}

/// A tool call made by the model, together with its output once known.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RealtimeToolCallItem {
    /// Unique ID of the item.
    pub item_id: String,
    /// The item this one follows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_item_id: Option<String>,
    /// ID of the call, echoed by its output.
    pub call_id: String,
    /// Name of the called tool.
    pub name: String,
    /// JSON encoded arguments.
    pub arguments: String,
    /// Output of the tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Progress of the call.
    pub status: ItemStatus,
}

/// An entry of the conversation history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeItem {
    /// A message.
    Message(RealtimeMessageItem),
    /// A tool call.
    ToolCall(RealtimeToolCallItem),
}

impl RealtimeItem {
    /// Creates a completed user message with a single text part.
    pub fn user_text<S1, S2>(item_id: S1, text: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        RealtimeItem::Message(RealtimeMessageItem {
            item_id: item_id.into(),
            previous_item_id: None,
            role: Role::User,
            content: vec![RealtimeContent::InputText { text: text.into() }],
            status: Some(ItemStatus::Completed),
        })
    }

    /// Returns the unique ID of the item.
    #[inline]
    pub fn item_id(&self) -> &str {
        match self {
            RealtimeItem::Message(msg) => &msg.item_id,
            RealtimeItem::ToolCall(call) => &call.item_id,
        }
    }

    /// Returns the item this one follows.
    #[inline]
    pub fn previous_item_id(&self) -> Option<&str> {
        match self {
            RealtimeItem::Message(msg) => msg.previous_item_id.as_deref(),
            RealtimeItem::ToolCall(call) => call.previous_item_id.as_deref(),
        }
    }

    /// Sets the item this one follows.
    pub fn with_previous_item_id<S: Into<String>>(mut self, id: S) -> Self {
        let id = Some(id.into());
        match &mut self {
            RealtimeItem::Message(msg) => msg.previous_item_id = id,
            RealtimeItem::ToolCall(call) => call.previous_item_id = id,
        }
        self
    }
}
