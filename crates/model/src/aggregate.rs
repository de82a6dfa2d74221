use std::error::Error;
use std::fmt::{self, Display};

use crate::items::{ContentPart, Item};
use crate::response::{ModelResponse, ResponseStreamEvent};

/// A stream that broke the event ordering contract.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AggregateError {
    reason: String,
}

impl AggregateError {
    #[inline]
    fn new<S: Into<String>>(reason: S) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Returns why the stream was rejected.
    #[inline]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed response stream: {}", self.reason)
    }
}

impl Error for AggregateError {}

/// Rebuilds output items from a stream of [`ResponseStreamEvent`]s while
/// checking that the events arrive in the documented order.
///
/// Text deltas are appended to their content part and argument deltas of
/// the same call are concatenated in arrival order. Model implementors
/// that talk to delta-only protocols can use [`Self::items`] to assemble
/// the `Completed` event; consumers use it to validate what they receive.
#[derive(Clone, Debug, Default)]
pub struct ResponseAggregator {
    created: bool,
    response_id: Option<String>,
    items: Vec<Item>,
    completed: Option<ModelResponse>,
}

impl ResponseAggregator {
    /// Creates an empty aggregator.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the next event of the stream.
    pub fn apply(
        &mut self,
        event: &ResponseStreamEvent,
    ) -> Result<(), AggregateError> {
        if self.completed.is_some() {
            return Err(AggregateError::new("event after completion"));
        }

        match event {
            ResponseStreamEvent::Created { response_id } => {
                if self.created {
                    return Err(AggregateError::new("duplicated created event"));
                }
                self.created = true;
                self.response_id = response_id.clone();
                return Ok(());
            }
            _ if !self.created => {
                return Err(AggregateError::new("event before created event"));
            }
            ResponseStreamEvent::OutputItemAdded { output_index, item } => {
                if *output_index != self.items.len() {
                    return Err(AggregateError::new(format!(
                        "output item {output_index} added out of order"
                    )));
                }
                self.items.push(item.clone());
            }
            ResponseStreamEvent::ContentPartAdded {
                output_index,
                content_index,
            } => {
                let content = self.message_content(*output_index)?;
                if *content_index != content.len() {
                    return Err(AggregateError::new(format!(
                        "content part {content_index} added out of order"
                    )));
                }
                content.push(ContentPart::OutputText {
                    text: String::new(),
                });
            }
            ResponseStreamEvent::OutputTextDelta {
                output_index,
                content_index,
                delta,
            } => {
                let content = self.message_content(*output_index)?;
                match content.get_mut(*content_index) {
                    Some(ContentPart::OutputText { text }) => {
                        text.push_str(delta);
                    }
                    _ => {
                        return Err(AggregateError::new(format!(
                            "text delta for unknown part {content_index}"
                        )));
                    }
                }
            }
            ResponseStreamEvent::FunctionCallArgumentsDelta {
                output_index,
                delta,
            } => match self.items.get_mut(*output_index) {
                Some(Item::FunctionCall(call)) => {
                    call.arguments.push_str(delta);
                }
                _ => {
                    return Err(AggregateError::new(format!(
                        "arguments delta for non-call item {output_index}"
                    )));
                }
            },
            ResponseStreamEvent::ContentPartDone {
                output_index,
                content_index,
                part,
            } => {
                let content = self.message_content(*output_index)?;
                let Some(slot) = content.get_mut(*content_index) else {
                    return Err(AggregateError::new(format!(
                        "unknown content part {content_index} done"
                    )));
                };
                *slot = part.clone();
            }
            ResponseStreamEvent::OutputItemDone { output_index, item } => {
                let Some(slot) = self.items.get_mut(*output_index) else {
                    return Err(AggregateError::new(format!(
                        "unknown output item {output_index} done"
                    )));
                };
                *slot = item.clone();
            }
            ResponseStreamEvent::Completed(response) => {
                self.completed = Some(response.clone());
            }
        }
        Ok(())
    }

    /// Returns the items assembled so far.
    #[inline]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Returns the response identifier announced by the created event.
    #[inline]
    pub fn response_id(&self) -> Option<&str> {
        self.response_id.as_deref()
    }

    /// Consumes the aggregator and returns the final response.
    ///
    /// A stream that ended without a `Completed` event is malformed.
    pub fn finish(self) -> Result<ModelResponse, AggregateError> {
        self.completed
            .ok_or_else(|| AggregateError::new("missing final model response"))
    }

    fn message_content(
        &mut self,
        output_index: usize,
    ) -> Result<&mut Vec<ContentPart>, AggregateError> {
        match self.items.get_mut(output_index) {
            Some(Item::Message(msg)) => Ok(&mut msg.content),
            _ => Err(AggregateError::new(format!(
                "content event for non-message item {output_index}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::MessageItem;
    use crate::usage::Usage;

    fn created() -> ResponseStreamEvent {
        ResponseStreamEvent::Created {
            response_id: Some("resp_1".to_owned()),
        }
    }

    #[test]
    fn test_concatenates_argument_deltas() {
        let mut aggregator = ResponseAggregator::new();
        aggregator.apply(&created()).unwrap();
        aggregator
            .apply(&ResponseStreamEvent::OutputItemAdded {
                output_index: 0,
                item: Item::function_call("call_1", "lookup", ""),
            })
            .unwrap();
        for delta in ["{\"ci", "ty\": ", "\"Paris\"}"] {
            aggregator
                .apply(&ResponseStreamEvent::FunctionCallArgumentsDelta {
                    output_index: 0,
                    delta: delta.to_owned(),
                })
                .unwrap();
        }

        let Item::FunctionCall(call) = &aggregator.items()[0] else {
            panic!("unexpected item");
        };
        assert_eq!(call.arguments, "{\"city\": \"Paris\"}");
        assert_eq!(aggregator.response_id(), Some("resp_1"));
    }

    #[test]
    fn test_text_deltas() {
        let mut aggregator = ResponseAggregator::new();
        let mut msg = MessageItem::assistant("");
        msg.content.clear();
        let events = [
            created(),
            ResponseStreamEvent::OutputItemAdded {
                output_index: 0,
                item: Item::Message(msg),
            },
            ResponseStreamEvent::ContentPartAdded {
                output_index: 0,
                content_index: 0,
            },
            ResponseStreamEvent::OutputTextDelta {
                output_index: 0,
                content_index: 0,
                delta: "Hi, ".to_owned(),
            },
            ResponseStreamEvent::OutputTextDelta {
                output_index: 0,
                content_index: 0,
                delta: "there".to_owned(),
            },
        ];
        for event in &events {
            aggregator.apply(event).unwrap();
        }
        assert_eq!(
            Item::last_text_output(aggregator.items()).as_deref(),
            Some("Hi, there")
        );
    }

    #[test]
    fn test_rejects_out_of_order_events() {
        let mut aggregator = ResponseAggregator::new();
        let err = aggregator
            .apply(&ResponseStreamEvent::OutputItemAdded {
                output_index: 0,
                item: Item::assistant_message("x"),
            })
            .unwrap_err();
        assert!(err.reason().contains("before created"));

        let mut aggregator = ResponseAggregator::new();
        aggregator.apply(&created()).unwrap();
        assert!(
            aggregator
                .apply(&ResponseStreamEvent::FunctionCallArgumentsDelta {
                    output_index: 3,
                    delta: "{}".to_owned(),
                })
                .is_err()
        );
    }

    #[test]
    fn test_requires_completed_event() {
        let mut aggregator = ResponseAggregator::new();
        aggregator.apply(&created()).unwrap();
        assert!(aggregator.clone().finish().is_err());

        let response = ModelResponse {
            output: vec![],
            usage: Usage::default(),
            response_id: None,
        };
        aggregator
            .apply(&ResponseStreamEvent::Completed(response.clone()))
            .unwrap();
        assert!(aggregator.apply(&created()).is_err());
        assert_eq!(aggregator.finish().unwrap(), response);
    }
}
