use serde::{Deserialize, Serialize};
use serde_json::Value;
use tandem_model::{ErrorKind, Item, Usage};

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    /// A text delta. Consecutive deltas form a single assistant message.
    #[serde(rename = "message_delta")]
    MessageDelta(String),
    /// A function (or handoff) call.
    #[serde(rename = "function_call")]
    FunctionCall {
        /// Identifier of the call.
        call_id: String,
        /// Name of the function.
        name: String,
        /// Arguments, encoded as JSON text before being sent.
        arguments: Value,
    },
    /// An arbitrary output item.
    #[serde(rename = "item")]
    Item(Item),
}

impl PresetEvent {
    /// Creates a function call event.
    #[inline]
    pub fn function_call<S1, S2>(call_id: S1, name: S2, arguments: Value) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self::FunctionCall {
            call_id: call_id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// The preset response for one model turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// Usage reported with the response. Defaults to a single request.
    #[serde(default)]
    pub usage: Option<Usage>,
    /// If set, a streamed response fails with this error kind right before
    /// its `Completed` event.
    #[serde(default)]
    pub stream_failure: Option<ErrorKind>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            usage: None,
            stream_failure: None,
        }
    }

    /// Creates a response with a single assistant message.
    #[inline]
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::with_events([PresetEvent::MessageDelta(text.into())])
    }

    /// Sets the usage reported with the response.
    #[inline]
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Makes the streamed variant of this response fail before completing.
    #[inline]
    pub fn with_stream_failure(mut self, kind: ErrorKind) -> Self {
        self.stream_failure = Some(kind);
        self
    }

    /// Converts the events into output items.
    pub fn output(&self) -> Vec<Item> {
        let mut output = Vec::new();
        let mut text: Option<String> = None;
        for event in &self.events {
            match event {
                PresetEvent::MessageDelta(delta) => {
                    text.get_or_insert_with(String::new).push_str(delta);
                    continue;
                }
                PresetEvent::FunctionCall {
                    call_id,
                    name,
                    arguments,
                } => {
                    if let Some(text) = text.take() {
                        output.push(Item::assistant_message(text));
                    }
                    output.push(Item::function_call(
                        call_id.as_str(),
                        name.as_str(),
                        arguments.to_string(),
                    ));
                }
                PresetEvent::Item(item) => {
                    if let Some(text) = text.take() {
                        output.push(Item::assistant_message(text));
                    }
                    output.push(item.clone());
                }
            }
        }
        if let Some(text) = text {
            output.push(Item::assistant_message(text));
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_serialize_deserialize() {
        let response = PresetResponse::with_events([
            PresetEvent::MessageDelta(
                "I have left a message for you.".to_string(),
            ),
            PresetEvent::function_call(
                "1",
                "write_file",
                json!({
                    "filename": "message.txt",
                    "content": "Hello, world!"
                }),
            ),
        ]);

        let serialized = serde_json::to_string(&response).unwrap();
        let deserialized: PresetResponse =
            serde_json::from_str(&serialized).unwrap();

        assert_eq!(response, deserialized);
    }

    #[test]
    fn test_output_groups_deltas() {
        let response = PresetResponse::with_events([
            PresetEvent::MessageDelta("Sure, ".to_owned()),
            PresetEvent::MessageDelta("one moment.".to_owned()),
            PresetEvent::function_call("c1", "lookup", json!({})),
            PresetEvent::MessageDelta("Done".to_owned()),
        ]);
        let output = response.output();
        assert_eq!(output.len(), 3);
        assert_eq!(output[0].as_message().unwrap().text(), "Sure, one moment.");
        assert_eq!(output[1], Item::function_call("c1", "lookup", "{}"));
        assert_eq!(Item::last_text_output(&output).as_deref(), Some("Done"));
    }
}
