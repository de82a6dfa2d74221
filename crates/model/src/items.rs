use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The author of a message item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// Developer instructions.
    Developer,
    /// The end user.
    User,
    /// The model.
    Assistant,
}

/// A typed part of a message's content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text written by the user, system or developer.
    InputText {
        /// The text.
        text: String,
    },
    /// An image attached by the user.
    InputImage {
        /// URL (or data URL) of the image.
        image_url: String,
    },
    /// Text generated by the model.
    OutputText {
        /// The text.
        text: String,
    },
    /// The model refused to answer.
    Refusal {
        /// The refusal explanation.
        refusal: String,
    },
}

impl ContentPart {
    /// Returns the text carried by this part, if it is a text part.
    #[inline]
    pub fn text(&self) -> Option<&str> {
        match self {
            ContentPart::InputText { text } | ContentPart::OutputText { text } => {
                Some(text.as_str())
            }
            ContentPart::InputImage { .. } | ContentPart::Refusal { .. } => {
                None
            }
        }
    }
}

/// A message in the conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageItem {
    /// Provider-assigned identifier, absent for caller-authored messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Who wrote the message.
    pub role: Role,
    /// Ordered content parts.
    pub content: Vec<ContentPart>,
}

impl MessageItem {
    /// Creates a user message with a single text part.
    #[inline]
    pub fn user<S: Into<String>>(text: S) -> Self {
        Self {
            id: None,
            role: Role::User,
            content: vec![ContentPart::InputText { text: text.into() }],
        }
    }

    /// Creates a system message with a single text part.
    #[inline]
    pub fn system<S: Into<String>>(text: S) -> Self {
        Self {
            id: None,
            role: Role::System,
            content: vec![ContentPart::InputText { text: text.into() }],
        }
    }

    /// Creates an assistant message with a single output text part.
    #[inline]
    pub fn assistant<S: Into<String>>(text: S) -> Self {
        Self {
            id: None,
            role: Role::Assistant,
            content: vec![ContentPart::OutputText { text: text.into() }],
        }
    }

    /// Concatenates every text part of this message.
    pub fn text(&self) -> String {
        self.content.iter().filter_map(ContentPart::text).collect()
    }

    /// Returns the refusal, if the model refused to answer.
    pub fn refusal(&self) -> Option<&str> {
        self.content.iter().find_map(|part| match part {
            ContentPart::Refusal { refusal } => Some(refusal.as_str()),
            _ => None,
        })
    }
}

/// A function call requested by the model.
///
/// Handoffs are exposed to the model as functions too, so a handoff request
/// arrives as a `FunctionCallItem` whose name matches a handoff tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallItem {
    /// Provider-assigned item identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Identifier that links the call with its output.
    pub call_id: String,
    /// Name of the function.
    pub name: String,
    /// JSON-encoded arguments, exactly as produced by the model.
    pub arguments: String,
}

/// The result of a function call, sent back to the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionCallOutputItem {
    /// The call this output answers.
    pub call_id: String,
    /// The output text.
    pub output: String,
}

/// A reasoning trace produced by the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReasoningItem {
    /// Provider-assigned item identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Summary parts of the reasoning.
    #[serde(default)]
    pub summary: Vec<String>,
}

/// A call to a tool that the provider runs on its own side, e.g. file
/// search or web search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HostedToolCallItem {
    /// Provider-assigned item identifier.
    pub id: String,
    /// Provider-reported status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Provider-specific details (queries, results, ...).
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

/// A mouse button used by computer actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    /// Left button.
    Left,
    /// Right button.
    Right,
    /// Wheel button.
    Wheel,
    /// Back button.
    Back,
    /// Forward button.
    Forward,
}

/// A point on the screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: i64,
    /// Vertical coordinate.
    pub y: i64,
}

/// An action the model wants to perform on a computer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComputerAction {
    /// Click at a position.
    Click {
        /// Horizontal coordinate.
        x: i64,
        /// Vertical coordinate.
        y: i64,
        /// Which button to press.
        button: MouseButton,
    },
    /// Double click at a position.
    DoubleClick {
        /// Horizontal coordinate.
        x: i64,
        /// Vertical coordinate.
        y: i64,
    },
    /// Drag the mouse along a path.
    Drag {
        /// The path to follow.
        path: Vec<Point>,
    },
    /// Press a key combination.
    Keypress {
        /// Keys to press together.
        keys: Vec<String>,
    },
    /// Move the mouse.
    Move {
        /// Horizontal coordinate.
        x: i64,
        /// Vertical coordinate.
        y: i64,
    },
    /// Take a screenshot.
    Screenshot,
    /// Scroll at a position.
    Scroll {
        /// Horizontal coordinate.
        x: i64,
        /// Vertical coordinate.
        y: i64,
        /// Horizontal scroll distance.
        scroll_x: i64,
        /// Vertical scroll distance.
        scroll_y: i64,
    },
    /// Type text.
    Type {
        /// The text to type.
        text: String,
    },
    /// Wait for a moment.
    Wait,
}

/// A computer action requested by the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComputerCallItem {
    /// Provider-assigned item identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Identifier that links the call with its output.
    pub call_id: String,
    /// The action to perform.
    pub action: ComputerAction,
}

/// The screenshot taken after a computer action.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComputerCallOutputItem {
    /// The call this output answers.
    pub call_id: String,
    /// A `data:image/png;base64,...` URL of the screenshot.
    pub image_url: String,
}

/// An item of model input or output.
///
/// The same union is used in both directions: whatever a model emits can be
/// fed back verbatim as input of the next request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Item {
    /// A message.
    Message(MessageItem),
    /// A function (or handoff) call.
    FunctionCall(FunctionCallItem),
    /// The output of a function call.
    FunctionCallOutput(FunctionCallOutputItem),
    /// A reasoning trace.
    Reasoning(ReasoningItem),
    /// A hosted file search call.
    FileSearchCall(HostedToolCallItem),
    /// A hosted web search call.
    WebSearchCall(HostedToolCallItem),
    /// A computer action.
    ComputerCall(ComputerCallItem),
    /// The screenshot answering a computer action.
    ComputerCallOutput(ComputerCallOutputItem),
}

impl Item {
    /// Creates a user message item.
    #[inline]
    pub fn user_message<S: Into<String>>(text: S) -> Self {
        Item::Message(MessageItem::user(text))
    }

    /// Creates an assistant message item.
    #[inline]
    pub fn assistant_message<S: Into<String>>(text: S) -> Self {
        Item::Message(MessageItem::assistant(text))
    }

    /// Creates a function call item.
    #[inline]
    pub fn function_call<S1, S2, S3>(call_id: S1, name: S2, arguments: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Item::FunctionCall(FunctionCallItem {
            id: None,
            call_id: call_id.into(),
            name: name.into(),
            arguments: arguments.into(),
        })
    }

    /// Creates a function call output item.
    #[inline]
    pub fn function_call_output<S1, S2>(call_id: S1, output: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Item::FunctionCallOutput(FunctionCallOutputItem {
            call_id: call_id.into(),
            output: output.into(),
        })
    }

    /// Returns the message if this item is one.
    #[inline]
    pub fn as_message(&self) -> Option<&MessageItem> {
        match self {
            Item::Message(msg) => Some(msg),
            _ => None,
        }
    }

    /// Returns the concatenated text of the last assistant message in
    /// `items`, if any.
    pub fn last_text_output(items: &[Item]) -> Option<String> {
        items
            .iter()
            .rev()
            .filter_map(Item::as_message)
            .find(|msg| msg.role == Role::Assistant)
            .map(MessageItem::text)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_wire_shape() {
        let item = Item::function_call("call_1", "get_weather", "{}");
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "function_call",
                "call_id": "call_1",
                "name": "get_weather",
                "arguments": "{}",
            })
        );

        let msg: Item = serde_json::from_value(json!({
            "type": "message",
            "role": "assistant",
            "content": [
                { "type": "output_text", "text": "Hello, " },
                { "type": "output_text", "text": "world" },
            ],
        }))
        .unwrap();
        assert_eq!(msg.as_message().unwrap().text(), "Hello, world");
    }

    #[test]
    fn test_computer_action() {
        let item: Item = serde_json::from_value(json!({
            "type": "computer_call",
            "call_id": "c1",
            "action": { "type": "click", "x": 3, "y": 4, "button": "left" },
        }))
        .unwrap();
        let Item::ComputerCall(call) = item else {
            panic!("unexpected item: {item:?}");
        };
        assert_eq!(
            call.action,
            ComputerAction::Click {
                x: 3,
                y: 4,
                button: MouseButton::Left
            }
        );
    }

    #[test]
    fn test_last_text_output() {
        let items = vec![
            Item::assistant_message("first"),
            Item::function_call("c", "f", "{}"),
            Item::assistant_message("second"),
            Item::user_message("not me"),
        ];
        assert_eq!(Item::last_text_output(&items).as_deref(), Some("second"));
        assert_eq!(Item::last_text_output(&[]), None);
    }
}
