use tandem_model::{
    FunctionCallItem, FunctionCallOutputItem, Item, MessageItem, ReasoningItem,
};

use crate::agent::AgentId;

/// An item generated during a run.
///
/// Every item remembers the agent that produced it. A run's items plus
/// its original input rebuild the next model input, see
/// [`RunItem::to_input_item`].
#[derive(Clone, Debug, PartialEq)]
pub enum RunItem {
    /// A message from the model.
    MessageOutput {
        /// The producing agent.
        agent: AgentId,
        /// The message.
        raw: MessageItem,
    },
    /// A call to a function, hosted or computer tool.
    ToolCall {
        /// The producing agent.
        agent: AgentId,
        /// The call item.
        raw: Item,
    },
    /// The output of a tool call.
    ToolCallOutput {
        /// The producing agent.
        agent: AgentId,
        /// The output item sent back to the model.
        raw: Item,
        /// The output as produced by the tool.
        output: String,
    },
    /// The model asked for a handoff.
    HandoffCall {
        /// The producing agent.
        agent: AgentId,
        /// The call item.
        raw: FunctionCallItem,
    },
    /// A handoff took place.
    HandoffOutput {
        /// The producing agent.
        agent: AgentId,
        /// The transfer output sent back to the model.
        raw: FunctionCallOutputItem,
        /// The agent handing off.
        source: AgentId,
        /// The agent taking over.
        target: AgentId,
    },
    /// A reasoning trace.
    Reasoning {
        /// The producing agent.
        agent: AgentId,
        /// The reasoning item.
        raw: ReasoningItem,
    },
}

impl RunItem {
    /// Returns the agent that produced this item.
    pub fn agent(&self) -> AgentId {
        match self {
            RunItem::MessageOutput { agent, .. }
            | RunItem::ToolCall { agent, .. }
            | RunItem::ToolCallOutput { agent, .. }
            | RunItem::HandoffCall { agent, .. }
            | RunItem::HandoffOutput { agent, .. }
            | RunItem::Reasoning { agent, .. } => *agent,
        }
    }

    /// Returns the name of the stream event that announces this item.
    pub fn event_name(&self) -> &'static str {
        match self {
            RunItem::MessageOutput { .. } => "message_output_created",
            RunItem::ToolCall { .. } => "tool_called",
            RunItem::ToolCallOutput { .. } => "tool_output",
            RunItem::HandoffCall { .. } => "handoff_requested",
            RunItem::HandoffOutput { .. } => "handoff_occured",
            RunItem::Reasoning { .. } => "reasoning_item_created",
        }
    }

    /// Converts this item into model input form.
    pub fn to_input_item(&self) -> Item {
        match self {
            RunItem::MessageOutput { raw, .. } => Item::Message(raw.clone()),
            RunItem::ToolCall { raw, .. }
            | RunItem::ToolCallOutput { raw, .. } => raw.clone(),
            RunItem::HandoffCall { raw, .. } => Item::FunctionCall(raw.clone()),
            RunItem::HandoffOutput { raw, .. } => {
                Item::FunctionCallOutput(raw.clone())
            }
            RunItem::Reasoning { raw, .. } => Item::Reasoning(raw.clone()),
        }
    }

    /// Returns the message text if this item is a message.
    pub fn text(&self) -> Option<String> {
        match self {
            RunItem::MessageOutput { raw, .. } => Some(raw.text()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentGraph;
    use crate::Agent;

    #[test]
    fn test_input_form() {
        let mut graph = AgentGraph::new();
        let agent = graph.insert(Agent::builder("a").build());

        let call = FunctionCallItem {
            id: None,
            call_id: "c1".to_owned(),
            name: "transfer_to_b".to_owned(),
            arguments: "{}".to_owned(),
        };
        let item = RunItem::HandoffCall {
            agent,
            raw: call.clone(),
        };
        assert_eq!(item.to_input_item(), Item::FunctionCall(call));
        assert_eq!(item.event_name(), "handoff_requested");
        assert_eq!(item.agent(), agent);
        assert_eq!(item.text(), None);

        let item = RunItem::MessageOutput {
            agent,
            raw: MessageItem::assistant("hi"),
        };
        assert_eq!(item.to_input_item(), Item::assistant_message("hi"));
        assert_eq!(item.text().as_deref(), Some("hi"));
    }
}
