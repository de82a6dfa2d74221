//! Ready-made [`HandoffInputFilter`](super::HandoffInputFilter)s.

use tandem_model::Item;

use super::HandoffInputData;
use crate::items::RunItem;

/// Removes every tool call and tool output from the conversation, so the
/// next agent only sees messages and reasoning.
pub fn remove_all_tools(data: HandoffInputData) -> HandoffInputData {
    HandoffInputData {
        input_history: data
            .input_history
            .into_iter()
            .filter(|item| !is_tool_item(item))
            .collect(),
        pre_handoff_items: remove_tool_run_items(data.pre_handoff_items),
        new_items: remove_tool_run_items(data.new_items),
    }
}

fn is_tool_item(item: &Item) -> bool {
    matches!(
        item,
        Item::FunctionCall(_)
            | Item::FunctionCallOutput(_)
            | Item::ComputerCall(_)
            | Item::ComputerCallOutput(_)
            | Item::FileSearchCall(_)
            | Item::WebSearchCall(_)
    )
}

fn remove_tool_run_items(items: Vec<RunItem>) -> Vec<RunItem> {
    items
        .into_iter()
        .filter(|item| {
            !matches!(
                item,
                RunItem::ToolCall { .. }
                    | RunItem::ToolCallOutput { .. }
                    | RunItem::HandoffCall { .. }
                    | RunItem::HandoffOutput { .. }
            )
        })
        .collect()
}
