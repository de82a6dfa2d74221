//! Classification of a model response into run items and pending work.

use std::collections::HashMap;

use serde_json::Value;
use tandem_model::{ComputerCallItem, FunctionCallItem, Item, ModelResponse};

use crate::agent::{Agent, AgentId};
use crate::handoff::Handoff;
use crate::items::RunItem;
use crate::tool::{ComputerTool, FunctionTool, ToolSet};
use crate::{Error, Result};

/// What the run does after a turn.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum NextStep {
    /// The current agent produced the final output.
    FinalOutput(Value),
    /// Control moves to another agent.
    Handoff(AgentId),
    /// The current agent runs another turn.
    RunAgain,
}

/// The outcome of one turn.
pub(crate) struct SingleStepResult {
    /// The run input, possibly rewritten by a handoff filter.
    pub original_input: Vec<Item>,
    pub model_response: ModelResponse,
    /// Items generated before this turn.
    pub pre_step_items: Vec<RunItem>,
    /// Items generated by this turn.
    pub new_step_items: Vec<RunItem>,
    pub next_step: NextStep,
}

pub(crate) struct ToolRunFunction {
    pub call: FunctionCallItem,
    pub tool: FunctionTool,
}

pub(crate) struct ToolRunComputerAction {
    pub call: ComputerCallItem,
    pub tool: ComputerTool,
}

pub(crate) struct ToolRunHandoff {
    pub call: FunctionCallItem,
    pub handoff: Handoff,
}

/// A model response sorted into items to record and work to do.
#[derive(Default)]
pub(crate) struct ProcessedResponse {
    pub new_items: Vec<RunItem>,
    pub handoffs: Vec<ToolRunHandoff>,
    pub functions: Vec<ToolRunFunction>,
    pub computer_actions: Vec<ToolRunComputerAction>,
    /// Names of every tool the model called, handoffs included.
    pub tools_used: Vec<String>,
}

impl ProcessedResponse {
    /// Returns `true` if local tools must run before the turn can end.
    #[inline]
    pub fn has_tools_to_run(&self) -> bool {
        !self.functions.is_empty() || !self.computer_actions.is_empty()
    }

    fn push_hosted_call(&mut self, agent: AgentId, item: &Item, name: &str) {
        self.tools_used.push(name.to_owned());
        self.new_items.push(RunItem::ToolCall {
            agent,
            raw: item.clone(),
        });
    }

    /// Returns the text of the last message, if it has any.
    pub fn last_message_text(&self) -> Option<String> {
        self.new_items
            .iter()
            .rev()
            .find_map(RunItem::text)
            .filter(|text| !text.is_empty())
    }
}

/// Sorts the output items of a model response.
///
/// Function calls are matched against the handoffs first, then against the
/// function tools. A call matching neither is a model behavior error.
pub(crate) fn process_model_response(
    agent_id: AgentId,
    agent: &Agent,
    output: &[Item],
    tools: &ToolSet,
    handoffs: &[Handoff],
) -> Result<ProcessedResponse> {
    let handoff_map: HashMap<_, _> = handoffs
        .iter()
        .map(|handoff| (handoff.tool_name(), handoff))
        .collect();

    let mut processed = ProcessedResponse::default();
    for item in output {
        match item {
            Item::Message(msg) => {
                processed.new_items.push(RunItem::MessageOutput {
                    agent: agent_id,
                    raw: msg.clone(),
                });
            }
            Item::FileSearchCall(_) => {
                processed.push_hosted_call(agent_id, item, "file_search");
            }
            Item::WebSearchCall(_) => {
                processed.push_hosted_call(agent_id, item, "web_search");
            }
            Item::Reasoning(reasoning) => {
                processed.new_items.push(RunItem::Reasoning {
                    agent: agent_id,
                    raw: reasoning.clone(),
                });
            }
            Item::ComputerCall(call) => {
                let Some(tool) = tools.computer() else {
                    return Err(Error::model_behavior(
                        "Model produced computer action without a computer \
                         tool.",
                    ));
                };
                processed.tools_used.push("computer_use_preview".to_owned());
                processed.new_items.push(RunItem::ToolCall {
                    agent: agent_id,
                    raw: item.clone(),
                });
                processed.computer_actions.push(ToolRunComputerAction {
                    call: call.clone(),
                    tool: tool.clone(),
                });
            }
            Item::FunctionCall(call) => {
                processed.tools_used.push(call.name.clone());
                if let Some(handoff) = handoff_map.get(call.name.as_str()) {
                    processed.new_items.push(RunItem::HandoffCall {
                        agent: agent_id,
                        raw: call.clone(),
                    });
                    processed.handoffs.push(ToolRunHandoff {
                        call: call.clone(),
                        handoff: (*handoff).clone(),
                    });
                    continue;
                }

                let Some(tool) = tools.function(&call.name) else {
                    error!("unknown tool `{}` in `{}`", call.name, agent.name);
                    return Err(Error::model_behavior(format!(
                        "Tool {} not found in agent {}",
                        call.name,
                        agent.name()
                    )));
                };
                processed.new_items.push(RunItem::ToolCall {
                    agent: agent_id,
                    raw: item.clone(),
                });
                processed.functions.push(ToolRunFunction {
                    call: call.clone(),
                    tool: tool.clone(),
                });
            }
            Item::FunctionCallOutput(_) | Item::ComputerCallOutput(_) => {
                warn!("unexpected tool output item in model response");
            }
        }
    }
    Ok(processed)
}
