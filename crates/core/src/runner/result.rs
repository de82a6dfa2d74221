use std::fmt::{self, Debug};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tandem_model::{Item, ModelResponse};

use crate::agent::{Agent, AgentGraph, AgentId};
use crate::guardrail::{InputGuardrailResult, OutputGuardrailResult};
use crate::items::RunItem;
use crate::{Error, Result, RunContext};

/// The result of a completed run.
#[derive(Clone)]
pub struct RunResult {
    /// The run input, as the last agent saw it.
    pub input: Vec<Item>,
    /// Items generated during the run.
    pub new_items: Vec<RunItem>,
    /// Every model response, in call order.
    pub raw_responses: Vec<ModelResponse>,
    /// The final output: a string for plain text agents, the validated
    /// value for agents with an output schema.
    pub final_output: Value,
    /// Results of the input guardrails.
    pub input_guardrail_results: Vec<InputGuardrailResult>,
    /// Results of the output guardrails.
    pub output_guardrail_results: Vec<OutputGuardrailResult>,
    /// The agent that produced the final output.
    pub last_agent_id: AgentId,
    /// The context of the run, including the accumulated usage.
    pub context: RunContext,
    pub(crate) graph: Arc<AgentGraph>,
}

impl RunResult {
    /// Returns the agent that produced the final output.
    #[inline]
    pub fn last_agent(&self) -> &Agent {
        &self.graph[self.last_agent_id]
    }

    /// Returns the final output if it is plain text.
    #[inline]
    pub fn final_output_text(&self) -> Option<&str> {
        self.final_output.as_str()
    }

    /// Deserializes the final output into `T`.
    pub fn final_output_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.final_output.clone()).map_err(|err| {
            Error::user(format!("final output has an unexpected type: {err}"))
        })
    }

    /// Rebuilds a model input from the run input and the generated items,
    /// e.g. to continue the conversation in another run.
    pub fn to_input_list(&self) -> Vec<Item> {
        self.input
            .iter()
            .cloned()
            .chain(self.new_items.iter().map(RunItem::to_input_item))
            .collect()
    }

    /// Returns the identifier of the last model response, if the provider
    /// assigned one.
    pub fn last_response_id(&self) -> Option<&str> {
        self.raw_responses.last()?.response_id.as_deref()
    }
}

impl Debug for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunResult")
            .field("final_output", &self.final_output)
            .field("new_items", &self.new_items.len())
            .field("raw_responses", &self.raw_responses.len())
            .field("last_agent_id", &self.last_agent_id)
            .finish_non_exhaustive()
    }
}
