mod builder;
mod graph;

use std::future::ready;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all};
use serde_json::Value;
use tandem_model::ModelSettings;

pub use builder::AgentBuilder;
pub use graph::{AgentGraph, AgentId};

use crate::guardrail::{InputGuardrail, OutputGuardrail};
use crate::handoff::{Handoff, HandoffTarget};
use crate::hooks::AgentHooks;
use crate::mcp::{McpServer, all_mcp_tools};
use crate::model_client::ModelClient;
use crate::output::OutputSchema;
use crate::tool::{AgentTool, FunctionToolResult, ToolSet};
use crate::{Result, RunContext};

#[rustfmt::skip]
type InstructionsFn =
    Arc<dyn Fn(&RunContext, &Agent) -> BoxFuture<'static, String> + Send + Sync>;

/// The system prompt of an agent.
#[derive(Clone)]
pub enum Instructions {
    /// A literal prompt.
    Static(String),
    /// A prompt computed from the run context and the agent.
    Dynamic(InstructionsFn),
}

impl Instructions {
    /// Computes the prompt with a synchronous function.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&RunContext, &Agent) -> String + Send + Sync + 'static,
    {
        Self::Dynamic(Arc::new(move |ctx: &RunContext, agent: &Agent| {
            ready(f(ctx, agent)).boxed()
        }))
    }

    /// Computes the prompt with an asynchronous function.
    pub fn from_async_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(&RunContext, &Agent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        Self::Dynamic(Arc::new(move |ctx: &RunContext, agent: &Agent| {
            f(ctx, agent).boxed()
        }))
    }
}

impl From<&str> for Instructions {
    #[inline]
    fn from(value: &str) -> Self {
        Instructions::Static(value.to_owned())
    }
}

impl From<String> for Instructions {
    #[inline]
    fn from(value: String) -> Self {
        Instructions::Static(value)
    }
}

/// The model an agent talks to.
#[derive(Clone, Default)]
pub enum AgentModel {
    /// The default model of the run's model provider.
    #[default]
    Default,
    /// A model looked up by name in the run's model provider.
    Named(String),
    /// A concrete model.
    Instance(ModelClient),
}

impl From<&str> for AgentModel {
    #[inline]
    fn from(name: &str) -> Self {
        AgentModel::Named(name.to_owned())
    }
}

impl From<String> for AgentModel {
    #[inline]
    fn from(name: String) -> Self {
        AgentModel::Named(name)
    }
}

impl From<ModelClient> for AgentModel {
    #[inline]
    fn from(client: ModelClient) -> Self {
        AgentModel::Instance(client)
    }
}

/// The decision of a custom [`ToolUseBehavior`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolsToFinalOutputResult {
    /// Whether the run ends with `final_output`.
    pub is_final_output: bool,
    /// The final output, when `is_final_output` is set.
    pub final_output: Option<Value>,
}

#[rustfmt::skip]
type ToolsToFinalOutputFn = Arc<
    dyn Fn(RunContext, Vec<FunctionToolResult>)
        -> BoxFuture<'static, ToolsToFinalOutputResult> + Send + Sync
>;

/// Decides whether function tool outputs end the run.
#[derive(Clone, Default)]
pub enum ToolUseBehavior {
    /// Tool outputs go back to the model, which runs again.
    #[default]
    RunLlmAgain,
    /// The output of the first tool call is the final output.
    StopOnFirstTool,
    /// The output of the first call to one of these tools is the final
    /// output.
    StopAtTools(Vec<String>),
    /// A function of the context and the tool results decides.
    Custom(ToolsToFinalOutputFn),
}

impl ToolUseBehavior {
    /// Creates a custom behavior from a synchronous function.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&RunContext, &[FunctionToolResult]) -> ToolsToFinalOutputResult
            + Send
            + Sync
            + 'static,
    {
        Self::Custom(Arc::new(
            move |ctx: RunContext, results: Vec<FunctionToolResult>| {
                ready(f(&ctx, &results)).boxed()
            },
        ))
    }

    /// Creates a custom behavior from an asynchronous function.
    pub fn custom_async<F, Fut>(f: F) -> Self
    where
        F: Fn(RunContext, Vec<FunctionToolResult>) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = ToolsToFinalOutputResult> + Send + 'static,
    {
        Self::Custom(Arc::new(
            move |ctx: RunContext, results: Vec<FunctionToolResult>| {
                f(ctx, results).boxed()
            },
        ))
    }
}

/// An agent: instructions, tools, handoffs and guardrails driving one model
/// persona.
///
/// Agents are immutable by convention, use [`Agent::to_builder`] to derive
/// a variant. They live in an [`AgentGraph`], where handoffs refer to
/// other agents by [`AgentId`], so agents may hand off to each other in
/// cycles.
#[derive(Clone)]
pub struct Agent {
    pub(crate) name: String,
    pub(crate) handoff_description: Option<String>,
    pub(crate) instructions: Option<Instructions>,
    pub(crate) tools: Vec<AgentTool>,
    pub(crate) mcp_servers: Vec<Arc<dyn McpServer>>,
    pub(crate) handoffs: Vec<HandoffTarget>,
    pub(crate) input_guardrails: Vec<InputGuardrail>,
    pub(crate) output_guardrails: Vec<OutputGuardrail>,
    pub(crate) output_schema: Option<OutputSchema>,
    pub(crate) model: AgentModel,
    pub(crate) model_settings: ModelSettings,
    pub(crate) tool_use_behavior: ToolUseBehavior,
    pub(crate) reset_tool_choice: bool,
    pub(crate) hooks: Option<Arc<dyn AgentHooks>>,
}

impl Agent {
    /// Creates a builder of an agent with the given name.
    #[inline]
    pub fn builder<S: Into<String>>(name: S) -> AgentBuilder {
        AgentBuilder::new(name.into())
    }

    /// Creates a builder initialized with this agent's configuration.
    #[inline]
    pub fn to_builder(&self) -> AgentBuilder {
        AgentBuilder::from_agent(self.clone())
    }

    /// Returns the name of the agent.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description shown to agents that can hand off to this
    /// one.
    #[inline]
    pub fn handoff_description(&self) -> Option<&str> {
        self.handoff_description.as_deref()
    }

    /// Returns the instructions.
    #[inline]
    pub fn instructions(&self) -> Option<&Instructions> {
        self.instructions.as_ref()
    }

    /// Returns the declared tools, MCP tools excluded.
    #[inline]
    pub fn tools(&self) -> &[AgentTool] {
        &self.tools
    }

    /// Returns the attached MCP servers.
    #[inline]
    pub fn mcp_servers(&self) -> &[Arc<dyn McpServer>] {
        &self.mcp_servers
    }

    /// Returns the declared handoffs.
    #[inline]
    pub fn handoffs(&self) -> &[HandoffTarget] {
        &self.handoffs
    }

    /// Returns the input guardrails.
    #[inline]
    pub fn input_guardrails(&self) -> &[InputGuardrail] {
        &self.input_guardrails
    }

    /// Returns the output guardrails.
    #[inline]
    pub fn output_guardrails(&self) -> &[OutputGuardrail] {
        &self.output_guardrails
    }

    /// Returns the schema of the final output, `None` for plain text.
    #[inline]
    pub fn output_schema(&self) -> Option<&OutputSchema> {
        self.output_schema.as_ref()
    }

    /// Returns the model selector.
    #[inline]
    pub fn model(&self) -> &AgentModel {
        &self.model
    }

    /// Returns the agent-level model settings.
    #[inline]
    pub fn model_settings(&self) -> &ModelSettings {
        &self.model_settings
    }

    /// Returns the tool use behavior.
    #[inline]
    pub fn tool_use_behavior(&self) -> &ToolUseBehavior {
        &self.tool_use_behavior
    }

    /// Whether a forced tool choice is cleared once the agent used tools.
    #[inline]
    pub fn reset_tool_choice(&self) -> bool {
        self.reset_tool_choice
    }

    /// Returns the agent hooks.
    #[inline]
    pub fn hooks(&self) -> Option<&Arc<dyn AgentHooks>> {
        self.hooks.as_ref()
    }

    /// Computes the system prompt.
    pub async fn system_prompt(&self, ctx: &RunContext) -> Option<String> {
        match self.instructions.as_ref()? {
            Instructions::Static(text) => Some(text.clone()),
            Instructions::Dynamic(f) => Some(f(ctx, self).await),
        }
    }

    /// Resolves the tools offered to the model: MCP tools first, then the
    /// enabled declared tools in declaration order.
    ///
    /// Enablement predicates are evaluated concurrently.
    pub async fn all_tools(&self, ctx: &RunContext) -> Result<ToolSet> {
        let mcp_tools = all_mcp_tools(&self.mcp_servers, ctx, self).await?;
        let enabled =
            join_all(self.tools.iter().map(|tool| tool.is_enabled(ctx, self)))
                .await;

        let enabled_tools = self
            .tools
            .iter()
            .zip(enabled)
            .filter(|(_, enabled)| *enabled)
            .map(|(tool, _)| tool.clone());
        let tools = mcp_tools
            .into_iter()
            .map(AgentTool::Function)
            .chain(enabled_tools)
            .collect();
        Ok(ToolSet::new(tools))
    }

    /// Resolves the enabled handoffs, in declaration order.
    pub async fn enabled_handoffs(
        &self,
        graph: &AgentGraph,
        ctx: &RunContext,
    ) -> Result<Vec<Handoff>> {
        let handoffs = self
            .handoffs
            .iter()
            .map(|target| match target {
                HandoffTarget::Agent(id) => Handoff::to_agent(graph, *id),
                HandoffTarget::Custom(handoff) => Ok(handoff.clone()),
            })
            .collect::<Result<Vec<_>>>()?;
        let enabled = join_all(
            handoffs
                .iter()
                .map(|handoff| handoff.is_enabled().evaluate(ctx, self)),
        )
        .await;

        Ok(handoffs
            .into_iter()
            .zip(enabled)
            .filter(|(_, enabled)| *enabled)
            .map(|(handoff, _)| handoff)
            .collect())
    }
}

#[cfg(test)]
mod tests;
