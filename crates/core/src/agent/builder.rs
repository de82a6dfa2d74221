use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use tandem_model::ModelSettings;

use super::{Agent, AgentModel, Instructions, ToolUseBehavior};
use crate::guardrail::{InputGuardrail, OutputGuardrail};
use crate::handoff::HandoffTarget;
use crate::hooks::AgentHooks;
use crate::mcp::McpServer;
use crate::output::OutputSchema;
use crate::tool::AgentTool;

/// [`Agent`] builder.
pub struct AgentBuilder {
    agent: Agent,
}

impl AgentBuilder {
    pub(crate) fn new(name: String) -> Self {
        Self::from_agent(Agent {
            name,
            handoff_description: None,
            instructions: None,
            tools: vec![],
            mcp_servers: vec![],
            handoffs: vec![],
            input_guardrails: vec![],
            output_guardrails: vec![],
            output_schema: None,
            model: Default::default(),
            model_settings: Default::default(),
            tool_use_behavior: Default::default(),
            reset_tool_choice: true,
            hooks: None,
        })
    }

    #[inline]
    pub(crate) fn from_agent(agent: Agent) -> Self {
        Self { agent }
    }

    /// Renames the agent.
    #[inline]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.agent.name = name.into();
        self
    }

    /// Sets the system prompt.
    #[inline]
    pub fn with_instructions<I: Into<Instructions>>(
        mut self,
        instructions: I,
    ) -> Self {
        self.agent.instructions = Some(instructions.into());
        self
    }

    /// Sets the description shown to agents handing off to this one.
    #[inline]
    pub fn with_handoff_description<S: Into<String>>(
        mut self,
        description: S,
    ) -> Self {
        self.agent.handoff_description = Some(description.into());
        self
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Into<AgentTool>>(mut self, tool: T) -> Self {
        self.agent.tools.push(tool.into());
        self
    }

    /// Attaches an MCP server, whose tools are offered to the model.
    #[inline]
    pub fn with_mcp_server(mut self, server: Arc<dyn McpServer>) -> Self {
        self.agent.mcp_servers.push(server);
        self
    }

    /// Adds a handoff.
    #[inline]
    pub fn with_handoff<T: Into<HandoffTarget>>(mut self, target: T) -> Self {
        self.agent.handoffs.push(target.into());
        self
    }

    /// Adds an input guardrail.
    #[inline]
    pub fn with_input_guardrail(mut self, guardrail: InputGuardrail) -> Self {
        self.agent.input_guardrails.push(guardrail);
        self
    }

    /// Adds an output guardrail.
    #[inline]
    pub fn with_output_guardrail(mut self, guardrail: OutputGuardrail) -> Self {
        self.agent.output_guardrails.push(guardrail);
        self
    }

    /// Sets the schema of the final output.
    #[inline]
    pub fn with_output_schema(mut self, schema: OutputSchema) -> Self {
        self.agent.output_schema = Some(schema);
        self
    }

    /// Makes the final output a `T`.
    #[inline]
    pub fn with_output_type<T>(self) -> Self
    where
        T: JsonSchema + DeserializeOwned + 'static,
    {
        self.with_output_schema(OutputSchema::of::<T>())
    }

    /// Sets the model.
    #[inline]
    pub fn with_model<M: Into<AgentModel>>(mut self, model: M) -> Self {
        self.agent.model = model.into();
        self
    }

    /// Sets the agent-level model settings.
    #[inline]
    pub fn with_model_settings(mut self, settings: ModelSettings) -> Self {
        self.agent.model_settings = settings;
        self
    }

    /// Sets how tool outputs are handled.
    #[inline]
    pub fn with_tool_use_behavior(mut self, behavior: ToolUseBehavior) -> Self {
        self.agent.tool_use_behavior = behavior;
        self
    }

    /// Sets whether a forced tool choice is cleared once the agent used
    /// tools. Defaults to `true`.
    #[inline]
    pub fn with_reset_tool_choice(mut self, reset: bool) -> Self {
        self.agent.reset_tool_choice = reset;
        self
    }

    /// Attaches lifecycle hooks to the agent.
    #[inline]
    pub fn with_hooks<H: AgentHooks + 'static>(mut self, hooks: H) -> Self {
        self.agent.hooks = Some(Arc::new(hooks));
        self
    }

    /// Builds the agent.
    #[inline]
    pub fn build(self) -> Agent {
        self.agent
    }
}
