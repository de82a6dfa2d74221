use tandem_model::{Item, ModelError, ModelResponse};

use crate::agent::AgentId;
use crate::guardrail::{InputGuardrailResult, OutputGuardrailResult};
use crate::items::RunItem;
use crate::mcp::McpError;
use crate::tool;

/// What a run had produced when it failed.
#[derive(Clone, Debug)]
pub struct RunErrorDetails {
    /// The original input of the run.
    pub input: Vec<Item>,
    /// Items generated before the failure.
    pub new_items: Vec<RunItem>,
    /// Every model response received.
    pub raw_responses: Vec<ModelResponse>,
    /// The agent that was running.
    pub last_agent: AgentId,
    /// Results of the input guardrails, if they ran.
    pub input_guardrail_results: Vec<InputGuardrailResult>,
}

/// The error type of agent runs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The SDK was misused, e.g. two MCP servers expose the same tool.
    #[error("user error: {0}")]
    User(String),

    /// The model produced something that cannot be executed.
    #[error("model behavior error: {0}")]
    ModelBehavior(String),

    /// The run used up its turn budget.
    #[error("max turns ({max_turns}) exceeded")]
    MaxTurnsExceeded {
        /// The configured budget.
        max_turns: usize,
        /// Partial results of the run.
        details: Box<RunErrorDetails>,
    },

    /// An input guardrail tripped.
    #[error("input guardrail `{}` triggered tripwire", .0.guardrail)]
    InputGuardrailTripwireTriggered(Box<InputGuardrailResult>),

    /// An output guardrail tripped.
    #[error("output guardrail `{}` triggered tripwire", .0.guardrail)]
    OutputGuardrailTripwireTriggered(Box<OutputGuardrailResult>),

    /// The model provider failed.
    #[error("model error: {0}")]
    Model(Box<dyn ModelError>),

    /// An MCP server failed to serve its tools.
    #[error("MCP server `{server}` failed")]
    Mcp {
        /// Name of the server.
        server: String,
        /// The server error.
        #[source]
        source: McpError,
    },

    /// A tool failed and its failure handler is disabled.
    #[error("tool `{tool_name}` failed")]
    Tool {
        /// Name of the failed tool.
        tool_name: String,
        /// The tool error.
        #[source]
        source: tool::Error,
    },

    /// A guardrail function itself failed.
    #[error("guardrail `{name}` failed: {message}")]
    Guardrail {
        /// Name of the guardrail.
        name: String,
        /// The failure message.
        message: String,
    },

    /// The run was cancelled.
    #[error("run cancelled")]
    Cancelled,
}

impl Error {
    #[inline]
    pub(crate) fn user<S: Into<String>>(message: S) -> Self {
        Error::User(message.into())
    }

    #[inline]
    pub(crate) fn model_behavior<S: Into<String>>(message: S) -> Self {
        Error::ModelBehavior(message.into())
    }
}

/// A specialized `Result` type for agent runs.
pub type Result<T, E = Error> = std::result::Result<T, E>;
