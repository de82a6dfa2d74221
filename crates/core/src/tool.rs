//! Tool call supports.
//!
//! Agents declare [`AgentTool`]s: local function tools, tools the provider
//! runs itself (file search, web search) and a computer driven on the
//! model's behalf. Tools from MCP servers join the function tools when the
//! agent's tool set is resolved, see [`Agent::all_tools`].

mod computer;
mod error;
mod function;
mod toolset;

use std::future::ready;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tandem_model::ModelTool;

pub use computer::{Computer, ComputerTool};
pub use error::{Error, ErrorKind};
pub use function::{FailureHandler, FunctionTool, FunctionToolResult};
pub(crate) use function::ToolObject;
pub use toolset::ToolSet;

use crate::{Agent, RunContext};

/// The result of a tool call.
pub type ToolResult = Result<String, Error>;

/// A tool that can be called by the model.
///
/// Implementations of this trait should be stateless, and may not maintain any
/// internal state.
///
/// The tool can be context-aware: the [`RunContext`] of the current run is
/// handed to every execution, and the user value it carries can be read
/// with [`RunContext::get`].
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    type Input: DeserializeOwned;

    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the parameter schema of the tool.
    fn parameter_schema(&self) -> &Value;

    /// Executes the tool with the given input.
    ///
    /// This method must return a future that is fully independent of `self`,
    /// and the future should be cancellation safe.
    fn execute(
        &self,
        ctx: RunContext,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}

type EnabledFn =
    Arc<dyn Fn(&RunContext, &Agent) -> BoxFuture<'static, bool> + Send + Sync>;

/// Whether a tool or handoff is offered to the model.
#[derive(Clone, Default)]
pub enum IsEnabled {
    /// Always offered.
    #[default]
    Always,
    /// Never offered.
    Never,
    /// Decided per turn by a predicate.
    Predicate(EnabledFn),
}

impl IsEnabled {
    /// Creates a predicate from a synchronous function.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&RunContext, &Agent) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(move |ctx: &RunContext, agent: &Agent| {
            ready(f(ctx, agent)).boxed()
        }))
    }

    /// Creates a predicate from an asynchronous function.
    pub fn from_async_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(&RunContext, &Agent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Self::Predicate(Arc::new(move |ctx: &RunContext, agent: &Agent| {
            f(ctx, agent).boxed()
        }))
    }

    /// Evaluates the predicate.
    pub async fn evaluate(&self, ctx: &RunContext, agent: &Agent) -> bool {
        match self {
            IsEnabled::Always => true,
            IsEnabled::Never => false,
            IsEnabled::Predicate(f) => f(ctx, agent).await,
        }
    }
}

impl From<bool> for IsEnabled {
    #[inline]
    fn from(enabled: bool) -> Self {
        if enabled {
            IsEnabled::Always
        } else {
            IsEnabled::Never
        }
    }
}

/// File search, executed by the model provider.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FileSearchTool {
    /// Vector stores to search.
    pub vector_store_ids: Vec<String>,
    /// Maximum number of results.
    pub max_num_results: Option<u32>,
    /// Whether results should be included in the output.
    pub include_search_results: bool,
}

/// Web search, executed by the model provider.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WebSearchTool {
    /// Approximate location of the user.
    pub user_location: Option<Value>,
    /// How much context to retrieve: `low`, `medium` or `high`.
    pub search_context_size: Option<String>,
}

/// A tool declared on an agent.
#[derive(Clone)]
pub enum AgentTool {
    /// A function executed locally.
    Function(FunctionTool),
    /// Hosted file search.
    FileSearch(FileSearchTool),
    /// Hosted web search.
    WebSearch(WebSearchTool),
    /// A computer controlled locally.
    Computer(ComputerTool),
}

impl AgentTool {
    /// Returns the name the model uses to call this tool.
    pub fn name(&self) -> &str {
        match self {
            AgentTool::Function(tool) => tool.name(),
            AgentTool::FileSearch(_) => "file_search",
            AgentTool::WebSearch(_) => "web_search",
            AgentTool::Computer(_) => "computer_use_preview",
        }
    }

    /// Describes this tool for the model.
    pub fn spec(&self) -> ModelTool {
        match self {
            AgentTool::Function(tool) => ModelTool::Function(tool.spec()),
            AgentTool::FileSearch(tool) => ModelTool::FileSearch {
                vector_store_ids: tool.vector_store_ids.clone(),
                max_num_results: tool.max_num_results,
                include_search_results: tool.include_search_results,
            },
            AgentTool::WebSearch(tool) => ModelTool::WebSearch {
                user_location: tool.user_location.clone(),
                search_context_size: tool.search_context_size.clone(),
            },
            AgentTool::Computer(tool) => tool.spec(),
        }
    }

    pub(crate) async fn is_enabled(
        &self,
        ctx: &RunContext,
        agent: &Agent,
    ) -> bool {
        match self {
            AgentTool::Function(tool) => {
                tool.is_enabled().evaluate(ctx, agent).await
            }
            _ => true,
        }
    }
}

impl From<FunctionTool> for AgentTool {
    #[inline]
    fn from(tool: FunctionTool) -> Self {
        AgentTool::Function(tool)
    }
}

impl From<FileSearchTool> for AgentTool {
    #[inline]
    fn from(tool: FileSearchTool) -> Self {
        AgentTool::FileSearch(tool)
    }
}

impl From<WebSearchTool> for AgentTool {
    #[inline]
    fn from(tool: WebSearchTool) -> Self {
        AgentTool::WebSearch(tool)
    }
}

impl From<ComputerTool> for AgentTool {
    #[inline]
    fn from(tool: ComputerTool) -> Self {
        AgentTool::Computer(tool)
    }
}
