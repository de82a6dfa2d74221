//! The run loop: drives agents through their model until one of them
//! produces the final output.

mod engine;
mod result;
mod streaming;
mod turn;

use std::sync::Arc;

use tandem_model::Item;

pub use result::RunResult;
pub use streaming::{RunResultStreaming, StreamEvent};

use self::engine::RunEngine;
use crate::agent::{AgentGraph, AgentId};
use crate::config::RunConfig;
use crate::{Result, RunContext};

/// The input of a run.
#[derive(Clone, Debug, PartialEq)]
pub enum RunInput {
    /// A user message.
    Text(String),
    /// A list of input items, e.g. [`RunResult::to_input_list`] of a
    /// previous run.
    Items(Vec<Item>),
}

impl RunInput {
    /// Converts the input into a list of items.
    pub fn into_items(self) -> Vec<Item> {
        match self {
            RunInput::Text(text) => vec![Item::user_message(text)],
            RunInput::Items(items) => items,
        }
    }
}

impl From<&str> for RunInput {
    #[inline]
    fn from(text: &str) -> Self {
        RunInput::Text(text.to_owned())
    }
}

impl From<String> for RunInput {
    #[inline]
    fn from(text: String) -> Self {
        RunInput::Text(text)
    }
}

impl From<Vec<Item>> for RunInput {
    #[inline]
    fn from(items: Vec<Item>) -> Self {
        RunInput::Items(items)
    }
}

/// Runs agents of an [`AgentGraph`].
///
/// A run starts with one agent and loops: the model is called, tools are
/// executed, handoffs move control to other agents. It ends when an agent
/// produces the final output, or fails when the turn budget is used up or
/// a guardrail trips.
#[derive(Clone)]
pub struct Runner {
    graph: Arc<AgentGraph>,
    config: RunConfig,
}

impl Runner {
    /// Creates a runner with the default configuration.
    #[inline]
    pub fn new<G: Into<Arc<AgentGraph>>>(graph: G) -> Self {
        Self {
            graph: graph.into(),
            config: RunConfig::default(),
        }
    }

    /// Sets the run configuration.
    #[inline]
    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the agent graph.
    #[inline]
    pub fn graph(&self) -> &Arc<AgentGraph> {
        &self.graph
    }

    /// Returns the run configuration.
    #[inline]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Runs `starting_agent` until the final output is produced.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. Dropping the future stops the run at
    /// its current await point, tools already running are dropped too.
    pub async fn run<I: Into<RunInput>>(
        &self,
        starting_agent: AgentId,
        input: I,
        ctx: RunContext,
    ) -> Result<RunResult> {
        self.graph.resolve(starting_agent)?;
        let engine = RunEngine::new(
            Arc::clone(&self.graph),
            self.config.clone(),
            starting_agent,
            input.into().into_items(),
            ctx,
            None,
        );
        engine.run().await
    }

    /// Runs `starting_agent` in the background and streams its events.
    ///
    /// Must be called within a Tokio runtime. An unknown starting agent is
    /// reported by the stream.
    pub fn run_streamed<I: Into<RunInput>>(
        &self,
        starting_agent: AgentId,
        input: I,
        ctx: RunContext,
    ) -> RunResultStreaming {
        let graph = Arc::clone(&self.graph);
        let config = self.config.clone();
        let input = input.into().into_items();
        RunResultStreaming::start(starting_agent, move |sink| {
            let sink = Some(sink);
            RunEngine::new(graph, config, starting_agent, input, ctx, sink)
        })
    }
}
