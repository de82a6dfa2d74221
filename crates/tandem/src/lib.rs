//! Build assistants out of agents that hand off to each other, call tools
//! and are checked by guardrails, over any model provider.
//!
//! The free functions run an [`AgentGraph`](core::AgentGraph) with the
//! default configuration. Use [`Runner`](core::Runner) directly for
//! anything else, or [`RealtimeRunner`](realtime::RealtimeRunner) for
//! live voice sessions.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

#[cfg(feature = "logging")]
mod logging;

use std::sync::Arc;

use tandem_core::{
    AgentGraph, AgentId, Error, Result, RunContext, RunInput, RunResult,
    RunResultStreaming, Runner,
};

#[cfg(feature = "logging")]
pub use logging::enable_verbose_stdout_logging;

/// Re-exports of [`tandem_core`] crate.
pub mod core {
    pub use tandem_core::*;
}

/// Re-exports of [`tandem_model`] crate.
pub mod model {
    pub use tandem_model::*;
}

/// Re-exports of [`tandem_realtime`] crate.
pub mod realtime {
    pub use tandem_realtime::*;
}

/// Runs `starting_agent` with the default configuration.
///
/// See [`Runner::run`].
pub async fn run<G, I>(
    graph: G,
    starting_agent: AgentId,
    input: I,
) -> Result<RunResult>
where
    G: Into<Arc<AgentGraph>>,
    I: Into<RunInput>,
{
    Runner::new(graph)
        .run(starting_agent, input, RunContext::new())
        .await
}

/// Runs `starting_agent` in the background with the default configuration
/// and streams its events.
///
/// See [`Runner::run_streamed`].
pub fn run_streamed<G, I>(
    graph: G,
    starting_agent: AgentId,
    input: I,
) -> RunResultStreaming
where
    G: Into<Arc<AgentGraph>>,
    I: Into<RunInput>,
{
    Runner::new(graph).run_streamed(starting_agent, input, RunContext::new())
}

/// Runs `starting_agent` with the default configuration, blocking the
/// current thread until the run ends.
///
/// The run is driven by a dedicated current-thread runtime, so this fails
/// with [`Error::User`] when called from within a Tokio runtime.
pub fn run_sync<G, I>(
    graph: G,
    starting_agent: AgentId,
    input: I,
) -> Result<RunResult>
where
    G: Into<Arc<AgentGraph>>,
    I: Into<RunInput>,
{
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(Error::User(
            "`run_sync` cannot be called from an async context, use `run`"
                .to_owned(),
        ));
    }
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| {
            Error::User(format!("failed to start a runtime: {err}"))
        })?;
    debug!("running agent {starting_agent:?} to completion");
    runtime.block_on(run(graph, starting_agent, input))
}
