//! Core logic including agents, tools, handoffs, guardrails and the run
//! loop that drives them through a model.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
mod config;
mod context;
mod error;
pub mod guardrail;
pub mod handoff;
mod hooks;
mod items;
pub mod mcp;
mod model_client;
mod output;
mod runner;
pub mod tool;

pub use agent::{
    Agent, AgentBuilder, AgentGraph, AgentId, AgentModel, Instructions,
    ToolUseBehavior, ToolsToFinalOutputResult,
};
pub use config::{DEFAULT_MAX_TURNS, RunConfig};
pub use context::RunContext;
pub use error::{Error, Result, RunErrorDetails};
pub use hooks::{AgentHooks, RunHooks};
pub use items::RunItem;
pub use model_client::{ModelClient, ModelProvider, ModelRegistry};
pub use output::OutputSchema;
pub use runner::{
    RunInput, RunResult, RunResultStreaming, Runner, StreamEvent,
};
