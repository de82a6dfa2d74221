use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::agent::Agent;
use crate::RunContext;

/// Callbacks observing every agent of a run.
///
/// Every method defaults to doing nothing. Hooks are awaited inline, so a
/// slow hook slows the run down.
#[async_trait]
pub trait RunHooks: Send + Sync {
    /// Called before an agent runs its first turn, and again after every
    /// handoff to it.
    async fn on_agent_start(&self, _ctx: &RunContext, _agent: &Agent) {}

    /// Called when an agent produced the final output.
    async fn on_agent_end(
        &self,
        _ctx: &RunContext,
        _agent: &Agent,
        _output: &Value,
    ) {
    }

    /// Called when `from` hands off to `to`.
    async fn on_handoff(&self, _ctx: &RunContext, _from: &Agent, _to: &Agent) {}

    /// Called before a function tool runs.
    async fn on_tool_start(
        &self,
        _ctx: &RunContext,
        _agent: &Agent,
        _tool_name: &str,
    ) {
    }

    /// Called after a function tool ran.
    async fn on_tool_end(
        &self,
        _ctx: &RunContext,
        _agent: &Agent,
        _tool_name: &str,
        _result: &str,
    ) {
    }
}

/// Callbacks observing a single agent.
#[async_trait]
pub trait AgentHooks: Send + Sync {
    /// Called before the agent runs its first turn.
    async fn on_start(&self, _ctx: &RunContext, _agent: &Agent) {}

    /// Called when the agent produced the final output.
    async fn on_end(
        &self,
        _ctx: &RunContext,
        _agent: &Agent,
        _output: &Value,
    ) {
    }

    /// Called when `source` hands off to this agent.
    async fn on_handoff(
        &self,
        _ctx: &RunContext,
        _agent: &Agent,
        _source: &Agent,
    ) {
    }

    /// Called before one of the agent's function tools runs.
    async fn on_tool_start(
        &self,
        _ctx: &RunContext,
        _agent: &Agent,
        _tool_name: &str,
    ) {
    }

    /// Called after one of the agent's function tools ran.
    async fn on_tool_end(
        &self,
        _ctx: &RunContext,
        _agent: &Agent,
        _tool_name: &str,
        _result: &str,
    ) {
    }
}

/// Fans a lifecycle event out to the run hooks and the agent hooks.
#[derive(Clone, Default)]
pub(crate) struct HookSet {
    run: Option<Arc<dyn RunHooks>>,
}

impl HookSet {
    #[inline]
    pub fn new(run: Option<Arc<dyn RunHooks>>) -> Self {
        Self { run }
    }

    pub async fn agent_start(&self, ctx: &RunContext, agent: &Agent) {
        if let Some(hooks) = &self.run {
            hooks.on_agent_start(ctx, agent).await;
        }
        if let Some(hooks) = agent.hooks() {
            hooks.on_start(ctx, agent).await;
        }
    }

    pub async fn agent_end(
        &self,
        ctx: &RunContext,
        agent: &Agent,
        output: &Value,
    ) {
        if let Some(hooks) = &self.run {
            hooks.on_agent_end(ctx, agent, output).await;
        }
        if let Some(hooks) = agent.hooks() {
            hooks.on_end(ctx, agent, output).await;
        }
    }

    pub async fn handoff(&self, ctx: &RunContext, from: &Agent, to: &Agent) {
        if let Some(hooks) = &self.run {
            hooks.on_handoff(ctx, from, to).await;
        }
        if let Some(hooks) = to.hooks() {
            hooks.on_handoff(ctx, to, from).await;
        }
    }

    pub async fn tool_start(
        &self,
        ctx: &RunContext,
        agent: &Agent,
        tool: &str,
    ) {
        if let Some(hooks) = &self.run {
            hooks.on_tool_start(ctx, agent, tool).await;
        }
        if let Some(hooks) = agent.hooks() {
            hooks.on_tool_start(ctx, agent, tool).await;
        }
    }

    pub async fn tool_end(
        &self,
        ctx: &RunContext,
        agent: &Agent,
        tool: &str,
        result: &str,
    ) {
        if let Some(hooks) = &self.run {
            hooks.on_tool_end(ctx, agent, tool, result).await;
        }
        if let Some(hooks) = agent.hooks() {
            hooks.on_tool_end(ctx, agent, tool, result).await;
        }
    }
}
