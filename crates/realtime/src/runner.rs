use std::sync::Arc;

use tandem_core::{AgentGraph, AgentId, RunContext};

use crate::Result;
use crate::config::RealtimeRunConfig;
use crate::session::RealtimeSession;
use crate::transport::RealtimeModel;

/// Starts realtime sessions with the agents of an [`AgentGraph`].
#[derive(Clone)]
pub struct RealtimeRunner {
    graph: Arc<AgentGraph>,
    starting_agent: AgentId,
    model: Arc<dyn RealtimeModel>,
    config: RealtimeRunConfig,
}

impl RealtimeRunner {
    /// Creates a runner starting its sessions with `starting_agent`.
    pub fn new<G: Into<Arc<AgentGraph>>>(
        graph: G,
        starting_agent: AgentId,
        model: Arc<dyn RealtimeModel>,
    ) -> Self {
        Self {
            graph: graph.into(),
            starting_agent,
            model,
            config: RealtimeRunConfig::default(),
        }
    }

    /// Sets the session configuration.
    #[inline]
    pub fn with_config(mut self, config: RealtimeRunConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the session configuration.
    #[inline]
    pub fn config(&self) -> &RealtimeRunConfig {
        &self.config
    }

    /// Connects the transport and starts a session.
    ///
    /// Must be called within a Tokio runtime.
    pub async fn run(&self, ctx: RunContext) -> Result<RealtimeSession> {
        RealtimeSession::connect(
            Arc::clone(&self.graph),
            self.starting_agent,
            Arc::clone(&self.model),
            self.config.clone(),
            ctx,
        )
        .await
    }
}
