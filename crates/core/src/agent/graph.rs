use std::ops::Index;
use std::sync::Arc;

use super::Agent;
use crate::handoff::HandoffTarget;
use crate::{Error, Result};

/// A stable handle of an agent in an [`AgentGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(usize);

/// The arena owning every agent of an application.
///
/// Handoffs refer to agents by [`AgentId`], so the graph may contain
/// cycles, including an agent handing off to itself. Build the graph
/// mutably, then share it behind an `Arc` with the runners.
#[derive(Clone, Default)]
pub struct AgentGraph {
    agents: Vec<Arc<Agent>>,
}

impl AgentGraph {
    /// Creates an empty graph.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an agent and returns its handle.
    #[inline]
    pub fn insert(&mut self, agent: Agent) -> AgentId {
        self.agents.push(Arc::new(agent));
        AgentId(self.agents.len() - 1)
    }

    /// Returns the agent with the given handle.
    #[inline]
    pub fn get(&self, id: AgentId) -> Option<&Arc<Agent>> {
        self.agents.get(id.0)
    }

    /// Returns the agent for modification, e.g. to wire handoff cycles.
    #[inline]
    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(id.0).map(Arc::make_mut)
    }

    /// Adds a handoff from `from` to `target`.
    pub fn add_handoff<T: Into<HandoffTarget>>(
        &mut self,
        from: AgentId,
        target: T,
    ) -> Result<()> {
        let target = target.into();
        if let HandoffTarget::Agent(id) = &target {
            self.resolve(*id)?;
        }
        let agent = self
            .get_mut(from)
            .ok_or_else(|| Error::user(format!("unknown agent: {from:?}")))?;
        agent.handoffs.push(target);
        Ok(())
    }

    /// Returns the handle of the first agent with the given name.
    pub fn find(&self, name: &str) -> Option<AgentId> {
        self.agents
            .iter()
            .position(|agent| agent.name == name)
            .map(AgentId)
    }

    /// Returns the number of agents.
    #[inline]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Returns `true` if the graph has no agents.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub(crate) fn resolve(&self, id: AgentId) -> Result<&Arc<Agent>> {
        self.get(id)
            .ok_or_else(|| Error::user(format!("unknown agent: {id:?}")))
    }
}

impl Index<AgentId> for AgentGraph {
    type Output = Agent;

    #[inline]
    fn index(&self, id: AgentId) -> &Agent {
        &self.agents[id.0]
    }
}
