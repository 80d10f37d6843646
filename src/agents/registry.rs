//! Agent Registry for discovering and routing to capability providers
//!
//! The registry is an explicitly constructed value owned by whoever needs
//! it (usually the orchestrator). There is no process-wide instance.
//!
//! ## Lookup
//!
//! - by id: [`AgentRegistry::get`]
//! - by advertised capability: [`AgentRegistry::find_by_capability`]
//! - by envelope receiver: [`AgentRegistry::route`]

use crate::agents::Agent;
use crate::protocol::AgentMessage;
use crate::types::{AppError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry mapping agent ids to agent instances
#[derive(Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Arc<dyn Agent>>,
}

impl AgentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            agents: HashMap::new(),
        }
    }

    /// Register an agent, replacing any agent already registered under the same id
    pub fn register(&mut self, agent: Arc<dyn Agent>) {
        let id = agent.id().to_string();
        if self.agents.insert(id.clone(), agent).is_some() {
            tracing::debug!(agent_id = %id, "Replaced registered agent");
        } else {
            tracing::debug!(agent_id = %id, "Registered agent");
        }
    }

    /// Remove an agent; does nothing if the id is unknown
    pub fn unregister(&mut self, agent_id: &str) {
        if self.agents.remove(agent_id).is_some() {
            tracing::debug!(agent_id = %agent_id, "Unregistered agent");
        }
    }

    /// Get an agent by id
    pub fn get(&self, agent_id: &str) -> Option<Arc<dyn Agent>> {
        self.agents.get(agent_id).cloned()
    }

    /// Get an agent by id, failing with a routing error when absent
    pub fn require(&self, agent_id: &str) -> Result<Arc<dyn Agent>> {
        self.get(agent_id).ok_or_else(|| {
            AppError::Routing(format!("No agent registered with id '{}'", agent_id))
        })
    }

    /// All agents advertising a capability with the given name
    pub fn find_by_capability(&self, capability: &str) -> Vec<Arc<dyn Agent>> {
        self.agents
            .values()
            .filter(|agent| agent.has_capability(capability))
            .cloned()
            .collect()
    }

    pub fn list_all(&self) -> Vec<Arc<dyn Agent>> {
        self.agents.values().cloned().collect()
    }

    /// Registered agent ids, sorted
    pub fn agent_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.agents.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn has_agent(&self, agent_id: &str) -> bool {
        self.agents.contains_key(agent_id)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Deliver a message to its receiver.
    ///
    /// Returns `Ok(None)` when the receiver is not registered; the caller
    /// decides how to treat an unroutable message.
    pub async fn route(&self, message: AgentMessage) -> Result<Option<AgentMessage>> {
        match self.get(&message.receiver) {
            Some(agent) => agent.process(message).await.map(Some),
            None => {
                tracing::warn!(
                    receiver = %message.receiver,
                    sender = %message.sender,
                    "Dropping message for unregistered agent"
                );
                Ok(None)
            }
        }
    }

    /// Like [`route`](Self::route) but an unknown receiver is a routing error
    pub async fn route_strict(&self, message: AgentMessage) -> Result<AgentMessage> {
        let agent = self.require(&message.receiver)?;
        agent.process(message).await
    }
}

/// Builder for creating AgentRegistry with fluent API
pub struct AgentRegistryBuilder {
    agents: Vec<Arc<dyn Agent>>,
}

impl AgentRegistryBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self { agents: Vec::new() }
    }

    /// Add an agent
    pub fn with_agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.agents.push(agent);
        self
    }

    /// Build the AgentRegistry
    pub fn build(self) -> AgentRegistry {
        let mut registry = AgentRegistry::new();
        for agent in self.agents {
            registry.register(agent);
        }
        registry
    }
}

impl Default for AgentRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
