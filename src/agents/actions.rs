//! Action dispatch table
//!
//! Maps the `action` identifiers of incoming requests to a typed handler
//! variant. The table is checked against the agent's advertised capabilities
//! when the agent is constructed, so an unknown action at call time is always
//! a caller error.

use crate::protocol::{AgentMessage, CapabilityDescriptor};
use crate::types::{AppError, Result};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ActionTable<A> {
    agent_id: String,
    actions: HashMap<String, A>,
}

impl<A: Copy> ActionTable<A> {
    /// Build the table.
    ///
    /// Fails if a binding names a capability the agent does not declare, if
    /// an action is bound twice, or if a declared capability has no binding.
    pub fn build(
        agent_id: &str,
        capabilities: &[CapabilityDescriptor],
        bindings: &[(&str, A)],
    ) -> Result<Self> {
        let mut actions = HashMap::with_capacity(bindings.len());

        for (action, variant) in bindings {
            if !capabilities.iter().any(|c| c.name == *action) {
                return Err(AppError::Configuration(format!(
                    "Agent '{}' binds action '{}' that is not a declared capability",
                    agent_id, action
                )));
            }
            if actions.insert(action.to_string(), *variant).is_some() {
                return Err(AppError::Configuration(format!(
                    "Agent '{}' binds action '{}' more than once",
                    agent_id, action
                )));
            }
        }

        if let Some(missing) = capabilities.iter().find(|c| !actions.contains_key(&c.name)) {
            return Err(AppError::Configuration(format!(
                "Agent '{}' declares capability '{}' without a handler",
                agent_id, missing.name
            )));
        }

        Ok(Self {
            agent_id: agent_id.to_string(),
            actions,
        })
    }

    pub fn resolve(&self, action: &str) -> Result<A> {
        self.actions.get(action).copied().ok_or_else(|| {
            AppError::Validation(format!(
                "Agent '{}' does not support action '{}'",
                self.agent_id, action
            ))
        })
    }

    /// Resolve the `action` declared by a request payload
    pub fn resolve_request(&self, request: &AgentMessage) -> Result<A> {
        let action = request.action().ok_or_else(|| {
            AppError::Validation(format!(
                "Request to '{}' has no 'action' field",
                self.agent_id
            ))
        })?;
        self.resolve(action)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
