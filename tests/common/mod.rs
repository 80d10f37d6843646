//! Shared test helpers.
#![allow(dead_code)]

pub mod mocks;

use conclave::agents::{AgentRegistry, AgentRegistryBuilder};
use mocks::ScriptedAgent;
use std::sync::Arc;

/// Registry holding the three scripted providers under the default ids
pub fn scripted_registry(
    research: &Arc<ScriptedAgent>,
    analysis: &Arc<ScriptedAgent>,
    synthesis: &Arc<ScriptedAgent>,
) -> Arc<AgentRegistry> {
    Arc::new(
        AgentRegistryBuilder::new()
            .with_agent(research.clone())
            .with_agent(analysis.clone())
            .with_agent(synthesis.clone())
            .build(),
    )
}
