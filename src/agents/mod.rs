pub mod actions;
pub mod outbox;
pub mod registry;

use crate::protocol::{AgentMessage, CapabilityDescriptor};
use crate::types::Result;
use async_trait::async_trait;

// Re-export commonly used types
pub use actions::ActionTable;
pub use outbox::{AgentOutbox, AgentStats};
pub use registry::{AgentRegistry, AgentRegistryBuilder};

/// Base trait for all capability providers
///
/// The engine only ever holds providers as `Arc<dyn Agent>`.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique agent id used for registration and routing
    fn id(&self) -> &str;

    /// Human readable name
    fn name(&self) -> &str {
        self.id()
    }

    /// Static advertisement of the supported actions
    fn capabilities(&self) -> Vec<CapabilityDescriptor>;

    /// Process a request envelope.
    ///
    /// Returns a Response envelope whose payload carries `result`, or an
    /// Error envelope whose payload carries `error`. An `Err` is treated by
    /// the engine like an Error envelope.
    async fn process(&self, request: AgentMessage) -> Result<AgentMessage>;

    /// Whether this agent advertises a capability with the given name
    fn has_capability(&self, name: &str) -> bool {
        self.capabilities().iter().any(|c| c.name == name)
    }
}
