//! Agent-to-agent protocol
//!
//! The envelope every capability provider receives and returns, and the
//! descriptor providers use to advertise what they can do.
//!
//! ```ignore
//! let request = AgentMessage::request("orchestrator", "research_agent", payload);
//! let wire = request.to_wire();
//! assert_eq!(AgentMessage::from_wire(&wire)?, request);
//! ```

/// Message envelope and message kinds.
pub mod message;

pub use message::{AgentMessage, MessageKind};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Advertised capability of an agent.
///
/// Purely informational: schemas are never enforced at dispatch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    /// Advisory shape of the expected request payload
    #[serde(default)]
    pub input_schema: Value,
    /// Advisory shape of the produced result
    #[serde(default)]
    pub output_schema: Value,
}

impl CapabilityDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        output_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            output_schema,
        }
    }
}
