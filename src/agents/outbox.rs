//! Message construction shared by every agent
//!
//! Agents embed an [`AgentOutbox`] to build responses, errors and handoffs
//! with consistent addressing, and to keep a log of everything they sent.

use crate::protocol::{AgentMessage, MessageKind};
use crate::types::Payload;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};

/// Snapshot of an agent's activity
#[derive(Debug, Clone, Serialize)]
pub struct AgentStats {
    pub agent_id: String,
    pub name: String,
    pub messages_created: usize,
    pub capabilities: Vec<String>,
}

pub struct AgentOutbox {
    agent_id: String,
    name: String,
    log: Mutex<Vec<AgentMessage>>,
}

impl AgentOutbox {
    pub fn new(agent_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            name: name.into(),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create a message from this agent and record it in the log
    pub fn create_message(
        &self,
        receiver: &str,
        kind: MessageKind,
        payload: Payload,
        correlation_id: Option<String>,
    ) -> AgentMessage {
        let mut message = AgentMessage::new(&self.agent_id, receiver, kind, payload)
            .with_metadata("agent_name", json!(self.name));
        message.correlation_id = correlation_id;

        self.log.lock().push(message.clone());
        message
    }

    /// Answer `request` with a Response (`success`) or an Error envelope.
    pub fn respond(&self, request: &AgentMessage, payload: Payload, success: bool) -> AgentMessage {
        let kind = if success {
            MessageKind::Response
        } else {
            MessageKind::Error
        };

        self.create_message(&request.sender, kind, payload, request.correlation_id.clone())
    }

    /// Response carrying `{"result": result}`
    pub fn result(&self, request: &AgentMessage, result: Value) -> AgentMessage {
        let mut payload = Payload::new();
        payload.insert("result".to_string(), result);
        self.respond(request, payload, true)
    }

    /// Error envelope carrying `{"error": message}`
    pub fn error(&self, request: &AgentMessage, message: impl Into<String>) -> AgentMessage {
        let mut payload = Payload::new();
        payload.insert("error".to_string(), Value::String(message.into()));
        self.respond(request, payload, false)
    }

    /// Pass accumulated context and instructions on to `next_agent`.
    pub fn handoff(
        &self,
        next_agent: &str,
        context: Payload,
        instructions: &str,
        correlation_id: Option<String>,
    ) -> AgentMessage {
        let mut payload = Payload::new();
        payload.insert("context".to_string(), Value::Object(context));
        payload.insert("instructions".to_string(), json!(instructions));
        payload.insert("previous_agent".to_string(), json!(self.agent_id));

        self.create_message(next_agent, MessageKind::Handoff, payload, correlation_id)
    }

    /// Every message this agent has created, oldest first
    pub fn history(&self) -> Vec<AgentMessage> {
        self.log.lock().clone()
    }

    pub fn message_count(&self) -> usize {
        self.log.lock().len()
    }

    pub fn stats(&self, capabilities: Vec<String>) -> AgentStats {
        AgentStats {
            agent_id: self.agent_id.clone(),
            name: self.name.clone(),
            messages_created: self.message_count(),
            capabilities,
        }
    }
}
