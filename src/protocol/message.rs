//! Inter-agent message envelope.

use crate::types::{AppError, Payload, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kind of an inter-agent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Request to execute an action
    Request,
    /// Successful result of a request
    Response,
    /// Progress notification
    Status,
    /// Failed result of a request
    Error,
    /// Transfer of accumulated context to another agent
    Handoff,
}

impl MessageKind {
    pub const ALL: [MessageKind; 5] = [
        MessageKind::Request,
        MessageKind::Response,
        MessageKind::Status,
        MessageKind::Error,
        MessageKind::Handoff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Request => "request",
            MessageKind::Response => "response",
            MessageKind::Status => "status",
            MessageKind::Error => "error",
            MessageKind::Handoff => "handoff",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        MessageKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| AppError::Validation(format!("unrecognized message kind '{}'", s)))
    }
}

/// Message exchanged between the engine and capability providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Sender agent id
    pub sender: String,
    /// Receiver agent id
    pub receiver: String,
    pub kind: MessageKind,
    /// Message body; requests carry `action`, responses `result`, errors `error`
    #[serde(default)]
    pub payload: Payload,
    pub timestamp: DateTime<Utc>,
    /// Ties a response or error back to its request
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub metadata: Payload,
}

impl AgentMessage {
    /// Create a message stamped with the current time.
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        kind: MessageKind,
        payload: Payload,
    ) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            kind,
            payload,
            timestamp: Utc::now(),
            correlation_id: None,
            metadata: Payload::new(),
        }
    }

    /// Create a request carrying a fresh correlation id.
    pub fn request(sender: impl Into<String>, receiver: impl Into<String>, payload: Payload) -> Self {
        Self::new(sender, receiver, MessageKind::Request, payload)
            .with_correlation_id(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Build a reply to this message: sender and receiver swapped, same
    /// correlation id.
    pub fn reply(&self, kind: MessageKind, payload: Payload) -> Self {
        Self {
            sender: self.receiver.clone(),
            receiver: self.sender.clone(),
            kind,
            payload,
            timestamp: Utc::now(),
            correlation_id: self.correlation_id.clone(),
            metadata: Payload::new(),
        }
    }

    /// The declared `action` of a request payload.
    pub fn action(&self) -> Option<&str> {
        self.payload.get("action").and_then(Value::as_str)
    }

    pub fn is_error(&self) -> bool {
        self.kind == MessageKind::Error
    }

    /// Human readable error text of an Error envelope.
    pub fn error_text(&self) -> Option<String> {
        self.payload.get("error").map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Serialize to the wire form.
    pub fn to_wire(&self) -> Value {
        // Struct of strings, maps and a timestamp: serialization cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Reconstruct from the wire form.
    pub fn from_wire(value: &Value) -> Result<Self> {
        let kind = value
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::Validation("message kind is missing".to_string()))?;
        MessageKind::from_str(kind)?;

        serde_json::from_value(value.clone())
            .map_err(|e| AppError::Validation(format!("malformed message envelope: {}", e)))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| AppError::Validation(format!("message is not valid JSON: {}", e)))?;
        Self::from_wire(&value)
    }
}
