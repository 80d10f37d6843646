use serde_json::{Map, Value};

// ============= Shared Aliases =============

/// Opaque structured map used for envelope payloads, metadata, result slots
/// and execution digests.
pub type Payload = Map<String, Value>;

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed envelope or violated stage precondition.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Failure surfaced by a capability provider.
    #[error("Capability error in '{agent_id}': {message}")]
    Capability { agent_id: String, message: String },

    /// Envelope addressed to an unregistered provider.
    #[error("Routing error: {0}")]
    Routing(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Wrap any failure message as a capability error for `agent_id`.
    pub fn capability(agent_id: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Capability {
            agent_id: agent_id.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Truncate to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_error_names_agent() {
        let err = AppError::capability("research_agent", "search backend unreachable");
        let text = err.to_string();
        assert!(text.contains("research_agent"));
        assert!(text.contains("search backend unreachable"));
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("àèìòù", 2), "àè");
        assert_eq!(truncate_chars("", 5), "");
    }
}
