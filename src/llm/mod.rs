//! LLM Provider Clients
//!
//! The research, analysis and synthesis providers talk to a model through
//! the [`LLMClient`] trait. [`Provider`] picks the backend from
//! configuration.
//!
//! # Supported Providers
//!
//! Enable providers via Cargo features:
//! - `ollama` - Local Ollama server (default)

/// Core LLM client trait and provider selection.
pub mod client;

#[cfg(feature = "ollama")]
pub mod ollama;

pub use client::{LLMClient, Provider};
