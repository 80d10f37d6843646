//! # Conclave - multi-agent research orchestration
//!
//! Three capability providers (research, analysis, synthesis) cooperate over
//! a shared workflow state, driven through a fixed stage graph:
//!
//! ```text
//! research ──▶ analysis ──▶ synthesis ──▶ finalize
//!     │            │            │
//!     └────────────┴────────────┴──▶ END (on failure)
//! ```
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use conclave::{ConclaveConfig, ResearchOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> conclave::Result<()> {
//!     let config = ConclaveConfig::load_or_default("conclave.toml")?;
//!     let orchestrator = ResearchOrchestrator::from_config(&config).await?;
//!
//!     let output = orchestrator.run("solid state batteries", &Default::default()).await;
//!     println!("{}", serde_json::to_string_pretty(&output.to_value())?);
//!     Ok(())
//! }
//! ```
//!
//! ### Custom providers
//!
//! Anything implementing [`Agent`] can stand in for a built-in provider as
//! long as it advertises the stage's action:
//!
//! ```rust,ignore
//! let registry = AgentRegistryBuilder::new()
//!     .with_agent(Arc::new(MyResearcher::new()))
//!     .with_agent(Arc::new(AnalysisAgent::new("analysis_agent", llm.clone())?))
//!     .with_agent(Arc::new(SynthesisAgent::new("synthesis_agent", llm, "reports")?))
//!     .build();
//! let orchestrator = ResearchOrchestrator::new(Arc::new(registry))?;
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Ollama local inference (default) |
//!
//! Building with `--no-default-features` leaves the engine and the providers
//! in place; [`Provider::create_client`] then reports that no backend is
//! compiled in.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// Agent trait, action dispatch and the agent registry.
pub mod agents;
/// Command line front end.
pub mod cli;
/// LLM provider clients and abstractions.
pub mod llm;
/// Message envelope and capability descriptors.
pub mod protocol;
/// Built-in research, analysis and synthesis providers.
pub mod providers;
/// Web search and page fetching.
pub mod tools;
/// Core types and error handling.
pub mod types;
/// Configuration and logging setup.
pub mod utils;
/// Workflow state, stage graph and orchestrator.
pub mod workflows;

// Re-export commonly used types
pub use agents::{Agent, AgentRegistry, AgentRegistryBuilder};
pub use llm::{LLMClient, Provider};
pub use protocol::{AgentMessage, CapabilityDescriptor, MessageKind};
pub use providers::{AnalysisAgent, ResearchAgent, SynthesisAgent};
pub use tools::search::SearchBackend;
pub use types::{AppError, Payload, Result};
pub use utils::config::ConclaveConfig;
pub use workflows::{
    ResearchOrchestrator, WorkflowOptions, WorkflowOutput, WorkflowState, WorkflowStatus,
};
