//! Workflow Module
//!
//! The research pipeline: shared state, the stage graph that drives it and
//! the orchestrator facade callers use.
//!
//! # Usage
//!
//! ```ignore
//! let orchestrator = ResearchOrchestrator::new(Arc::new(registry))?;
//! let output = orchestrator.run("solid state batteries", &Payload::new()).await;
//! println!("{}", output.to_value());
//! ```

pub mod graph;
pub mod orchestrator;
pub mod output;
pub mod state;

pub use graph::{should_continue, GraphBuilder, Route, Stage, StageAgents, WorkflowGraph};
pub use orchestrator::ResearchOrchestrator;
pub use output::{
    FailureOutput, InsightsBlock, PartialResults, ReportBlock, SuccessOutput, WorkflowOutput,
};
pub use state::{
    AgentExecutionRecord, OutputFormat, StateSummary, StateUpdate, WorkflowOptions, WorkflowState,
    WorkflowStatus,
};
