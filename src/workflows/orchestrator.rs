//! Research orchestrator
//!
//! Entry point for running the pipeline. The graph is compiled once when the
//! orchestrator is built and reused for every run; each run gets its own
//! task id and a fresh [`WorkflowState`].

use crate::agents::AgentRegistry;
use crate::llm::{LLMClient, Provider};
use crate::providers;
use crate::tools::search::{DaedraSearch, SearchBackend};
use crate::types::{Payload, Result};
use crate::utils::config::ConclaveConfig;
use crate::workflows::graph::{StageAgents, WorkflowGraph};
use crate::workflows::output::{FailureOutput, WorkflowOutput};
use crate::workflows::state::{WorkflowOptions, WorkflowState};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::Instrument;

pub struct ResearchOrchestrator {
    registry: Arc<AgentRegistry>,
    graph: WorkflowGraph,
    run_counter: AtomicU64,
}

impl ResearchOrchestrator {
    /// Build with the default provider ids
    pub fn new(registry: Arc<AgentRegistry>) -> Result<Self> {
        Self::with_stage_agents(registry, StageAgents::default())
    }

    pub fn with_stage_agents(registry: Arc<AgentRegistry>, agents: StageAgents) -> Result<Self> {
        let graph = WorkflowGraph::standard(&registry, &agents)?;
        tracing::debug!(
            research = %agents.research,
            analysis = %agents.analysis,
            synthesis = %agents.synthesis,
            "Compiled workflow graph"
        );

        Ok(Self {
            registry,
            graph,
            run_counter: AtomicU64::new(0),
        })
    }

    /// Wire the built-in providers from configuration
    pub async fn from_config(config: &ConclaveConfig) -> Result<Self> {
        let provider = Provider::from_config(&config.llm)?;
        let llm: Arc<dyn LLMClient> = Arc::from(provider.create_client().await?);
        let search: Arc<dyn SearchBackend> = Arc::new(DaedraSearch::new(&config.search));
        Self::from_backends(config, llm, search)
    }

    /// Like [`from_config`](Self::from_config) with caller supplied backends
    pub fn from_backends(
        config: &ConclaveConfig,
        llm: Arc<dyn LLMClient>,
        search: Arc<dyn SearchBackend>,
    ) -> Result<Self> {
        let registry = providers::standard_registry(config, llm, search)?;
        Self::with_stage_agents(Arc::new(registry), config.agents.stage_agents())
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    /// Number of runs started so far
    pub fn runs_started(&self) -> u64 {
        self.run_counter.load(Ordering::SeqCst)
    }

    fn next_task_id(&self) -> String {
        let sequence = self.run_counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("task_{:04}", sequence)
    }

    /// Run the pipeline with a raw option map.
    ///
    /// Never fails: every problem ends up in a [`WorkflowOutput::Error`].
    pub async fn run(&self, query: &str, options: &Payload) -> WorkflowOutput {
        let task_id = self.next_task_id();
        match WorkflowOptions::from_map(options) {
            Ok(options) => self.run_task(task_id, query, options).await,
            Err(err) => {
                tracing::warn!(task_id = %task_id, error = %err, "Rejected workflow options");
                WorkflowOutput::Error(FailureOutput::degraded(&task_id, err.to_string()))
            }
        }
    }

    pub async fn run_with_options(&self, query: &str, options: WorkflowOptions) -> WorkflowOutput {
        let task_id = self.next_task_id();
        self.run_task(task_id, query, options).await
    }

    async fn run_task(&self, task_id: String, query: &str, options: WorkflowOptions) -> WorkflowOutput {
        let span = tracing::info_span!("workflow", task_id = %task_id);

        async move {
            tracing::info!(query = %query, "Starting research workflow");
            let state = WorkflowState::new(query, task_id.as_str(), options);

            let outcome = AssertUnwindSafe(self.graph.run(state)).catch_unwind().await;
            match outcome {
                Ok(Ok(state)) => match state.final_output.clone() {
                    Some(output) => WorkflowOutput::Success(output),
                    None => {
                        tracing::warn!(errors = state.errors().len(), "Workflow failed");
                        WorkflowOutput::Error(FailureOutput::from_state(&state))
                    }
                },
                Ok(Err(err)) => {
                    tracing::error!(error = %err, "Workflow engine error");
                    WorkflowOutput::Error(FailureOutput::degraded(&task_id, err.to_string()))
                }
                Err(_) => {
                    tracing::error!("Workflow engine panicked");
                    WorkflowOutput::Error(FailureOutput::degraded(
                        &task_id,
                        "Internal error: workflow engine panicked",
                    ))
                }
            }
        }
        .instrument(span)
        .await
    }
}
