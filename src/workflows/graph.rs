//! Stage graph
//!
//! The pipeline is a small state machine: Research, Analysis, Synthesis and
//! Finalize connected by conditional edges that end the run as soon as the
//! state is Failed. [`GraphBuilder`] describes the stages, `compile` checks
//! the shape and resolves each stage's provider from the registry once, and
//! the resulting [`WorkflowGraph`] can be reused for any number of runs.

use crate::agents::{Agent, AgentRegistry};
use crate::protocol::AgentMessage;
use crate::types::{AppError, Payload, Result};
use crate::workflows::output::SuccessOutput;
use crate::workflows::state::{AgentExecutionRecord, StateUpdate, WorkflowState, WorkflowStatus};
use chrono::Utc;
use futures::FutureExt;
use serde_json::{json, Value};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Sender id of every request the engine issues
pub const ENGINE_SENDER: &str = "orchestrator";

// ============= Stages =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Research,
    Analysis,
    Synthesis,
    Finalize,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Research,
        Stage::Analysis,
        Stage::Synthesis,
        Stage::Finalize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Research => "research",
            Stage::Analysis => "analysis",
            Stage::Synthesis => "synthesis",
            Stage::Finalize => "finalize",
        }
    }

    /// Action requested from the stage's provider; `None` for Finalize
    pub fn action(&self) -> Option<&'static str> {
        match self {
            Stage::Research => Some("web_search"),
            Stage::Analysis => Some("analyze_data"),
            Stage::Synthesis => Some("create_report"),
            Stage::Finalize => None,
        }
    }

    /// Status the state moves to when the stage succeeds
    pub fn success_status(&self) -> WorkflowStatus {
        match self {
            Stage::Research => WorkflowStatus::Researching,
            Stage::Analysis => WorkflowStatus::Analyzing,
            Stage::Synthesis => WorkflowStatus::Synthesizing,
            Stage::Finalize => WorkflowStatus::Completed,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider ids backing the three provider stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageAgents {
    pub research: String,
    pub analysis: String,
    pub synthesis: String,
}

impl Default for StageAgents {
    fn default() -> Self {
        Self {
            research: "research_agent".to_string(),
            analysis: "analysis_agent".to_string(),
            synthesis: "synthesis_agent".to_string(),
        }
    }
}

impl StageAgents {
    pub fn for_stage(&self, stage: Stage) -> Option<&str> {
        match stage {
            Stage::Research => Some(&self.research),
            Stage::Analysis => Some(&self.analysis),
            Stage::Synthesis => Some(&self.synthesis),
            Stage::Finalize => None,
        }
    }
}

/// Routing decision taken after every stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Continue,
    End,
}

/// Continue unless the state has failed
pub fn should_continue(state: &WorkflowState) -> Route {
    if state.is_failed() {
        Route::End
    } else {
        Route::Continue
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    /// Go to the stage when [`should_continue`] allows it, otherwise end
    Conditional(Stage),
    End,
}

// ============= Builder =============

#[derive(Default)]
pub struct GraphBuilder {
    entry: Option<Stage>,
    stages: Vec<(Stage, Option<String>)>,
    edges: HashMap<Stage, Edge>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stage, backed by the provider `agent_id` when it has an action
    pub fn add_stage(mut self, stage: Stage, agent_id: Option<&str>) -> Self {
        self.stages.push((stage, agent_id.map(str::to_string)));
        self
    }

    pub fn set_entry(mut self, stage: Stage) -> Self {
        self.entry = Some(stage);
        self
    }

    pub fn add_conditional_edge(mut self, from: Stage, to: Stage) -> Self {
        self.edges.insert(from, Edge::Conditional(to));
        self
    }

    pub fn add_finish(mut self, stage: Stage) -> Self {
        self.edges.insert(stage, Edge::End);
        self
    }

    /// Validate the graph and resolve every provider from `registry`
    pub fn compile(self, registry: &AgentRegistry) -> Result<WorkflowGraph> {
        let entry = self
            .entry
            .ok_or_else(|| AppError::Configuration("Workflow graph has no entry stage".to_string()))?;

        let mut nodes = HashMap::with_capacity(self.stages.len());
        for (stage, agent_id) in self.stages {
            let agent = match (stage.action(), agent_id) {
                (Some(action), Some(agent_id)) => {
                    let agent = registry.require(&agent_id)?;
                    if !agent.has_capability(action) {
                        return Err(AppError::Configuration(format!(
                            "Agent '{}' does not advertise '{}' required by the {} stage",
                            agent_id, action, stage
                        )));
                    }
                    Some(agent)
                }
                (Some(_), None) => {
                    return Err(AppError::Configuration(format!(
                        "Stage '{}' needs a provider",
                        stage
                    )))
                }
                (None, Some(agent_id)) => {
                    return Err(AppError::Configuration(format!(
                        "Stage '{}' does not take a provider, got '{}'",
                        stage, agent_id
                    )))
                }
                (None, None) => None,
            };

            let next = *self.edges.get(&stage).ok_or_else(|| {
                AppError::Configuration(format!("Stage '{}' has no outgoing edge", stage))
            })?;

            if nodes.insert(stage, Node { stage, agent, next }).is_some() {
                return Err(AppError::Configuration(format!(
                    "Stage '{}' was added twice",
                    stage
                )));
            }
        }

        if !nodes.contains_key(&entry) {
            return Err(AppError::Configuration(format!(
                "Entry stage '{}' was never added",
                entry
            )));
        }
        for (from, edge) in &self.edges {
            if !nodes.contains_key(from) {
                return Err(AppError::Configuration(format!(
                    "Edge starts at unknown stage '{}'",
                    from
                )));
            }
            if let Edge::Conditional(to) = edge {
                if !nodes.contains_key(to) {
                    return Err(AppError::Configuration(format!(
                        "Edge from '{}' points to unknown stage '{}'",
                        from, to
                    )));
                }
            }
        }

        // Walk from the entry: every stage must be reached exactly once
        let mut order = Vec::with_capacity(nodes.len());
        let mut seen = HashSet::new();
        let mut current = Some(entry);
        while let Some(stage) = current {
            if !seen.insert(stage) {
                return Err(AppError::Configuration(format!(
                    "Workflow graph has a cycle through '{}'",
                    stage
                )));
            }
            order.push(stage);
            current = match nodes.get(&stage).map(|node| node.next) {
                Some(Edge::Conditional(next)) => Some(next),
                _ => None,
            };
        }
        if let Some(orphan) = nodes.keys().find(|stage| !seen.contains(*stage)) {
            return Err(AppError::Configuration(format!(
                "Stage '{}' is unreachable from the entry stage",
                orphan
            )));
        }

        // The reducer must accept every success status along the walk
        let mut status = WorkflowStatus::Pending;
        for stage in &order {
            let next = stage.success_status();
            if !status.can_transition_to(next) {
                return Err(AppError::Configuration(format!(
                    "Stage '{}' cannot follow status '{}'",
                    stage, status
                )));
            }
            status = next;
        }

        Ok(WorkflowGraph {
            entry,
            order,
            nodes,
        })
    }
}

// ============= Compiled Graph =============

struct Node {
    stage: Stage,
    agent: Option<Arc<dyn Agent>>,
    next: Edge,
}

pub struct WorkflowGraph {
    entry: Stage,
    order: Vec<Stage>,
    nodes: HashMap<Stage, Node>,
}

impl WorkflowGraph {
    /// Research → Analysis → Synthesis → Finalize, ending early on failure
    pub fn standard(registry: &AgentRegistry, agents: &StageAgents) -> Result<Self> {
        GraphBuilder::new()
            .add_stage(Stage::Research, agents.for_stage(Stage::Research))
            .add_stage(Stage::Analysis, agents.for_stage(Stage::Analysis))
            .add_stage(Stage::Synthesis, agents.for_stage(Stage::Synthesis))
            .add_stage(Stage::Finalize, None)
            .set_entry(Stage::Research)
            .add_conditional_edge(Stage::Research, Stage::Analysis)
            .add_conditional_edge(Stage::Analysis, Stage::Synthesis)
            .add_conditional_edge(Stage::Synthesis, Stage::Finalize)
            .add_finish(Stage::Finalize)
            .compile(registry)
    }

    /// Stages in execution order
    pub fn stages(&self) -> &[Stage] {
        &self.order
    }

    /// Provider id resolved for a stage at compile time
    pub fn agent_id(&self, stage: Stage) -> Option<&str> {
        self.nodes
            .get(&stage)
            .and_then(|node| node.agent.as_ref())
            .map(|agent| agent.id())
    }

    /// Drive a fresh state to a terminal status.
    ///
    /// Stage failures end up in the returned state; an `Err` means the run
    /// could not be driven at all (bad initial state, rejected update).
    pub async fn run(&self, mut state: WorkflowState) -> Result<WorkflowState> {
        if state.status() != WorkflowStatus::Pending {
            return Err(AppError::Validation(format!(
                "Task {} must start in the pending status, found {}",
                state.task_id,
                state.status()
            )));
        }

        let mut current = Some(self.entry);
        while let Some(stage) = current {
            let span = tracing::info_span!("stage", task_id = %state.task_id, stage = %stage);
            let update = self.execute_stage(stage, &state).instrument(span).await?;
            state.apply(update)?;

            current = match self.node(stage)?.next {
                Edge::End => None,
                Edge::Conditional(next) => match should_continue(&state) {
                    Route::Continue => Some(next),
                    Route::End => {
                        tracing::debug!(task_id = %state.task_id, after = %stage, "Ending run after failure");
                        None
                    }
                },
            };
        }

        Ok(state)
    }

    /// Run the logic of one stage against `state` without applying it.
    pub async fn execute_stage(&self, stage: Stage, state: &WorkflowState) -> Result<StateUpdate> {
        let node = self.node(stage)?;

        let update = match stage {
            Stage::Research => {
                let payload = request_payload(
                    stage,
                    json!({
                        "topic": state.query,
                        "include_news": state.options.include_news,
                        "deep_search": state.options.deep_search,
                    }),
                );
                self.invoke(node, state, payload).await
            }
            Stage::Analysis => {
                if !state.has_research() {
                    return Ok(precondition_failed(stage));
                }
                let payload = request_payload(
                    stage,
                    json!({
                        "topic": state.query,
                        "research_data": state.research(),
                    }),
                );
                self.invoke(node, state, payload).await
            }
            Stage::Synthesis => {
                if !state.has_research() {
                    return Ok(precondition_failed(stage));
                }
                let mut payload = request_payload(
                    stage,
                    json!({
                        "topic": state.query,
                        "research_data": state.research(),
                        "output_format": state.options.output_format,
                    }),
                );
                if state.has_analysis() {
                    payload.insert(
                        "analysis_data".to_string(),
                        state.analysis().cloned().unwrap_or(Value::Null),
                    );
                }
                self.invoke(node, state, payload).await
            }
            Stage::Finalize => finalize(state),
        };

        Ok(update)
    }

    fn node(&self, stage: Stage) -> Result<&Node> {
        self.nodes.get(&stage).ok_or_else(|| {
            AppError::Internal(format!("Stage '{}' is not part of this graph", stage))
        })
    }

    /// Call the stage's provider and turn the outcome into a state update
    async fn invoke(&self, node: &Node, state: &WorkflowState, payload: Payload) -> StateUpdate {
        let stage = node.stage;
        let Some(agent) = node.agent.as_ref() else {
            return StateUpdate::failed(
                AppError::Internal(format!("Stage '{}' has no provider", stage)).to_string(),
                None,
            );
        };
        let agent_id = agent.id().to_string();
        let correlation_id = format!("{}:{}", state.task_id, stage);
        let request = AgentMessage::request(ENGINE_SENDER, agent_id.as_str(), payload)
            .with_correlation_id(correlation_id.as_str());

        let started = Instant::now();
        let outcome = AssertUnwindSafe(agent.process(request)).catch_unwind().await;
        let elapsed = started.elapsed();

        let result = match outcome {
            Err(panic) => Err(AppError::capability(
                &agent_id,
                format!("provider panicked: {}", panic_message(&*panic)),
            )),
            Ok(Err(err @ AppError::Capability { .. })) => Err(err),
            Ok(Err(err)) => Err(AppError::capability(&agent_id, err.to_string())),
            Ok(Ok(response)) => read_response(&agent_id, &correlation_id, response),
        };

        match result {
            Ok(result) => {
                let record = AgentExecutionRecord::succeeded(&agent_id, digest(stage, &result), elapsed);
                tracing::info!(
                    agent_id = %agent_id,
                    duration_seconds = record.duration_seconds,
                    "Stage completed"
                );

                let mut update = StateUpdate {
                    status: Some(stage.success_status()),
                    current_agent: Some(agent_id),
                    history: vec![record],
                    ..Default::default()
                };
                match stage {
                    Stage::Research => update.research = Some(result),
                    Stage::Analysis => update.analysis = Some(result),
                    Stage::Synthesis => update.synthesis = Some(result),
                    Stage::Finalize => {}
                }
                update
            }
            Err(err) => {
                let message = err.to_string();
                tracing::warn!(agent_id = %agent_id, error = %message, "Stage failed");
                let record = AgentExecutionRecord::failed(&agent_id, &message, elapsed);
                StateUpdate::failed(message, Some(record))
            }
        }
    }
}

fn request_payload(stage: Stage, params: Value) -> Payload {
    let mut payload = match params {
        Value::Object(map) => map,
        _ => Payload::new(),
    };
    if let Some(action) = stage.action() {
        payload.insert("action".to_string(), json!(action));
    }
    payload
}

fn precondition_failed(stage: Stage) -> StateUpdate {
    let err = AppError::Validation(format!(
        "The {} stage requires research results, but none are available",
        stage
    ));
    tracing::warn!(stage = %stage, "Stage precondition not met");
    StateUpdate::failed(err.to_string(), None)
}

fn finalize(state: &WorkflowState) -> StateUpdate {
    let completed_at = Utc::now();
    let mut summary = state.summarize();
    summary.status = WorkflowStatus::Completed;
    summary.completed_at = Some(completed_at);

    let output = SuccessOutput::assemble(state, summary);
    tracing::info!(
        total_duration_seconds = output.total_duration_seconds,
        "Workflow completed"
    );

    StateUpdate {
        status: Some(WorkflowStatus::Completed),
        completed_at: Some(completed_at),
        final_output: Some(output),
        ..Default::default()
    }
}

/// Extract `result` from a provider's reply
fn read_response(agent_id: &str, correlation_id: &str, response: AgentMessage) -> Result<Value> {
    if response.correlation_id.as_deref() != Some(correlation_id) {
        return Err(AppError::capability(
            agent_id,
            format!(
                "response correlation id {:?} does not match request '{}'",
                response.correlation_id, correlation_id
            ),
        ));
    }
    if response.is_error() {
        let message = response
            .error_text()
            .unwrap_or_else(|| "provider returned an error without a message".to_string());
        return Err(AppError::capability(agent_id, message));
    }
    let mut payload = response.payload;
    payload
        .remove("result")
        .ok_or_else(|| AppError::capability(agent_id, "response carries no result"))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Small per-stage summary kept in the execution history
fn digest(stage: Stage, result: &Value) -> Payload {
    let count = |key: &str| result.get(key).and_then(Value::as_array).map_or(0, Vec::len);
    let mut digest = Payload::new();
    match stage {
        Stage::Research => {
            digest.insert("web_results".to_string(), json!(count("web_results")));
            digest.insert("news_results".to_string(), json!(count("news_results")));
        }
        Stage::Analysis => {
            digest.insert("themes_found".to_string(), json!(count("themes")));
        }
        Stage::Synthesis => {
            let word_count = result.get("word_count").and_then(Value::as_u64).unwrap_or(0);
            digest.insert("word_count".to_string(), json!(word_count));
            if let Some(path) = result.get("file_path") {
                digest.insert("file_path".to_string(), path.clone());
            }
        }
        Stage::Finalize => {}
    }
    digest
}

impl WorkflowGraph {
    /// Text diagram of the compiled pipeline
    pub fn render_ascii(&self) -> String {
        let mut lines = vec!["[start]".to_string(), "   |".to_string()];

        for stage in &self.order {
            let Some(node) = self.nodes.get(stage) else {
                continue;
            };
            let label = match (node.agent.as_ref(), stage.action()) {
                (Some(agent), Some(action)) => format!("{} ({} :: {})", stage, agent.id(), action),
                _ => stage.to_string(),
            };
            lines.push(format!("   v\n{}", label));
            match node.next {
                Edge::Conditional(_) => {
                    lines.push("   |--[failed]--> [end]".to_string());
                    lines.push("   |".to_string());
                }
                Edge::End => {
                    lines.push("   |".to_string());
                    lines.push("   v\n[end]".to_string());
                }
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentRegistryBuilder;
    use crate::protocol::{CapabilityDescriptor, MessageKind};
    use crate::workflows::state::WorkflowOptions;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubAgent {
        id: &'static str,
        action: &'static str,
        result: Value,
        calls: AtomicUsize,
    }

    impl StubAgent {
        fn new(id: &'static str, action: &'static str, result: Value) -> Arc<Self> {
            Arc::new(Self {
                id,
                action,
                result,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Agent for StubAgent {
        fn id(&self) -> &str {
            self.id
        }

        fn capabilities(&self) -> Vec<CapabilityDescriptor> {
            vec![CapabilityDescriptor::new(self.action, "stub", Value::Null, Value::Null)]
        }

        async fn process(&self, request: AgentMessage) -> Result<AgentMessage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut payload = Payload::new();
            payload.insert("result".to_string(), self.result.clone());
            Ok(request.reply(MessageKind::Response, payload))
        }
    }

    fn registry() -> (AgentRegistry, Arc<StubAgent>) {
        let analysis = StubAgent::new("analysis_agent", "analyze_data", json!({"themes": ["a"]}));
        let registry = AgentRegistryBuilder::new()
            .with_agent(StubAgent::new(
                "research_agent",
                "web_search",
                json!({"web_results": [1, 2, 3]}),
            ))
            .with_agent(analysis.clone())
            .with_agent(StubAgent::new(
                "synthesis_agent",
                "create_report",
                json!({"word_count": 12, "report_preview": "# Report"}),
            ))
            .build();
        (registry, analysis)
    }

    #[test]
    fn test_standard_graph_compiles() {
        let (registry, _) = registry();
        let graph = WorkflowGraph::standard(&registry, &StageAgents::default()).unwrap();

        assert_eq!(graph.stages(), &Stage::ALL);
        assert_eq!(graph.agent_id(Stage::Analysis), Some("analysis_agent"));
        assert_eq!(graph.agent_id(Stage::Finalize), None);
    }

    #[test]
    fn test_compile_rejects_missing_provider() {
        let registry = AgentRegistry::new();
        let result = WorkflowGraph::standard(&registry, &StageAgents::default());
        assert!(matches!(result, Err(AppError::Routing(_))));
    }

    #[test]
    fn test_compile_rejects_provider_without_capability() {
        let (registry, _) = registry();
        let agents = StageAgents {
            analysis: "research_agent".to_string(),
            ..Default::default()
        };
        let result = WorkflowGraph::standard(&registry, &agents);
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_compile_rejects_cycles_and_dangling_edges() {
        let (registry, _) = registry();

        let cyclic = GraphBuilder::new()
            .add_stage(Stage::Research, Some("research_agent"))
            .add_stage(Stage::Analysis, Some("analysis_agent"))
            .set_entry(Stage::Research)
            .add_conditional_edge(Stage::Research, Stage::Analysis)
            .add_conditional_edge(Stage::Analysis, Stage::Research)
            .compile(&registry);
        assert!(matches!(cyclic, Err(AppError::Configuration(_))));

        let dangling = GraphBuilder::new()
            .add_stage(Stage::Research, Some("research_agent"))
            .set_entry(Stage::Research)
            .add_conditional_edge(Stage::Research, Stage::Analysis)
            .compile(&registry);
        assert!(matches!(dangling, Err(AppError::Configuration(_))));

        let no_entry = GraphBuilder::new()
            .add_stage(Stage::Finalize, None)
            .add_finish(Stage::Finalize)
            .compile(&registry);
        assert!(matches!(no_entry, Err(AppError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_run_reaches_completed() {
        let (registry, _) = registry();
        let graph = WorkflowGraph::standard(&registry, &StageAgents::default()).unwrap();
        let state = WorkflowState::new("q", "task_0001", WorkflowOptions::default());

        let state = graph.run(state).await.unwrap();
        assert_eq!(state.status(), WorkflowStatus::Completed);
        assert_eq!(state.history().len(), 3);
        assert!(state.completed_at.is_some());
        assert_eq!(state.history()[0].digest["web_results"], 3);

        let output = state.final_output.unwrap();
        assert_eq!(output.summary.status, WorkflowStatus::Completed);
        assert_eq!(output.report.unwrap().word_count, 12);
    }

    #[tokio::test]
    async fn test_analysis_precondition_skips_provider() {
        let (registry, analysis) = registry();
        let graph = WorkflowGraph::standard(&registry, &StageAgents::default()).unwrap();
        let mut state = WorkflowState::new("q", "task_0001", WorkflowOptions::default());

        let update = graph.execute_stage(Stage::Analysis, &state).await.unwrap();
        state.apply(update).unwrap();

        assert_eq!(state.status(), WorkflowStatus::Failed);
        assert!(!state.errors().is_empty());
        assert_eq!(analysis.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_rejects_non_pending_state() {
        let (registry, _) = registry();
        let graph = WorkflowGraph::standard(&registry, &StageAgents::default()).unwrap();
        let mut state = WorkflowState::new("q", "task_0001", WorkflowOptions::default());
        state.apply(StateUpdate::failed("earlier", None)).unwrap();

        assert!(matches!(
            graph.run(state).await,
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_render_ascii_lists_stages() {
        let (registry, _) = registry();
        let graph = WorkflowGraph::standard(&registry, &StageAgents::default()).unwrap();
        let diagram = graph.render_ascii();

        assert!(diagram.starts_with("[start]"));
        assert!(diagram.contains("research (research_agent :: web_search)"));
        assert!(diagram.contains("finalize"));
        assert!(diagram.trim_end().ends_with("[end]"));
    }
}
