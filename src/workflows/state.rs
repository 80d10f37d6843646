//! Workflow state shared by the pipeline stages
//!
//! A [`WorkflowState`] is the blackboard of one run: stages read the slots
//! written by earlier stages and return a [`StateUpdate`] that the engine
//! folds back in with [`WorkflowState::apply`]. The accumulators (`history`,
//! `errors`) only ever grow.

use crate::types::{truncate_chars, AppError, Payload, Result};
use crate::workflows::output::SuccessOutput;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Maximum query length kept in a [`StateSummary`]
const SUMMARY_QUERY_CHARS: usize = 100;

// ============= Status =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Pending,
    Researching,
    Analyzing,
    Synthesizing,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::Researching => "researching",
            WorkflowStatus::Analyzing => "analyzing",
            WorkflowStatus::Synthesizing => "synthesizing",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
        }
    }

    /// Position in the forward order; `None` for Failed
    fn rank(&self) -> Option<u8> {
        match self {
            WorkflowStatus::Pending => Some(0),
            WorkflowStatus::Researching => Some(1),
            WorkflowStatus::Analyzing => Some(2),
            WorkflowStatus::Synthesizing => Some(3),
            WorkflowStatus::Completed => Some(4),
            WorkflowStatus::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Failed)
    }

    /// Forward moves follow the rank order and may skip a status (a graph
    /// without Analysis goes Researching -> Synthesizing). Failed is
    /// reachable from any non-terminal status and nothing leaves a terminal
    /// status.
    pub fn can_transition_to(&self, next: WorkflowStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (Some(current), Some(next)) => next > current,
            (None, Some(_)) => false,
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============= Options =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Html,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "markdown",
            OutputFormat::Html => "html",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Html => "html",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "html" => Ok(OutputFormat::Html),
            other => Err(AppError::Validation(format!(
                "output_format must be 'markdown' or 'html', got '{}'",
                other
            ))),
        }
    }
}

/// Recognised run options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowOptions {
    /// Passed through to the research agent
    #[serde(default = "default_true")]
    pub include_news: bool,

    /// Passed through to the research agent
    #[serde(default)]
    pub deep_search: bool,

    /// Passed through to the synthesis agent
    #[serde(default)]
    pub output_format: OutputFormat,
}

fn default_true() -> bool {
    true
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            include_news: true,
            deep_search: false,
            output_format: OutputFormat::Markdown,
        }
    }
}

impl WorkflowOptions {
    /// Read the recognised keys of a caller supplied option map.
    ///
    /// Unknown keys are ignored; a recognised key with the wrong type is a
    /// validation error.
    pub fn from_map(map: &Payload) -> Result<Self> {
        let mut options = Self::default();

        for (key, value) in map {
            match key.as_str() {
                "include_news" => options.include_news = expect_bool(key, value)?,
                "deep_search" => options.deep_search = expect_bool(key, value)?,
                "output_format" => {
                    let format = value.as_str().ok_or_else(|| {
                        AppError::Validation("output_format must be a string".to_string())
                    })?;
                    options.output_format = OutputFormat::parse(format)?;
                }
                other => tracing::debug!(option = %other, "Ignoring unrecognised workflow option"),
            }
        }

        Ok(options)
    }
}

fn expect_bool(key: &str, value: &Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| AppError::Validation(format!("{} must be a boolean", key)))
}

// ============= Execution Records =============

/// One agent invocation as seen by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentExecutionRecord {
    pub agent_id: String,
    pub success: bool,
    /// Small summary of the result, never the full payload
    pub digest: Payload,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub duration_seconds: f64,
}

impl AgentExecutionRecord {
    pub fn succeeded(agent_id: &str, digest: Payload, duration: Duration) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            success: true,
            digest,
            error: None,
            timestamp: Utc::now(),
            duration_seconds: round_to(duration.as_secs_f64(), 2),
        }
    }

    pub fn failed(agent_id: &str, error: &str, duration: Duration) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            success: false,
            digest: Payload::new(),
            error: Some(error.to_string()),
            timestamp: Utc::now(),
            duration_seconds: round_to(duration.as_secs_f64(), 2),
        }
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// ============= Workflow State =============

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowState {
    pub task_id: String,
    pub query: String,
    pub options: WorkflowOptions,
    status: WorkflowStatus,
    /// Agent that produced the most recent committed result
    pub current_agent: Option<String>,

    research: Option<Value>,
    analysis: Option<Value>,
    synthesis: Option<Value>,

    history: Vec<AgentExecutionRecord>,
    errors: Vec<String>,

    pub final_output: Option<SuccessOutput>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Partial update returned by a stage and folded in by [`WorkflowState::apply`]
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub status: Option<WorkflowStatus>,
    pub current_agent: Option<String>,
    pub research: Option<Value>,
    pub analysis: Option<Value>,
    pub synthesis: Option<Value>,
    pub history: Vec<AgentExecutionRecord>,
    pub errors: Vec<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub final_output: Option<SuccessOutput>,
}

impl StateUpdate {
    /// A failed stage: status Failed, one error, optionally the failed record
    pub fn failed(error: impl Into<String>, record: Option<AgentExecutionRecord>) -> Self {
        Self {
            status: Some(WorkflowStatus::Failed),
            errors: vec![error.into()],
            history: record.into_iter().collect(),
            ..Default::default()
        }
    }
}

impl WorkflowState {
    /// Fresh state for a new run
    pub fn new(query: impl Into<String>, task_id: impl Into<String>, options: WorkflowOptions) -> Self {
        Self {
            task_id: task_id.into(),
            query: query.into(),
            options,
            status: WorkflowStatus::Pending,
            current_agent: None,
            research: None,
            analysis: None,
            synthesis: None,
            history: Vec::new(),
            errors: Vec::new(),
            final_output: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn status(&self) -> WorkflowStatus {
        self.status
    }

    pub fn research(&self) -> Option<&Value> {
        self.research.as_ref()
    }

    pub fn analysis(&self) -> Option<&Value> {
        self.analysis.as_ref()
    }

    pub fn synthesis(&self) -> Option<&Value> {
        self.synthesis.as_ref()
    }

    pub fn history(&self) -> &[AgentExecutionRecord] {
        &self.history
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn append_history(&mut self, record: AgentExecutionRecord) {
        self.history.push(record);
    }

    pub fn append_errors<I>(&mut self, messages: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.errors.extend(messages);
    }

    pub fn has_research(&self) -> bool {
        is_populated(&self.research)
    }

    pub fn has_analysis(&self) -> bool {
        is_populated(&self.analysis)
    }

    pub fn has_synthesis(&self) -> bool {
        is_populated(&self.synthesis)
    }

    pub fn is_failed(&self) -> bool {
        self.status == WorkflowStatus::Failed
    }

    /// Fold a stage's partial update into the state.
    ///
    /// The update is checked as a whole before anything is written: a status
    /// change must be a legal transition and a result slot may only be
    /// written once. Accumulators are appended in order.
    pub fn apply(&mut self, update: StateUpdate) -> Result<()> {
        if let Some(next) = update.status {
            if !self.status.can_transition_to(next) {
                return Err(AppError::Validation(format!(
                    "Illegal status transition {} -> {} for task {}",
                    self.status, next, self.task_id
                )));
            }
        }
        for (slot, current, incoming) in [
            ("research", &self.research, &update.research),
            ("analysis", &self.analysis, &update.analysis),
            ("synthesis", &self.synthesis, &update.synthesis),
        ] {
            if current.is_some() && incoming.is_some() {
                return Err(AppError::Validation(format!(
                    "The {} slot of task {} is already populated",
                    slot, self.task_id
                )));
            }
        }
        if self.final_output.is_some() && update.final_output.is_some() {
            return Err(AppError::Validation(format!(
                "Final output of task {} is already set",
                self.task_id
            )));
        }

        if let Some(status) = update.status {
            self.status = status;
        }
        if update.current_agent.is_some() {
            self.current_agent = update.current_agent;
        }
        if update.research.is_some() {
            self.research = update.research;
        }
        if update.analysis.is_some() {
            self.analysis = update.analysis;
        }
        if update.synthesis.is_some() {
            self.synthesis = update.synthesis;
        }
        for record in update.history {
            self.append_history(record);
        }
        self.append_errors(update.errors);
        if update.completed_at.is_some() {
            self.completed_at = update.completed_at;
        }
        if update.final_output.is_some() {
            self.final_output = update.final_output;
        }

        Ok(())
    }

    /// Diagnostic projection of the state
    pub fn summarize(&self) -> StateSummary {
        StateSummary {
            task_id: self.task_id.clone(),
            query: truncate_chars(&self.query, SUMMARY_QUERY_CHARS),
            status: self.status,
            current_agent: self.current_agent.clone(),
            agents_completed: self.history.len(),
            errors_count: self.errors.len(),
            has_research: self.has_research(),
            has_analysis: self.has_analysis(),
            has_synthesis: self.has_synthesis(),
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

fn is_populated(slot: &Option<Value>) -> bool {
    match slot {
        None | Some(Value::Null) => false,
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSummary {
    pub task_id: String,
    pub query: String,
    pub status: WorkflowStatus,
    pub current_agent: Option<String>,
    pub agents_completed: usize,
    pub errors_count: usize,
    pub has_research: bool,
    pub has_analysis: bool,
    pub has_synthesis: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn state() -> WorkflowState {
        WorkflowState::new("edge inference chips", "task_0001", WorkflowOptions::default())
    }

    #[test]
    fn test_initial_state() {
        let state = state();
        assert_eq!(state.status, WorkflowStatus::Pending);
        assert!(state.history().is_empty());
        assert!(state.errors().is_empty());
        assert!(state.research.is_none());
        assert!(state.analysis.is_none());
        assert!(state.synthesis.is_none());
        assert!(state.final_output.is_none());
        assert!(state.completed_at.is_none());
    }

    #[rstest]
    #[case(WorkflowStatus::Pending, WorkflowStatus::Researching, true)]
    #[case(WorkflowStatus::Researching, WorkflowStatus::Analyzing, true)]
    #[case(WorkflowStatus::Analyzing, WorkflowStatus::Synthesizing, true)]
    #[case(WorkflowStatus::Synthesizing, WorkflowStatus::Completed, true)]
    #[case(WorkflowStatus::Pending, WorkflowStatus::Failed, true)]
    #[case(WorkflowStatus::Synthesizing, WorkflowStatus::Failed, true)]
    #[case(WorkflowStatus::Researching, WorkflowStatus::Synthesizing, true)]
    #[case(WorkflowStatus::Researching, WorkflowStatus::Researching, false)]
    #[case(WorkflowStatus::Analyzing, WorkflowStatus::Researching, false)]
    #[case(WorkflowStatus::Failed, WorkflowStatus::Researching, false)]
    #[case(WorkflowStatus::Failed, WorkflowStatus::Failed, false)]
    #[case(WorkflowStatus::Completed, WorkflowStatus::Failed, false)]
    fn test_status_transitions(
        #[case] from: WorkflowStatus,
        #[case] to: WorkflowStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn test_apply_writes_slot_and_appends() {
        let mut state = state();
        state
            .apply(StateUpdate {
                status: Some(WorkflowStatus::Researching),
                current_agent: Some("research_agent".to_string()),
                research: Some(json!({"web_results": [1, 2]})),
                history: vec![AgentExecutionRecord::succeeded(
                    "research_agent",
                    Payload::new(),
                    Duration::from_millis(1500),
                )],
                ..Default::default()
            })
            .unwrap();

        assert_eq!(state.status, WorkflowStatus::Researching);
        assert!(state.has_research());
        assert_eq!(state.history().len(), 1);
        assert_eq!(state.history()[0].duration_seconds, 1.5);
        assert_eq!(state.current_agent.as_deref(), Some("research_agent"));
    }

    #[test]
    fn test_slot_written_at_most_once() {
        let mut state = state();
        state
            .apply(StateUpdate {
                status: Some(WorkflowStatus::Researching),
                research: Some(json!({"topic": "a"})),
                ..Default::default()
            })
            .unwrap();

        let result = state.apply(StateUpdate {
            research: Some(json!({"topic": "b"})),
            ..Default::default()
        });
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(state.research, Some(json!({"topic": "a"})));
    }

    #[test]
    fn test_rejected_update_leaves_state_untouched() {
        let mut state = state();
        let result = state.apply(StateUpdate {
            status: Some(WorkflowStatus::Completed),
            errors: vec!["should not land".to_string()],
            ..Default::default()
        });

        assert!(result.is_err());
        assert_eq!(state.status, WorkflowStatus::Pending);
        assert!(state.errors().is_empty());
    }

    #[test]
    fn test_failed_is_absorbing() {
        let mut state = state();
        state.apply(StateUpdate::failed("boom", None)).unwrap();
        assert!(state.is_failed());

        assert!(state
            .apply(StateUpdate {
                status: Some(WorkflowStatus::Researching),
                ..Default::default()
            })
            .is_err());
        assert!(state.is_failed());
    }

    #[test]
    fn test_accumulators_only_grow() {
        let mut state = state();
        let mut previous = (0, 0);

        let updates = vec![
            StateUpdate {
                status: Some(WorkflowStatus::Researching),
                history: vec![AgentExecutionRecord::succeeded(
                    "research_agent",
                    Payload::new(),
                    Duration::ZERO,
                )],
                ..Default::default()
            },
            StateUpdate::default(),
            StateUpdate::failed(
                "analysis failed",
                Some(AgentExecutionRecord::failed(
                    "analysis_agent",
                    "analysis failed",
                    Duration::ZERO,
                )),
            ),
        ];

        for update in updates {
            state.apply(update).unwrap();
            let current = (state.history().len(), state.errors().len());
            assert!(current.0 >= previous.0);
            assert!(current.1 >= previous.1);
            previous = current;
        }

        state.append_errors(vec!["dup".to_string(), "dup".to_string()]);
        assert_eq!(state.errors(), &["analysis failed", "dup", "dup"]);
    }

    #[test]
    fn test_accessors_follow_applied_updates() {
        let mut state = state();
        state
            .apply(StateUpdate {
                status: Some(WorkflowStatus::Researching),
                research: Some(json!({"web_results": [1]})),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(state.status(), WorkflowStatus::Researching);
        assert_eq!(state.research(), Some(&json!({"web_results": [1]})));
        assert!(state.analysis().is_none());
        assert!(state.synthesis().is_none());
    }

    #[test]
    fn test_empty_research_slot_is_not_populated() {
        let mut state = state();
        state.research = Some(json!({}));
        assert!(!state.has_research());
        state.research = Some(Value::Null);
        assert!(!state.has_research());
    }

    #[test]
    fn test_summarize_truncates_query() {
        let long_query = "x".repeat(250);
        let state = WorkflowState::new(long_query, "task_0042", WorkflowOptions::default());

        let summary = state.summarize();
        assert_eq!(summary.query.chars().count(), 100);
        assert_eq!(summary.task_id, "task_0042");
        assert_eq!(summary.status, WorkflowStatus::Pending);
        assert!(!summary.has_research);
        assert_eq!(summary.agents_completed, 0);
    }

    #[test]
    fn test_options_from_map() {
        let map = json!({
            "include_news": false,
            "deep_search": true,
            "output_format": "html",
            "verbosity": 3
        })
        .as_object()
        .cloned()
        .unwrap();

        let options = WorkflowOptions::from_map(&map).unwrap();
        assert!(!options.include_news);
        assert!(options.deep_search);
        assert_eq!(options.output_format, OutputFormat::Html);

        let defaults = WorkflowOptions::from_map(&Payload::new()).unwrap();
        assert_eq!(defaults, WorkflowOptions::default());
    }

    #[rstest]
    #[case(json!({"include_news": "yes"}))]
    #[case(json!({"deep_search": 1}))]
    #[case(json!({"output_format": "pdf"}))]
    #[case(json!({"output_format": true}))]
    fn test_options_reject_bad_types(#[case] raw: Value) {
        let map = raw.as_object().cloned().unwrap();
        assert!(matches!(
            WorkflowOptions::from_map(&map),
            Err(AppError::Validation(_))
        ));
    }
}
