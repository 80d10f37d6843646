//! Caller facing result shapes
//!
//! A run always ends in a [`WorkflowOutput`]: either the assembled success
//! output or a degraded failure result that keeps whatever research and
//! analysis results were committed before the failure.

use crate::types::{truncate_chars, Payload};
use crate::workflows::state::{round_to, StateSummary, WorkflowState};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum report preview length in the final output
pub const REPORT_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportBlock {
    pub file_path: Option<String>,
    pub word_count: u64,
    pub preview: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InsightsBlock {
    pub themes: Vec<Value>,
    pub gaps: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessOutput {
    pub task_id: String,
    pub query: String,
    pub summary: StateSummary,
    pub report: Option<ReportBlock>,
    pub insights: Option<InsightsBlock>,
    pub total_duration_seconds: f64,
}

impl SuccessOutput {
    /// Assemble the final output from the populated result slots.
    ///
    /// `summary` is taken by the caller so it can reflect the completed
    /// status rather than the status at the time of assembly.
    pub fn assemble(state: &WorkflowState, summary: StateSummary) -> Self {
        let report = state.synthesis().and_then(Value::as_object).map(|synthesis| {
            let preview = synthesis
                .get("report_preview")
                .or_else(|| synthesis.get("report_content"))
                .and_then(Value::as_str)
                .unwrap_or_default();

            ReportBlock {
                file_path: synthesis
                    .get("file_path")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                word_count: synthesis
                    .get("word_count")
                    .and_then(Value::as_u64)
                    .unwrap_or(0),
                preview: truncate_chars(preview, REPORT_PREVIEW_CHARS),
            }
        });

        let insights = state.analysis().and_then(Value::as_object).map(|analysis| {
            InsightsBlock {
                themes: list_field(analysis, "themes"),
                gaps: list_field(analysis, "gaps"),
            }
        });

        let elapsed = (Utc::now() - state.started_at)
            .to_std()
            .unwrap_or_default()
            .as_secs_f64();

        Self {
            task_id: state.task_id.clone(),
            query: state.query.clone(),
            summary,
            report,
            insights,
            total_duration_seconds: round_to(elapsed, 1),
        }
    }
}

fn list_field(map: &Payload, key: &str) -> Vec<Value> {
    map.get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Results committed before a failure
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PartialResults {
    pub research: Option<Value>,
    pub analysis: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureOutput {
    pub task_id: String,
    pub errors: Vec<String>,
    pub partial_results: PartialResults,
}

impl FailureOutput {
    pub fn from_state(state: &WorkflowState) -> Self {
        Self {
            task_id: state.task_id.clone(),
            errors: state.errors().to_vec(),
            partial_results: PartialResults {
                research: state.research().cloned(),
                analysis: state.analysis().cloned(),
            },
        }
    }

    /// Failure that escaped the engine before any state could be inspected
    pub fn degraded(task_id: &str, error: impl Into<String>) -> Self {
        Self {
            task_id: task_id.to_string(),
            errors: vec![error.into()],
            partial_results: PartialResults::default(),
        }
    }
}

/// Result of one orchestrator run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WorkflowOutput {
    Success(SuccessOutput),
    Error(FailureOutput),
}

impl WorkflowOutput {
    pub fn is_success(&self) -> bool {
        matches!(self, WorkflowOutput::Success(_))
    }

    pub fn task_id(&self) -> &str {
        match self {
            WorkflowOutput::Success(output) => &output.task_id,
            WorkflowOutput::Error(output) => &output.task_id,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            WorkflowOutput::Success(_) => "success",
            WorkflowOutput::Error(_) => "error",
        }
    }

    pub fn errors(&self) -> &[String] {
        match self {
            WorkflowOutput::Success(_) => &[],
            WorkflowOutput::Error(output) => &output.errors,
        }
    }

    /// The result as a JSON map
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
