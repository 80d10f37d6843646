//! Subcommand handlers

use crate::cli::output::Output;
use crate::types::Result;
use crate::utils::config::{ConclaveConfig, ConfigError};
use crate::workflows::{ResearchOrchestrator, WorkflowOptions, WorkflowOutput};
use serde_json::Value;
use std::path::Path;

/// Run the pipeline once; returns whether the run succeeded
pub async fn run(
    config: &ConclaveConfig,
    output: &Output,
    query: &str,
    options: WorkflowOptions,
    json: bool,
) -> Result<bool> {
    let orchestrator = ResearchOrchestrator::from_config(config).await?;

    if !json {
        output.banner();
        output.info(&format!("Researching \"{}\" with {}", query, config.llm.model));
    }

    let result = orchestrator.run_with_options(query, options).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result.to_value())?);
    } else {
        print_result(output, &result);
    }
    Ok(result.is_success())
}

fn print_result(output: &Output, result: &WorkflowOutput) {
    match result {
        WorkflowOutput::Success(success) => {
            output.success(&format!("Task {} completed", success.task_id));
            output.kv("duration", &format!("{:.1}s", success.total_duration_seconds));

            if let Some(report) = &success.report {
                output.subheader("Report");
                if let Some(path) = &report.file_path {
                    output.kv("file", path);
                }
                output.kv("words", &report.word_count.to_string());
                output.block(&report.preview);
            }

            if let Some(insights) = &success.insights {
                output.subheader("Themes");
                for theme in &insights.themes {
                    output.list_item(&display_value(theme));
                }
                if !insights.gaps.is_empty() {
                    output.subheader("Gaps");
                    for gap in &insights.gaps {
                        output.list_item(&display_value(gap));
                    }
                }
            }
        }
        WorkflowOutput::Error(failure) => {
            output.error(&format!("Task {} failed", failure.task_id));
            for error in &failure.errors {
                output.list_item(error);
            }
            let partial = &failure.partial_results;
            output.kv("research kept", yes_no(partial.research.is_some()));
            output.kv("analysis kept", yes_no(partial.analysis.is_some()));
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// List the providers the pipeline would use
pub async fn agents(config: &ConclaveConfig, output: &Output) -> Result<()> {
    let orchestrator = ResearchOrchestrator::from_config(config).await?;
    let registry = orchestrator.registry();

    output.header("Agents");
    output.table_header(&["Agent", "Name", "Capabilities"]);
    for id in registry.agent_ids() {
        if let Some(agent) = registry.get(&id) {
            let capabilities: Vec<String> =
                agent.capabilities().into_iter().map(|c| c.name).collect();
            let capabilities = capabilities.join(", ");
            output.table_row(&[id.as_str(), agent.name(), capabilities.as_str()]);
        }
    }
    Ok(())
}

/// Print the compiled pipeline
pub async fn graph(config: &ConclaveConfig, output: &Output) -> Result<()> {
    let orchestrator = ResearchOrchestrator::from_config(config).await?;

    output.header("Pipeline");
    output.block(&orchestrator.graph().render_ascii());
    Ok(())
}

/// Show the effective configuration; returns whether it is valid
pub fn config(
    path: &Path,
    loaded: std::result::Result<ConclaveConfig, ConfigError>,
    validate: bool,
    output: &Output,
) -> bool {
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            output.error(&format!("{}: {}", path.display(), e));
            return false;
        }
    };

    output.header("Configuration");
    output.kv("file", &path.display().to_string());
    if !path.exists() {
        output.warning("File not found, showing defaults");
    }

    output.subheader("LLM");
    output.kv("provider", &config.llm.provider);
    output.kv("base_url", &config.llm.base_url);
    output.kv("model", &config.llm.model);

    output.subheader("Search");
    output.kv("max_results", &config.search.max_results.to_string());
    output.kv("deep_pages", &config.search.deep_pages.to_string());
    output.kv("timeout", &format!("{}s", config.search.timeout_secs));

    output.subheader("Agents");
    output.kv("research", &config.agents.research);
    output.kv("analysis", &config.agents.analysis);
    output.kv("synthesis", &config.agents.synthesis);

    output.subheader("Output");
    output.kv("dir", &config.output.dir.display().to_string());

    if validate {
        match config.validate() {
            Ok(()) => output.success("Configuration is valid"),
            Err(e) => {
                output.error(&e.to_string());
                return false;
            }
        }
    }
    true
}
