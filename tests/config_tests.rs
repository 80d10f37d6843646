//! Integration tests for the configuration file and its wiring.
//!
//! - The shipped `conclave.toml` parses and validates
//! - A configuration on disk drives provider ids and the report directory

use conclave::utils::config::ConclaveConfig;
use conclave::workflows::Stage;
use std::sync::Arc;

mod common;

use common::mocks::{MockLLMClient, MockSearch};

#[test]
fn test_shipped_config_is_valid() {
    let content = include_str!("../conclave.toml");
    let config = ConclaveConfig::parse(content).unwrap();

    config.validate().unwrap();
    assert_eq!(config, ConclaveConfig::default());
}

#[tokio::test]
async fn test_config_file_drives_wiring() {
    let dir = tempfile::tempdir().unwrap();
    let reports = dir.path().join("out");
    let path = dir.path().join("conclave.toml");
    std::fs::write(
        &path,
        format!(
            r#"
[agents]
research = "scout"
analysis = "critic"
synthesis = "writer"

[output]
dir = "{}"
"#,
            reports.display().to_string().replace('\\', "/")
        ),
    )
    .unwrap();

    let config = ConclaveConfig::load(&path).unwrap();
    let orchestrator = conclave::ResearchOrchestrator::from_backends(
        &config,
        Arc::new(MockLLMClient::research_pipeline()),
        Arc::new(MockSearch::new(2)),
    )
    .unwrap();

    let graph = orchestrator.graph();
    assert_eq!(graph.agent_id(Stage::Research), Some("scout"));
    assert_eq!(graph.agent_id(Stage::Analysis), Some("critic"));
    assert_eq!(graph.agent_id(Stage::Synthesis), Some("writer"));
    assert_eq!(graph.agent_id(Stage::Finalize), None);
    assert!(graph.render_ascii().contains("scout"));

    let output = orchestrator
        .run("offshore wind", &conclave::Payload::new())
        .await;
    assert!(output.is_success(), "{:?}", output.errors());
    assert_eq!(std::fs::read_dir(&reports).unwrap().count(), 1);
}
