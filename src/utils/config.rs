//! TOML-based configuration for conclave
//!
//! Everything has a default, so a missing `conclave.toml` is not an error
//! for [`ConclaveConfig::load_or_default`]. A few environment variables
//! override file values after `.env` has been loaded.

use crate::types::AppError;
use crate::workflows::StageAgents;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure loaded from conclave.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConclaveConfig {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub output: OutputConfig,

    /// Provider ids used by each pipeline stage
    #[serde(default)]
    pub agents: AgentsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// ============= LLM Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,
}

fn default_provider() -> String {
    "ollama".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.2".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_ollama_url(),
            model: default_model(),
        }
    }
}

// ============= Search Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Results requested per web or news query
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Pages fetched in full when deep search is on
    #[serde(default = "default_deep_pages")]
    pub deep_pages: usize,

    /// Characters kept from each fetched page
    #[serde(default = "default_page_chars")]
    pub page_chars: usize,

    /// Upper bound for a single search or fetch call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_results() -> usize {
    5
}

fn default_deep_pages() -> usize {
    2
}

fn default_page_chars() -> usize {
    3000
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            deep_pages: default_deep_pages(),
            page_chars: default_page_chars(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// ============= Output Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory reports are written to
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("reports")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

// ============= Agent Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentsConfig {
    #[serde(default = "default_research_agent")]
    pub research: String,

    #[serde(default = "default_analysis_agent")]
    pub analysis: String,

    #[serde(default = "default_synthesis_agent")]
    pub synthesis: String,
}

fn default_research_agent() -> String {
    "research_agent".to_string()
}

fn default_analysis_agent() -> String {
    "analysis_agent".to_string()
}

fn default_synthesis_agent() -> String {
    "synthesis_agent".to_string()
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            research: default_research_agent(),
            analysis: default_analysis_agent(),
            synthesis: default_synthesis_agent(),
        }
    }
}

impl AgentsConfig {
    pub fn stage_agents(&self) -> StageAgents {
        StageAgents {
            research: self.research.clone(),
            analysis: self.analysis.clone(),
            synthesis: self.synthesis.clone(),
        }
    }
}

// ============= Logging Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ============= Configuration Loading & Validation =============

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl ConclaveConfig {
    /// Load and validate a TOML file, then apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut config = Self::parse(&content)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Like [`load`](Self::load), falling back to defaults when the file is missing
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::read_or_default(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse the file (or take defaults) and apply overrides, without validating
    pub fn read_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::parse(&fs::read_to_string(path)?)?
        } else {
            tracing::debug!(path = %path.display(), "No configuration file, using defaults");
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse TOML text without validating it
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `OLLAMA_MODEL`, `OLLAMA_BASE_URL` and `CONCLAVE_LOG` from `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("OLLAMA_MODEL").filter(|v| !v.is_empty()) {
            self.llm.model = model;
        }
        if let Some(url) = lookup("OLLAMA_BASE_URL").filter(|v| !v.is_empty()) {
            self.llm.base_url = url;
        }
        if let Some(level) = lookup("CONCLAVE_LOG").filter(|v| !v.is_empty()) {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.llm.provider.eq_ignore_ascii_case("ollama") {
            return Err(ConfigError::ValidationError(format!(
                "Unsupported LLM provider '{}'",
                self.llm.provider
            )));
        }
        if !(self.llm.base_url.starts_with("http://") || self.llm.base_url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "llm.base_url must be an http(s) URL, got '{}'",
                self.llm.base_url
            )));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "llm.model must not be empty".to_string(),
            ));
        }

        if !(1..=20).contains(&self.search.max_results) {
            return Err(ConfigError::ValidationError(format!(
                "search.max_results must be between 1 and 20, got {}",
                self.search.max_results
            )));
        }
        if self.search.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "search.timeout_secs must be positive".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of {:?}, got '{}'",
                LOG_LEVELS, self.logging.level
            )));
        }

        let ids = [
            &self.agents.research,
            &self.agents.analysis,
            &self.agents.synthesis,
        ];
        if ids.iter().any(|id| id.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "agent ids must not be empty".to_string(),
            ));
        }
        if ids[0] == ids[1] || ids[1] == ids[2] || ids[0] == ids[2] {
            return Err(ConfigError::ValidationError(
                "each stage needs its own agent id".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = ConclaveConfig::parse("").unwrap();
        assert_eq!(config.llm.model, "llama3.2");
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.output.dir, PathBuf::from("reports"));
        assert_eq!(config.agents.stage_agents(), StageAgents::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_sections() {
        let config = ConclaveConfig::parse(
            r#"
[llm]
model = "qwen2.5"
base_url = "http://10.0.0.5:11434"

[search]
max_results = 8
timeout_secs = 10

[output]
dir = "/tmp/out"

[logging]
level = "debug"
json = true
"#,
        )
        .unwrap();

        assert_eq!(config.llm.model, "qwen2.5");
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.search.max_results, 8);
        assert_eq!(config.search.deep_pages, 2);
        assert_eq!(config.output.dir, PathBuf::from("/tmp/out"));
        assert!(config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let mut config = ConclaveConfig::default();
        config.apply_overrides(|key| match key {
            "OLLAMA_MODEL" => Some("mistral".to_string()),
            "CONCLAVE_LOG" => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.llm.model, "mistral");
        assert_eq!(config.llm.base_url, "http://localhost:11434");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ConclaveConfig::default();
        config.search.max_results = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = ConclaveConfig::default();
        config.llm.base_url = "localhost:11434".to_string();
        assert!(config.validate().is_err());

        let mut config = ConclaveConfig::default();
        config.agents.analysis = "research_agent".to_string();
        assert!(config.validate().is_err());

        let mut config = ConclaveConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_provider_name_is_case_insensitive() {
        let mut config = ConclaveConfig::default();
        config.llm.provider = "Ollama".to_string();
        assert!(config.validate().is_ok());
        assert!(crate::llm::Provider::from_config(&config.llm).is_ok());

        config.llm.provider = "openai".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_read_or_default_skips_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[search]\nmax_results = 0").unwrap();

        let config = ConclaveConfig::read_or_default(file.path()).unwrap();
        assert_eq!(config.search.max_results, 0);
        assert!(config.validate().is_err());
        assert!(matches!(
            ConclaveConfig::load_or_default(file.path()),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conclave.toml");

        assert!(matches!(
            ConclaveConfig::load(&path),
            Err(ConfigError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_load_rejects_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[search\nmax_results = ").unwrap();

        let err = ConclaveConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
        assert!(AppError::from(err).to_string().starts_with("Configuration error"));
    }
}
