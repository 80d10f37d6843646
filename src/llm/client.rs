//! LLM client abstraction and provider selection

use crate::types::{AppError, Result};
use crate::utils::config::LlmConfig;
use async_trait::async_trait;

/// Generic LLM client trait for provider abstraction
///
/// Providers only ever see this trait, so tests can swap in a scripted
/// client without a running model server.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a completion from a prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate with system prompt
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Provider enum for runtime selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    /// Local Ollama server
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::Ollama {
    ///     base_url: "http://localhost:11434".to_string(),
    ///     model: "llama3.2".to_string(),
    /// };
    /// ```
    Ollama { base_url: String, model: String },
}

impl Provider {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        match config.provider.to_ascii_lowercase().as_str() {
            "ollama" => Ok(Provider::Ollama {
                base_url: config.base_url.clone(),
                model: config.model.clone(),
            }),
            other => Err(AppError::Configuration(format!(
                "Unknown LLM provider '{}'",
                other
            ))),
        }
    }

    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// Fails when the crate was built without the provider's feature.
    pub async fn create_client(&self) -> Result<Box<dyn LLMClient>> {
        match self {
            #[cfg(feature = "ollama")]
            Provider::Ollama { base_url, model } => Ok(Box::new(
                super::ollama::OllamaClient::new(base_url.clone(), model.clone()).await?,
            )),

            #[cfg(not(feature = "ollama"))]
            Provider::Ollama { model, .. } => Err(AppError::LLM(format!(
                "Cannot use model '{}': built without the 'ollama' feature",
                model
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Ollama { .. } => "Ollama",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::Ollama { model, .. } => model,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_config() {
        let provider = Provider::from_config(&LlmConfig::default()).unwrap();
        assert_eq!(provider.name(), "Ollama");
        assert_eq!(provider.model(), "llama3.2");

        let config = LlmConfig {
            provider: "gpt-cloud".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            Provider::from_config(&config),
            Err(AppError::Configuration(_))
        ));
    }

    #[cfg(not(feature = "ollama"))]
    #[tokio::test]
    async fn test_engine_only_build_has_no_client() {
        let provider = Provider::from_config(&LlmConfig::default()).unwrap();
        let err = provider.create_client().await.err().unwrap();
        assert!(matches!(err, AppError::LLM(_)));
        assert!(err.to_string().contains("ollama"));
    }
}
