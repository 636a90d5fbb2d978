//! LLM integration for the curator.
//!
//! One backend: any OpenAI-compatible chat-completions endpoint, reached
//! over plain HTTP via `OpenAiProvider`. Everything above it talks to the
//! `LlmProvider` trait so tests can script responses.

pub mod openai;
pub mod provider;

pub use openai::OpenAiProvider;
pub use provider::*;

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::LlmError;

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let provider = OpenAiProvider::new(
        config.base_url.clone(),
        config.api_key.clone(),
        config.model.clone(),
        config.max_tokens,
        config.temperature,
        config.timeout,
    )?;
    tracing::info!(
        endpoint = %config.base_url,
        model = %config.model,
        "Created LLM provider"
    );
    Ok(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_constructs_without_network() {
        // Any string is accepted as an API key at construction time; auth
        // failures happen on the first request.
        let config = LlmConfig {
            base_url: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: SecretString::from("test-key"),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 1024,
            temperature: 0.2,
            timeout: Duration::from_secs(30),
        };
        let provider = create_provider(&config);
        assert!(provider.is_ok());
        assert_eq!(provider.unwrap().model_name(), "gpt-4o-mini");
    }
}
