// Translation backends and the retrying per-block translator.
//
// - CompletionClient: the single capability a backend must offer
// - TranslationProvider: fixed instruction + retry policy around one call
// - anthropic / ollama: concrete HTTP clients

pub mod anthropic;
pub mod common;
pub mod ollama;
pub mod provider;
pub mod retry;

use async_trait::async_trait;

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::{ProviderError, Result, SubtransError};

pub use provider::{Translation, TranslationProvider};
pub use retry::{Backoff, RetryPolicy};

/// Submit a prompt to a text-generation backend and receive its text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, ProviderError>;

    /// Make a minimal request to verify credentials and reachability.
    async fn check_connection(&self) -> std::result::Result<(), ProviderError>;

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}

/// Factory for creating completion clients
pub struct ClientFactory;

impl ClientFactory {
    /// Create a client for the configured provider.
    ///
    /// `api_key` is resolved by the caller; it is required for Anthropic.
    pub fn create(config: &ProviderConfig, api_key: Option<&str>) -> Result<Box<dyn CompletionClient>> {
        match config.kind {
            ProviderKind::Anthropic => {
                let key = api_key.filter(|k| !k.trim().is_empty()).ok_or_else(|| {
                    SubtransError::Config(
                        "Anthropic API key not found; set ANTHROPIC_API_KEY or pass --api-key".to_string(),
                    )
                })?;
                Ok(Box::new(anthropic::AnthropicClient::new(
                    key,
                    config.endpoint(),
                    config.model.clone(),
                    config.max_tokens,
                    config.timeout(),
                )?))
            }
            ProviderKind::Ollama => Ok(Box::new(ollama::OllamaClient::new(
                config.endpoint(),
                config.model.clone(),
                config.timeout(),
            )?)),
        }
    }
}
