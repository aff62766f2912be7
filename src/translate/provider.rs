use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::TranslateConfig;
use crate::error::{ProviderError, Result, RetryError};
use super::common::{build_instruction, clean_response};
use super::{CompletionClient, RetryPolicy};

/// A successful translation and the attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub text: String,
    pub attempts: u32,
}

/// Translates one piece of text with a fixed instruction and a retry policy.
///
/// The provider holds no client; the caller passes an already-authenticated
/// one so test doubles can be substituted freely.
#[derive(Debug, Clone)]
pub struct TranslationProvider {
    source_language: String,
    target_language: String,
    retry: RetryPolicy,
}

impl TranslationProvider {
    pub fn new(
        source_language: impl Into<String>,
        target_language: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            source_language: source_language.into(),
            target_language: target_language.into(),
            retry,
        }
    }

    pub fn from_config(config: &TranslateConfig) -> Result<Self> {
        Ok(Self::new(
            config.source_language.clone(),
            config.target_language.clone(),
            config.retry_policy()?,
        ))
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Translate `text`, retrying on any provider error.
    ///
    /// Returns the cleaned, non-empty translation, or the error from the last
    /// attempt once all attempts are used up. Firing `cancel` abandons the
    /// request in flight and any remaining retries.
    pub async fn translate(
        &self,
        client: &dyn CompletionClient,
        text: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<Translation, RetryError<ProviderError>> {
        let prompt = build_instruction(text, &self.source_language, &self.target_language);

        self.retry
            .run("Translation request", cancel, |attempt| {
                let prompt = prompt.as_str();
                async move {
                    debug!("Translation attempt {} via {}", attempt, client.describe());
                    let raw = client.complete(prompt).await?;
                    let cleaned = clean_response(&raw);
                    if cleaned.is_empty() {
                        return Err(ProviderError::EmptyResponse);
                    }
                    Ok::<_, ProviderError>(Translation {
                        text: cleaned,
                        attempts: attempt,
                    })
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::MockCompletionClient;
    use std::time::Duration;

    fn provider(attempts: u32) -> TranslationProvider {
        TranslationProvider::new("en", "zh", RetryPolicy::fixed(attempts, Duration::ZERO))
    }

    #[tokio::test]
    async fn test_returns_cleaned_translation() {
        let mut client = MockCompletionClient::new();
        client.expect_describe().return_const("mock".to_string());
        client
            .expect_complete()
            .withf(|prompt: &str| prompt.contains("Simplified Chinese") && prompt.ends_with("Hello"))
            .times(1)
            .returning(|_| Ok("  你好\n".to_string()));

        let result = provider(3).translate(&client, "Hello", &CancellationToken::new()).await.unwrap();
        assert_eq!(result.text, "你好");
        assert_eq!(result.attempts, 1);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let mut client = MockCompletionClient::new();
        client.expect_describe().return_const("mock".to_string());
        let mut calls = 0;
        client.expect_complete().times(3).returning(move |_| {
            calls += 1;
            if calls < 3 {
                Err(ProviderError::RateLimited("429".into()))
            } else {
                Ok("世界".to_string())
            }
        });

        let result = provider(10).translate(&client, "World", &CancellationToken::new()).await.unwrap();
        assert_eq!(result.text, "世界");
        assert_eq!(result.attempts, 3);
    }

    #[tokio::test]
    async fn test_empty_responses_are_retried_then_fail() {
        let mut client = MockCompletionClient::new();
        client.expect_describe().return_const("mock".to_string());
        client
            .expect_complete()
            .times(2)
            .returning(|_| Ok("   ".to_string()));

        let err = provider(2).translate(&client, "Hello", &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.attempts(), 2);
        assert!(matches!(err, RetryError::Exhausted { last: ProviderError::EmptyResponse, .. }));
    }

    #[tokio::test]
    async fn test_exhaustion_is_explicit() {
        let mut client = MockCompletionClient::new();
        client.expect_describe().return_const("mock".to_string());
        client
            .expect_complete()
            .times(4)
            .returning(|_| Err(ProviderError::Request("connection reset".into())));

        let err = provider(4).translate(&client, "Hello", &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.attempts(), 4);
    }
}
