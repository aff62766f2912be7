use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SubtransError};
use crate::subtitle::encoding::{self, TextEncoding};
use crate::translate::{Backoff, RetryPolicy, anthropic, ollama};

fn default_source_language() -> String {
    "en".to_string()
}

fn default_target_language() -> String {
    "zh".to_string()
}

fn default_max_retries() -> u32 {
    10
}

fn default_retry_delay_secs() -> f64 {
    5.0
}

fn default_backoff() -> Backoff {
    Backoff::Fixed
}

fn default_block_delay_ms() -> u64 {
    1000
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_encodings() -> Vec<String> {
    encoding::DEFAULT_ENCODINGS.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub translate: TranslateConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub subtitle: SubtitleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Language code of the subtitle text
    #[serde(default = "default_source_language")]
    pub source_language: String,
    /// Language code to translate into
    #[serde(default = "default_target_language")]
    pub target_language: String,
    /// Attempts per block before falling back to the original text
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay between attempts (seconds); the base delay for exponential backoff
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: f64,
    /// Retry delay strategy: fixed or exponential
    #[serde(default = "default_backoff")]
    pub backoff: Backoff,
    /// Pause between consecutive provider calls, to stay under rate limits
    #[serde(default = "default_block_delay_ms")]
    pub block_delay_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Base URL; the provider's public default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// API key; prefer the ANTHROPIC_API_KEY environment variable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleConfig {
    /// Candidate encodings, tried in order when reading input
    #[serde(default = "default_encodings")]
    pub encodings: Vec<String>,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            source_language: default_source_language(),
            target_language: default_target_language(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            backoff: default_backoff(),
            block_delay_ms: default_block_delay_ms(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::for_kind(ProviderKind::Anthropic)
    }
}

impl ProviderConfig {
    pub fn for_kind(kind: ProviderKind) -> Self {
        let model = match kind {
            ProviderKind::Anthropic => "claude-3-haiku-20240307",
            ProviderKind::Ollama => "llama3.2:3b",
        };
        Self {
            kind,
            endpoint: None,
            model: model.to_string(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            api_key: None,
        }
    }

    pub fn endpoint(&self) -> &str {
        match (&self.endpoint, self.kind) {
            (Some(endpoint), _) => endpoint.as_str(),
            (None, ProviderKind::Anthropic) => anthropic::DEFAULT_ENDPOINT,
            (None, ProviderKind::Ollama) => ollama::DEFAULT_ENDPOINT,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            encodings: default_encodings(),
        }
    }
}

impl TranslateConfig {
    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        let base_delay = Duration::try_from_secs_f64(self.retry_delay_secs).map_err(|e| {
            SubtransError::Config(format!("Invalid retry_delay_secs {}: {}", self.retry_delay_secs, e))
        })?;

        Ok(RetryPolicy {
            max_attempts: self.max_retries,
            base_delay,
            backoff: self.backoff,
        })
    }

    pub fn block_delay(&self) -> Duration {
        Duration::from_millis(self.block_delay_ms)
    }
}

impl SubtitleConfig {
    pub fn candidate_encodings(&self) -> Result<Vec<TextEncoding>> {
        if self.encodings.is_empty() {
            return Err(SubtransError::Config("subtitle.encodings must not be empty".to_string()));
        }
        encoding::resolve_labels(&self.encodings)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SubtransError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| SubtransError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SubtransError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SubtransError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Check the values that can only be validated after loading.
    pub fn validate(&self) -> Result<()> {
        self.translate.retry_policy()?;
        self.subtitle.candidate_encodings()?;
        if self.translate.target_language.trim().is_empty() {
            return Err(SubtransError::Config("translate.target_language must be set".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        let policy = config.translate.retry_policy().unwrap();
        assert_eq!(policy, RetryPolicy::default());
        assert_eq!(config.translate.block_delay(), Duration::from_secs(1));
        assert_eq!(config.provider.kind, ProviderKind::Anthropic);
        assert_eq!(config.provider.endpoint(), anthropic::DEFAULT_ENDPOINT);
        assert_eq!(config.subtitle.candidate_encodings().unwrap(), encoding::default_candidates());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [translate]
            target_language = "ja"
            backoff = "exponential"

            [provider]
            kind = "ollama"
            model = "qwen2.5:7b"
            "#,
        )
        .unwrap();

        assert_eq!(config.translate.target_language, "ja");
        assert_eq!(config.translate.max_retries, 10);
        assert_eq!(config.translate.retry_policy().unwrap().backoff, Backoff::Exponential);
        assert_eq!(config.provider.endpoint(), ollama::DEFAULT_ENDPOINT);
        assert_eq!(config.subtitle.encodings.len(), 4);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subtrans.toml");

        let mut config = Config::default();
        config.translate.target_language = "fr".to_string();
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.translate.target_language, "fr");
        assert_eq!(loaded.provider.model, config.provider.model);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.subtitle.encodings = vec!["not-an-encoding".to_string()];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.translate.retry_delay_secs = -1.0;
        assert!(matches!(config.validate(), Err(SubtransError::Config(_))));
    }
}
