use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubtransError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Could not decode {path} with any candidate encoding (tried: {tried})")]
    Decode { path: String, tried: String },

    #[error("Filesystem error at {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown encoding label: {0}")]
    UnknownEncoding(String),

    #[error("Translation interrupted after {completed} of {total} blocks")]
    Interrupted { completed: usize, total: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

pub type Result<T> = std::result::Result<T, SubtransError>;

/// Failures of a single call to a translation backend.
///
/// All variants are considered transient by the retry policy.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("API responded with error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Empty response received")]
    EmptyResponse,
}

impl ProviderError {
    /// Classify a non-success HTTP status returned by a backend.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            429 => Self::RateLimited(message),
            401 | 403 => Self::Authentication(message),
            _ => Self::Api { status, message },
        }
    }
}

/// Why a `RetryPolicy` stopped without a result.
#[derive(Error, Debug)]
pub enum RetryError<E: std::error::Error + 'static> {
    /// Every permitted attempt failed
    #[error("gave up after {attempts} attempt(s): {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: E,
    },

    /// The cancellation token fired before an attempt succeeded
    #[error("cancelled during attempt {attempts}")]
    Cancelled { attempts: u32 },
}

impl<E: std::error::Error + 'static> RetryError<E> {
    /// Attempts started before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } | Self::Cancelled { attempts } => *attempts,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            ProviderError::from_status(429, "slow down".into()),
            ProviderError::RateLimited(_)
        ));
        assert!(matches!(
            ProviderError::from_status(401, "bad key".into()),
            ProviderError::Authentication(_)
        ));
        assert!(matches!(
            ProviderError::from_status(529, "overloaded".into()),
            ProviderError::Api { status: 529, .. }
        ));
    }
}
