use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::error::{ProviderError, Result};
use super::CompletionClient;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Client for a local Ollama server.
pub struct OllamaClient {
    client: Client,
    endpoint: String,
    model: String,
}

impl OllamaClient {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.endpoint, path)
    }
}

#[async_trait]
impl CompletionClient for OllamaClient {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, ProviderError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let url = self.url("generate");
        debug!("Sending translation request to: {}", url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), error_text));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        debug!("Raw Ollama response: {}", body.response);
        Ok(body.response)
    }

    /// Check that the server is reachable and the model has been pulled
    async fn check_connection(&self) -> std::result::Result<(), ProviderError> {
        let url = self.url("show");
        let response = self
            .client
            .post(&url)
            .json(&json!({ "name": self.model }))
            .send()
            .await
            .map_err(|e| ProviderError::Request(format!("Failed to connect to Ollama: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::Api {
                status: response.status().as_u16(),
                message: format!(
                    "Ollama model '{}' not found. Please pull the model first: ollama pull {}",
                    self.model, self.model
                ),
            })
        }
    }

    fn describe(&self) -> String {
        format!("ollama ({} at {})", self.model, self.endpoint)
    }
}
