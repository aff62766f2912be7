use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{ProviderError, Result};
use super::CompletionClient;

pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

impl MessagesResponse {
    /// Concatenated text of all `text` content blocks.
    fn text(self) -> String {
        self.content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            model: model.into(),
            max_tokens,
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.endpoint.trim_end_matches('/'))
    }

    async fn send(&self, prompt: &str, max_tokens: u32) -> std::result::Result<String, ProviderError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let url = self.messages_url();
        debug!("Sending request to: {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Anthropic API error ({}): {}", status, error_text);
            return Err(ProviderError::from_status(status.as_u16(), error_text));
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        Ok(body.text())
    }
}

#[async_trait]
impl CompletionClient for AnthropicClient {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, ProviderError> {
        self.send(prompt, self.max_tokens).await
    }

    async fn check_connection(&self) -> std::result::Result<(), ProviderError> {
        self.send("Hi", 1).await.map(|_| ())
    }

    fn describe(&self) -> String {
        format!("anthropic ({})", self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_url_trims_trailing_slash() {
        let client = AnthropicClient::new("key", "https://example.test/", "m", 16, Duration::from_secs(1)).unwrap();
        assert_eq!(client.messages_url(), "https://example.test/v1/messages");
    }

    #[test]
    fn test_response_text_blocks_are_joined() {
        let json = r#"{"content":[{"type":"text","text":"你"},{"type":"tool_use"},{"type":"text","text":"好"}]}"#;
        let body: MessagesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.text(), "你好");
    }

    #[test]
    fn test_response_without_text_is_empty() {
        let body: MessagesResponse = serde_json::from_str(r#"{"content":[]}"#).unwrap();
        assert_eq!(body.text(), "");
    }
}
