//! Anthropic Messages API client.
//!
//! This module is only available when the `anthropic` feature is enabled.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error};

use crate::error::{RagError, Result};
use crate::llm::{LlmClient, MessageRequest, MessageResponse};

/// The default API base URL.
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// An [`LlmClient`] backed by the Anthropic Messages API.
///
/// Uses `reqwest` to call `POST /v1/messages` directly.
///
/// # Example
///
/// ```rust,ignore
/// use course_rag::anthropic::AnthropicClient;
///
/// let client = AnthropicClient::new("sk-ant-...")?;
/// ```
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    /// Create a client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::LlmError {
                provider: "Anthropic".into(),
                message: "API key must not be empty".into(),
            });
        }

        Ok(Self { client: reqwest::Client::new(), api_key, base_url: DEFAULT_BASE_URL.into() })
    }

    /// Create a client using the `ANTHROPIC_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| RagError::LlmError {
            provider: "Anthropic".into(),
            message: "ANTHROPIC_API_KEY environment variable not set".into(),
        })?;
        Self::new(api_key)
    }

    /// Point the client at a different base URL (a proxy or compatible server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }
}

// ── API error types ────────────────────────────────────────────────

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type", default)]
    kind: String,
    message: String,
}

// ── LlmClient implementation ───────────────────────────────────────

#[async_trait]
impl LlmClient for AnthropicClient {
    fn name(&self) -> &str {
        "Anthropic"
    }

    async fn send(&self, request: &MessageRequest) -> Result<MessageResponse> {
        debug!(
            provider = "Anthropic",
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "sending messages request"
        );

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(provider = "Anthropic", error = %e, "request failed");
                RagError::LlmError {
                    provider: "Anthropic".into(),
                    message: format!("request failed: {e}"),
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| format!("{}: {}", e.error.kind, e.error.message))
                .unwrap_or(body);

            error!(provider = "Anthropic", %status, "API error");
            return Err(RagError::LlmError {
                provider: "Anthropic".into(),
                message: format!("API returned {status}: {detail}"),
            });
        }

        let message: MessageResponse = response.json().await.map_err(|e| {
            error!(provider = "Anthropic", error = %e, "failed to parse response");
            RagError::LlmError {
                provider: "Anthropic".into(),
                message: format!("failed to parse response: {e}"),
            }
        })?;

        debug!(
            provider = "Anthropic",
            stop_reason = ?message.stop_reason,
            blocks = message.content.len(),
            "received messages response"
        );
        Ok(message)
    }
}
