//! LLM client seam and Messages API wire types.
//!
//! [`LlmClient`] is the only thing the generation loop needs from a model
//! provider: send one request, get one response. [`AnthropicClient`] talks to
//! the real API; [`MockLlmClient`] replays scripted responses in tests.
//!
//! [`AnthropicClient`]: crate::anthropic::AnthropicClient

use std::collections::VecDeque;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{RagError, Result};
use crate::tool::{ToolCallResult, ToolDefinition};

/// Who authored a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One block of message content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
    /// Block types this crate does not interpret (e.g. thinking blocks).
    #[serde(other)]
    Unsupported,
}

impl ContentBlock {
    /// A text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// A tool-result block answering the tool-use block `tool_use_id`.
    ///
    /// The call's sources stay on the caller's side.
    pub fn tool_result(tool_use_id: impl Into<String>, result: ToolCallResult) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: result.content,
            is_error: result.is_error,
        }
    }
}

/// A conversation message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    /// A user message with a single text block.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: vec![ContentBlock::text(text)] }
    }

    /// An assistant message echoing model content back into the history.
    ///
    /// Unsupported blocks are dropped since they cannot be sent back.
    pub fn assistant(content: &[ContentBlock]) -> Self {
        let content = content
            .iter()
            .filter(|b| !matches!(b, ContentBlock::Unsupported))
            .cloned()
            .collect();
        Self { role: Role::Assistant, content }
    }

    /// A user message carrying tool results.
    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self { role: Role::User, content: results }
    }
}

/// How the model may use the offered tools.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolChoice {
    Auto,
    Any,
    None,
}

/// A request to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageRequest {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    #[serde(other)]
    Other,
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A model response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageResponse {
    #[serde(default)]
    pub id: String,
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<StopReason>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl MessageResponse {
    /// A finished text answer.
    pub fn end_turn(text: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            content: vec![ContentBlock::text(text)],
            stop_reason: Some(StopReason::EndTurn),
            usage: None,
        }
    }

    /// A response asking for a single tool call.
    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self {
            id: String::new(),
            content: vec![ContentBlock::ToolUse { id: id.into(), name: name.into(), input }],
            stop_reason: Some(StopReason::ToolUse),
            usage: None,
        }
    }

    /// Whether the model stopped to call tools.
    pub fn wants_tools(&self) -> bool {
        self.stop_reason == Some(StopReason::ToolUse) && self.tool_uses().next().is_some()
    }

    /// `(id, name, input)` of every tool-use block, in order.
    pub fn tool_uses(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => Some((id.as_str(), name.as_str(), input)),
            _ => None,
        })
    }

    /// Text blocks joined with newlines, or `None` if there are none.
    pub fn text_content(&self) -> Option<String> {
        let texts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if texts.is_empty() { None } else { Some(texts.join("\n")) }
    }
}

/// A model provider.
///
/// Implementations send a single request and return the provider's response
/// unchanged. Network and API errors are returned as
/// [`RagError::LlmError`]; retries are the caller's business.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider name used in logs and errors.
    fn name(&self) -> &str;

    /// Send one request.
    async fn send(&self, request: &MessageRequest) -> Result<MessageResponse>;
}

/// A scripted [`LlmClient`] for tests.
///
/// Returns the queued responses in order and records every request it
/// receives. Once the script runs out, calls fail.
///
/// # Example
///
/// ```rust,ignore
/// use course_rag::{MessageResponse, MockLlmClient};
///
/// let client = MockLlmClient::new(vec![MessageResponse::end_turn("Hello")]);
/// ```
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<std::result::Result<MessageResponse, String>>>,
    requests: Mutex<Vec<MessageRequest>>,
}

impl MockLlmClient {
    /// Create a mock that replays `responses` in order.
    pub fn new(responses: Vec<MessageResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a response.
    pub fn then(mut self, response: MessageResponse) -> Self {
        self.script.get_mut().push_back(Ok(response));
        self
    }

    /// Queue a failure.
    pub fn then_fail(mut self, message: impl Into<String>) -> Self {
        self.script.get_mut().push_back(Err(message.into()));
        self
    }

    /// Every request received so far.
    pub async fn requests(&self) -> Vec<MessageRequest> {
        self.requests.lock().await.clone()
    }

    /// Number of requests received so far.
    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, request: &MessageRequest) -> Result<MessageResponse> {
        self.requests.lock().await.push(request.clone());
        let next = self.script.lock().await.pop_front();
        debug!(provider = "mock", scripted = next.is_some(), "mock request");
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(RagError::LlmError { provider: "mock".into(), message }),
            None => Err(RagError::LlmError {
                provider: "mock".into(),
                message: "no scripted response left".into(),
            }),
        }
    }
}
