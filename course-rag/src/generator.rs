//! Answer generation with tool calling.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::RagConfig;
use crate::error::{RagError, Result};
use crate::llm::{ContentBlock, LlmClient, Message, MessageRequest, MessageResponse, ToolChoice};
use crate::tool::{ToolDefinition, ToolManager};

/// Default number of tool round-trips allowed per answer.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 5;

/// The system prompt used unless one is supplied.
pub const SYSTEM_PROMPT: &str = "\
You are an assistant that answers questions about course materials.

Search tool usage:
- Use the search tool only for questions about specific course content or detailed educational material
- Pass a course name or lesson number when the question names one; partial course names work
- Search again with a narrower query if the first results do not answer the question
- If a search returns nothing relevant, say so plainly instead of guessing

Response protocol:
- General knowledge questions: answer from what you know, without searching
- Course-specific questions: search first, then answer from the results
- Do not describe your search process or mention the tool in your answer

Answers must be brief, accurate and educational. Use examples when they help.
Only give the direct answer to what was asked.";

/// Inputs for a single [`AiGenerator::generate_response`] call.
///
/// Tools are only offered when both `tools` and `tool_manager` are set.
#[derive(Clone, Copy, Default)]
pub struct GenerateRequest<'a> {
    pub query: &'a str,
    pub conversation_history: Option<&'a str>,
    pub tools: Option<&'a [ToolDefinition]>,
    pub tool_manager: Option<&'a ToolManager>,
}

impl<'a> GenerateRequest<'a> {
    /// A request with only a query.
    pub fn new(query: &'a str) -> Self {
        Self { query, ..Self::default() }
    }

    /// Attach formatted conversation history.
    pub fn with_history(mut self, history: Option<&'a str>) -> Self {
        self.conversation_history = history;
        self
    }

    /// Offer tools and the manager that executes them.
    pub fn with_tools(mut self, tools: &'a [ToolDefinition], manager: &'a ToolManager) -> Self {
        self.tools = Some(tools);
        self.tool_manager = Some(manager);
        self
    }
}

/// Drives the model through tool calls until it produces a text answer.
pub struct AiGenerator {
    client: Arc<dyn LlmClient>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_tool_rounds: usize,
    request_timeout: Option<Duration>,
    system_prompt: String,
}

impl AiGenerator {
    /// Create a generator with default sampling parameters.
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        let defaults = RagConfig::default();
        Self {
            client,
            model: model.into(),
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            request_timeout: None,
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }

    /// Create a generator from the relevant configuration fields.
    pub fn from_config(client: Arc<dyn LlmClient>, config: &RagConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_tool_rounds: config.max_tool_rounds,
            request_timeout: config.request_timeout,
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }

    /// Replace the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Bound the number of tool round-trips. Zero disables tool calling.
    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    /// Apply a timeout to every model call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn system_for(&self, history: Option<&str>) -> String {
        match history {
            Some(history) if !history.is_empty() => {
                format!("{}\n\nPrevious conversation:\n{history}", self.system_prompt)
            }
            _ => self.system_prompt.clone(),
        }
    }

    async fn send(&self, request: &MessageRequest) -> Result<MessageResponse> {
        match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, self.client.send(request))
                .await
                .map_err(|_| RagError::Timeout(limit))?,
            None => self.client.send(request).await,
        }
    }

    /// Generate an answer, executing tool calls as the model requests them.
    ///
    /// # Errors
    ///
    /// Client errors and timeouts propagate unchanged. A final response
    /// without text is a [`RagError::GenerationError`]; with no tool manager
    /// a tool-use stop counts as final. Tool failures are reported to the
    /// model rather than returned.
    pub async fn generate_response(&self, request: GenerateRequest<'_>) -> Result<String> {
        let tools = request.tools.filter(|t| !t.is_empty()).map(<[_]>::to_vec).unwrap_or_default();
        let mut api_request = MessageRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: Some(self.system_for(request.conversation_history)),
            messages: vec![Message::user_text(request.query)],
            tool_choice: (!tools.is_empty()).then_some(ToolChoice::Auto),
            tools,
        };

        let mut rounds = 0;
        loop {
            if rounds >= self.max_tool_rounds && !api_request.tools.is_empty() {
                warn!(rounds, "tool round limit reached, requesting a final answer");
                api_request.tools.clear();
                api_request.tool_choice = None;
            }

            let response = self.send(&api_request).await?;
            debug!(rounds, stop_reason = ?response.stop_reason, "model responded");

            if !response.wants_tools() {
                return response.text_content().ok_or_else(|| {
                    RagError::GenerationError("model response contained no text".to_string())
                });
            }

            let Some(manager) = request.tool_manager else {
                warn!("model requested a tool but no tool manager is available");
                return response.text_content().ok_or_else(|| {
                    RagError::GenerationError(
                        "model requested a tool but no tool manager is available".to_string(),
                    )
                });
            };
            if rounds >= self.max_tool_rounds {
                return Err(RagError::GenerationError(format!(
                    "model still requested tools after {rounds} tool rounds"
                )));
            }

            let calls: Vec<_> = response.tool_uses().collect();
            info!(round = rounds + 1, calls = calls.len(), "executing tool calls");
            let outcomes =
                join_all(calls.iter().map(|&(_, name, input)| manager.call_tool(name, input))).await;

            // Sources are recorded in request order, not completion order.
            let mut results = Vec::with_capacity(outcomes.len());
            for (&(id, name, _), outcome) in calls.iter().zip(outcomes) {
                manager.record_sources(name, &outcome.sources).await;
                results.push(ContentBlock::tool_result(id, outcome));
            }

            api_request.messages.push(Message::assistant(&response.content));
            api_request.messages.push(Message::tool_results(results));
            rounds += 1;
        }
    }
}

impl std::fmt::Debug for AiGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiGenerator")
            .field("client", &self.client.name())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
