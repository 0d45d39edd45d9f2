//! Configuration for the course assistant.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// The model used when `ANTHROPIC_MODEL` is not set.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Configuration parameters for the RAG system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// API key for the LLM provider.
    #[serde(default, skip_serializing)]
    pub api_key: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Sampling temperature. Zero keeps answers deterministic.
    pub temperature: f32,
    /// Maximum number of output tokens per model call.
    pub max_tokens: u32,
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of results returned by a course content search.
    pub max_results: usize,
    /// Number of question/answer exchanges kept per session.
    pub max_history: usize,
    /// Maximum number of tool round-trips in a single answer.
    pub max_tool_rounds: usize,
    /// Optional timeout applied to each LLM call.
    #[serde(default, with = "duration_secs")]
    pub request_timeout: Option<Duration>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            max_tokens: 800,
            chunk_size: 800,
            chunk_overlap: 100,
            max_results: 5,
            max_history: 2,
            max_tool_rounds: 5,
            request_timeout: None,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Build a configuration from environment variables.
    ///
    /// Reads `ANTHROPIC_API_KEY` (required) and `ANTHROPIC_MODEL`, plus the
    /// optional overrides `COURSE_RAG_MAX_RESULTS`, `COURSE_RAG_MAX_HISTORY`,
    /// `COURSE_RAG_CHUNK_SIZE`, `COURSE_RAG_CHUNK_OVERLAP` and
    /// `COURSE_RAG_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the API key is missing, an
    /// override is not a number, or the resulting config fails validation.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            RagError::ConfigError("ANTHROPIC_API_KEY environment variable not set".to_string())
        })?;

        let mut builder = Self::builder().api_key(api_key);
        if let Ok(model) = std::env::var("ANTHROPIC_MODEL") {
            builder = builder.model(model);
        }
        if let Some(n) = env_number("COURSE_RAG_MAX_RESULTS")? {
            builder = builder.max_results(n);
        }
        if let Some(n) = env_number("COURSE_RAG_MAX_HISTORY")? {
            builder = builder.max_history(n);
        }
        if let Some(n) = env_number("COURSE_RAG_CHUNK_SIZE")? {
            builder = builder.chunk_size(n);
        }
        if let Some(n) = env_number("COURSE_RAG_CHUNK_OVERLAP")? {
            builder = builder.chunk_overlap(n);
        }
        if let Some(secs) = env_number("COURSE_RAG_TIMEOUT_SECS")? {
            builder = builder.request_timeout(Duration::from_secs(secs as u64));
        }
        builder.build()
    }
}

fn env_number(name: &str) -> Result<Option<usize>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|e| RagError::ConfigError(format!("{name} must be a number: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the LLM provider API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    /// Set the model identifier.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Set the maximum number of output tokens per call.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of search results returned to the model.
    pub fn max_results(mut self, n: usize) -> Self {
        self.config.max_results = n;
        self
    }

    /// Set the number of exchanges remembered per session.
    pub fn max_history(mut self, n: usize) -> Self {
        self.config.max_history = n;
        self
    }

    /// Set the maximum number of tool round-trips per answer.
    pub fn max_tool_rounds(mut self, n: usize) -> Self {
        self.config.max_tool_rounds = n;
        self
    }

    /// Set a timeout for each LLM call.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_overlap >= chunk_size`
    /// - `max_results == 0`, `max_tokens == 0` or `max_tool_rounds == 0`
    /// - `temperature` is outside `0.0..=1.0`
    pub fn build(self) -> Result<RagConfig> {
        let config = self.config;
        if config.chunk_overlap >= config.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        if config.max_results == 0 {
            return Err(RagError::ConfigError("max_results must be greater than zero".to_string()));
        }
        if config.max_tokens == 0 {
            return Err(RagError::ConfigError("max_tokens must be greater than zero".to_string()));
        }
        if config.max_tool_rounds == 0 {
            return Err(RagError::ConfigError(
                "max_tool_rounds must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&config.temperature) {
            return Err(RagError::ConfigError(format!(
                "temperature ({}) must be between 0.0 and 1.0",
                config.temperature
            )));
        }
        Ok(config)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}
