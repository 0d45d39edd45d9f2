//! Error types for the `course-rag` crate.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while ingesting course material or answering a query.
///
/// Errors caused by user input or model behaviour (unknown course, unknown
/// tool, bad tool arguments) are normally turned into tool-result text inside
/// the generation loop. The variants that reach a caller of
/// [`RagSystem::query`](crate::RagSystem::query) are infrastructure failures.
#[derive(Debug, Error)]
pub enum RagError {
    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A course document could not be parsed.
    #[error("Document error: {0}")]
    DocumentError(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A tool rejected its input or failed while running.
    #[error("Tool error ({tool}): {message}")]
    ToolError {
        /// The name of the tool that failed.
        tool: String,
        /// A description of the failure.
        message: String,
    },

    /// A tool with the same name is already registered.
    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),

    /// The LLM client failed to produce a response.
    #[error("LLM error ({provider}): {message}")]
    LlmError {
        /// The LLM provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The generation loop could not produce an answer.
    #[error("Generation error: {0}")]
    GenerationError(String),

    /// An LLM call exceeded the configured request timeout.
    #[error("LLM request timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
