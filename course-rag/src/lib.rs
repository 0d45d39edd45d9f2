//! # course-rag
//!
//! A retrieval-augmented assistant that answers questions about course
//! materials.
//!
//! ## Overview
//!
//! Course transcripts are parsed into lessons, split into overlapping chunks
//! and stored in a [`VectorStore`]. At query time the model is offered a
//! single tool, [`CourseSearchTool`], and decides whether to search. The
//! [`AiGenerator`] runs the tool-calling loop and the [`RagSystem`] returns
//! the answer together with the sources the searches cited.
//!
//! - [`RagSystem`] - orchestrator: ingestion, queries, sessions
//! - [`AiGenerator`] - model request/tool-use loop
//! - [`ToolManager`] / [`Tool`] - tool registry and the tool seam
//! - [`InMemoryVectorStore`] - cosine-similarity store with course name resolution
//! - [`DocumentProcessor`] - course file parsing and sentence chunking
//! - [`SessionManager`] - bounded conversation history
//! - [`LlmClient`] - model seam, with [`AnthropicClient`] and [`MockLlmClient`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use course_rag::{MessageResponse, MockLlmClient, RagSystem};
//!
//! let rag = RagSystem::builder()
//!     .llm_client(Arc::new(MockLlmClient::new(vec![MessageResponse::end_turn("Hi")])))
//!     .build()?;
//!
//! rag.add_course_folder("docs", false).await?;
//! let session = rag.create_session().await;
//! let (answer, sources) = rag.query("What does lesson 2 cover?", Some(&session)).await?;
//! ```
//!
//! ## Features
//!
//! - `anthropic` (default) - [`AnthropicClient`] and the `course-rag` binary

#[cfg(feature = "anthropic")]
pub mod anthropic;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generator;
pub mod inmemory;
pub mod llm;
pub mod models;
pub mod rag;
pub mod session;
pub mod tool;
pub mod vectorstore;

#[cfg(feature = "anthropic")]
pub use anthropic::AnthropicClient;
pub use config::{RagConfig, RagConfigBuilder};
pub use document::DocumentProcessor;
pub use embedding::{EmbeddingProvider, HashingEmbedder};
pub use error::{RagError, Result};
pub use generator::{AiGenerator, GenerateRequest};
pub use inmemory::InMemoryVectorStore;
pub use llm::{
    ContentBlock, LlmClient, Message, MessageRequest, MessageResponse, MockLlmClient, Role,
    StopReason, ToolChoice,
};
pub use models::{ChunkMetadata, Course, CourseChunk, Lesson, Source};
pub use rag::{CourseAnalytics, RagSystem, RagSystemBuilder};
pub use session::{SessionId, SessionManager};
pub use tool::{
    CourseSearchTool, NO_RESULTS, SEARCH_TOOL_NAME, Tool, ToolCallResult, ToolDefinition,
    ToolManager, ToolOutput,
};
pub use vectorstore::{SearchFilter, SearchResults, VectorStore};
