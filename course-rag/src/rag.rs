//! The course assistant orchestrator.
//!
//! [`RagSystem`] wires the document processor, vector store, search tool,
//! generator and session history together and answers one question per
//! [`query`](RagSystem::query) call.
//!
//! # Example
//!
//! ```rust,ignore
//! use course_rag::{AnthropicClient, RagConfig, RagSystem};
//!
//! let config = RagConfig::from_env()?;
//! let rag = RagSystem::builder()
//!     .llm_client(Arc::new(AnthropicClient::new(&config.api_key)?))
//!     .config(config)
//!     .build()?;
//!
//! rag.add_course_folder("docs", false).await?;
//! let (answer, sources) = rag.query("What is covered in lesson 1?", None).await?;
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::RagConfig;
use crate::document::DocumentProcessor;
use crate::embedding::{EmbeddingProvider, HashingEmbedder};
use crate::error::{RagError, Result};
use crate::generator::{AiGenerator, GenerateRequest};
use crate::inmemory::InMemoryVectorStore;
use crate::llm::LlmClient;
use crate::models::{Course, Source};
use crate::session::{SessionId, SessionManager};
use crate::tool::{CourseSearchTool, Tool, ToolManager};
use crate::vectorstore::VectorStore;

/// File extensions picked up by [`RagSystem::add_course_folder`].
const COURSE_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// Catalog statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseAnalytics {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
}

/// The course assistant.
///
/// Turns are serialised: concurrent [`query`](Self::query) calls on one
/// system run one after another so each answer reports its own sources.
/// Construct one via [`RagSystem::builder()`].
pub struct RagSystem {
    config: RagConfig,
    document_processor: DocumentProcessor,
    vector_store: Arc<dyn VectorStore>,
    search_tool: Arc<CourseSearchTool>,
    tool_manager: ToolManager,
    generator: AiGenerator,
    session_manager: SessionManager,
    turn_lock: Mutex<()>,
}

impl RagSystem {
    /// Create a new [`RagSystemBuilder`].
    pub fn builder() -> RagSystemBuilder {
        RagSystemBuilder::default()
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn document_processor(&self) -> &DocumentProcessor {
        &self.document_processor
    }

    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    pub fn search_tool(&self) -> &Arc<CourseSearchTool> {
        &self.search_tool
    }

    pub fn tool_manager(&self) -> &ToolManager {
        &self.tool_manager
    }

    pub fn generator(&self) -> &AiGenerator {
        &self.generator
    }

    pub fn session_manager(&self) -> &SessionManager {
        &self.session_manager
    }

    /// Start a new conversation.
    pub async fn create_session(&self) -> SessionId {
        self.session_manager.create_session().await
    }

    /// Answer a question about the course materials.
    ///
    /// With a session id the session's history is sent to the model and the
    /// exchange is recorded afterwards. Without one the call is stateless.
    ///
    /// Returns the answer and the sources of the searches that produced it.
    ///
    /// # Errors
    ///
    /// Model, network and timeout errors from the generator propagate. The
    /// session is left untouched when the turn fails.
    pub async fn query(
        &self,
        question: &str,
        session_id: Option<&str>,
    ) -> Result<(String, Vec<Source>)> {
        let _turn = self.turn_lock.lock().await;
        self.tool_manager.reset_sources().await;

        let history = match session_id {
            Some(id) => self.session_manager.get_conversation_history(id).await,
            None => None,
        };

        let prompt = format!("Answer this question about course materials: {question}");
        let tools = self.tool_manager.tool_definitions();
        let request = GenerateRequest::new(&prompt)
            .with_history(history.as_deref())
            .with_tools(&tools, &self.tool_manager);

        let answer = match self.generator.generate_response(request).await {
            Ok(answer) => answer,
            Err(e) => {
                error!(session_id, error = %e, "query failed");
                self.tool_manager.reset_sources().await;
                return Err(e);
            }
        };

        let sources = self.tool_manager.last_sources().await;
        self.tool_manager.reset_sources().await;

        if let Some(id) = session_id {
            self.session_manager.add_exchange(id, question, &answer).await;
        }

        info!(session_id, source_count = sources.len(), "answered query");
        Ok((answer, sources))
    }

    /// Parse one course file and store its metadata and chunks.
    ///
    /// Returns the parsed course and the number of chunks stored.
    ///
    /// # Errors
    ///
    /// Returns the first read, parse or storage error.
    pub async fn add_course_document(&self, path: impl AsRef<Path>) -> Result<(Course, usize)> {
        let (course, chunks) = self.document_processor.process_course_document(path).await?;
        self.vector_store.add_course_metadata(&course).await?;
        self.vector_store.add_course_content(&chunks).await?;
        Ok((course, chunks.len()))
    }

    /// Load every `.txt` and `.md` file in a folder.
    ///
    /// Courses whose title is already stored are skipped, and files that fail
    /// to parse are logged and skipped. A missing folder loads nothing.
    /// With `clear_existing` the store is emptied first.
    ///
    /// Returns `(courses_added, chunks_added)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be listed or the store fails.
    pub async fn add_course_folder(
        &self,
        path: impl AsRef<Path>,
        clear_existing: bool,
    ) -> Result<(usize, usize)> {
        let path = path.as_ref();
        if clear_existing {
            info!("clearing existing course data");
            self.vector_store.clear_all_data().await?;
        }

        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            warn!(path = %path.display(), "course folder does not exist");
            return Ok((0, 0));
        }

        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file = entry.path();
            let is_course_file = file
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| COURSE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if is_course_file && entry.file_type().await?.is_file() {
                files.push(file);
            }
        }
        files.sort();

        let mut known: HashSet<String> =
            self.vector_store.existing_course_titles().await?.into_iter().collect();
        let (mut courses_added, mut chunks_added) = (0, 0);

        for file in files {
            let parsed = self.document_processor.process_course_document(&file).await;
            let (course, chunks) = match parsed {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(path = %file.display(), error = %e, "skipping unreadable course file");
                    continue;
                }
            };

            if known.contains(&course.title) {
                info!(course = %course.title, "course already loaded, skipping");
                continue;
            }

            self.vector_store.add_course_metadata(&course).await?;
            self.vector_store.add_course_content(&chunks).await?;
            courses_added += 1;
            chunks_added += chunks.len();
            known.insert(course.title);
        }

        info!(path = %path.display(), courses_added, chunks_added, "loaded course folder");
        Ok((courses_added, chunks_added))
    }

    /// Number and titles of stored courses.
    pub async fn course_analytics(&self) -> Result<CourseAnalytics> {
        let course_titles = self.vector_store.existing_course_titles().await?;
        Ok(CourseAnalytics { total_courses: course_titles.len(), course_titles })
    }
}

impl std::fmt::Debug for RagSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagSystem")
            .field("config", &self.config)
            .field("tools", &self.tool_manager.tool_names())
            .field("generator", &self.generator)
            .finish_non_exhaustive()
    }
}

/// Builder for constructing a [`RagSystem`].
///
/// Only the LLM client is required. Without a vector store the system uses
/// an [`InMemoryVectorStore`] over the given embedding provider, or a
/// [`HashingEmbedder`] when none is given.
///
/// # Example
///
/// ```rust,ignore
/// let rag = RagSystem::builder()
///     .config(RagConfig::default())
///     .llm_client(Arc::new(MockLlmClient::new(responses)))
///     .vector_store(Arc::new(store))  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagSystemBuilder {
    config: Option<RagConfig>,
    llm_client: Option<Arc<dyn LlmClient>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    extra_tools: Vec<Arc<dyn Tool>>,
}

impl RagSystemBuilder {
    /// Set the configuration. Defaults to [`RagConfig::default()`].
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the model provider.
    pub fn llm_client(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.llm_client = Some(client);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the embedding provider for the default in-memory store.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Register an extra tool next to the course search tool.
    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.extra_tools.push(tool);
        self
    }

    /// Build the [`RagSystem`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if no LLM client is set and
    /// [`RagError::DuplicateTool`] if two tools share a name.
    pub fn build(self) -> Result<RagSystem> {
        let config = self.config.unwrap_or_default();
        let llm_client = self
            .llm_client
            .ok_or_else(|| RagError::ConfigError("llm_client is required".to_string()))?;

        let vector_store = match self.vector_store {
            Some(store) => store,
            None => {
                let embedder = self
                    .embedding_provider
                    .unwrap_or_else(|| Arc::new(HashingEmbedder::default()));
                Arc::new(InMemoryVectorStore::new(embedder, config.max_results))
            }
        };

        let search_tool = Arc::new(CourseSearchTool::new(vector_store.clone()));
        let mut tool_manager = ToolManager::new();
        tool_manager.register_tool(search_tool.clone())?;
        for tool in self.extra_tools {
            tool_manager.register_tool(tool)?;
        }

        info!(model = %config.model, tools = ?tool_manager.tool_names(), "course assistant ready");

        Ok(RagSystem {
            document_processor: DocumentProcessor::from_config(&config),
            generator: AiGenerator::from_config(llm_client, &config),
            session_manager: SessionManager::new(config.max_history),
            vector_store,
            search_tool,
            tool_manager,
            turn_lock: Mutex::new(()),
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MessageResponse, MockLlmClient};
    use crate::tool::SEARCH_TOOL_NAME;

    #[test]
    fn build_requires_llm_client() {
        assert!(matches!(RagSystem::builder().build(), Err(RagError::ConfigError(_))));
    }

    #[test]
    fn build_wires_all_components() {
        let rag = RagSystem::builder()
            .llm_client(Arc::new(MockLlmClient::default()))
            .build()
            .unwrap();
        assert_eq!(rag.tool_manager().tool_names(), vec![SEARCH_TOOL_NAME]);
        assert_eq!(rag.generator().max_tokens(), 800);
        assert_eq!(rag.session_manager().max_history(), 2);
    }

    #[test]
    fn duplicate_extra_tool_fails_build() {
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new(
            Arc::new(HashingEmbedder::default()),
            5,
        ));
        let result = RagSystem::builder()
            .llm_client(Arc::new(MockLlmClient::default()))
            .tool(Arc::new(CourseSearchTool::new(store)))
            .build();
        assert!(matches!(result, Err(RagError::DuplicateTool(name)) if name == SEARCH_TOOL_NAME));
    }

    #[tokio::test]
    async fn stateless_query_prefixes_prompt() {
        let mock = Arc::new(MockLlmClient::new(vec![MessageResponse::end_turn("42")]));
        let rag = RagSystem::builder().llm_client(mock.clone()).build().unwrap();

        let (answer, sources) = rag.query("What is the answer?", None).await.unwrap();
        assert_eq!(answer, "42");
        assert!(sources.is_empty());

        let requests = mock.requests().await;
        let request = &requests[0];
        assert_eq!(request.tools.len(), 1);
        assert_eq!(
            request.messages[0].content[0],
            crate::llm::ContentBlock::text(
                "Answer this question about course materials: What is the answer?"
            )
        );
    }
}
