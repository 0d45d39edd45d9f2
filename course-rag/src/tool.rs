//! Callable tools for the generation loop.
//!
//! A [`Tool`] exposes a name, a description and a JSON input schema, and can
//! be executed with JSON arguments produced by the model. The
//! [`ToolManager`] is the registry the [`AiGenerator`](crate::AiGenerator)
//! dispatches through; it also remembers the sources each tool returned so
//! the caller can cite them next to the answer.
//!
//! [`CourseSearchTool`] is the retrieval tool: it searches a
//! [`VectorStore`] and renders the hits as text the model can quote.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::{RagError, Result};
use crate::models::Source;
use crate::vectorstore::{SearchFilter, SearchResults, VectorStore};

/// Name of the course content search tool.
pub const SEARCH_TOOL_NAME: &str = "search_course_content";

/// Sentinel returned when a search matches nothing.
pub const NO_RESULTS: &str = "No relevant content found";

/// Schema describing a tool to the model.
///
/// Serializes to the `{name, description, input_schema}` shape used by the
/// Messages API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// What a tool hands back: text for the model, sources for the user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    pub content: String,
    pub sources: Vec<Source>,
}

impl ToolOutput {
    /// Output with text only.
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: content.into(), sources: Vec::new() }
    }

    /// Output with text and the sources it was built from.
    pub fn with_sources(content: impl Into<String>, sources: Vec<Source>) -> Self {
        Self { content: content.into(), sources }
    }
}

/// A capability the model can call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name.
    fn name(&self) -> &str;

    /// When and how the model should use the tool.
    fn description(&self) -> &str;

    /// JSON schema of the tool input.
    fn input_schema(&self) -> Value;

    /// The full definition sent to the model.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }

    /// Run the tool with model-supplied arguments.
    async fn execute(&self, input: &Value) -> Result<ToolOutput>;
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    course_name: Option<String>,
    #[serde(default)]
    lesson_number: Option<u32>,
}

/// Searches course content with optional course and lesson filters.
///
/// # Example
///
/// ```rust,ignore
/// use course_rag::CourseSearchTool;
///
/// let tool = CourseSearchTool::new(store);
/// let output = tool.search("machine learning", None, Some(1)).await?;
/// println!("{}", output.content);
/// ```
pub struct CourseSearchTool {
    store: Arc<dyn VectorStore>,
}

impl CourseSearchTool {
    /// Create a search tool over `store`.
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    /// Search course content.
    ///
    /// A filter-resolution failure (for example an unknown course) comes back
    /// as `Ok` output carrying the store's message, with no sources.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ToolError`] for an empty query and propagates
    /// vector store failures.
    pub async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
    ) -> Result<ToolOutput> {
        if query.trim().is_empty() {
            return Err(RagError::ToolError {
                tool: SEARCH_TOOL_NAME.into(),
                message: "query must not be empty".into(),
            });
        }

        let filter = SearchFilter {
            course_name: course_name.map(str::to_string),
            lesson_number,
        };
        let results = self.store.search(query, &filter, None).await?;

        if let Some(message) = results.error() {
            info!(query, error = message, "search returned an error result");
            return Ok(ToolOutput::text(message));
        }

        if results.is_empty() {
            let mut message = NO_RESULTS.to_string();
            if let Some(course) = course_name {
                message.push_str(&format!(" in course '{course}'"));
            }
            if let Some(lesson) = lesson_number {
                message.push_str(&format!(" in lesson {lesson}"));
            }
            message.push('.');
            return Ok(ToolOutput::text(message));
        }

        let output = format_results(&results);
        info!(query, result_count = results.len(), "course search completed");
        Ok(output)
    }
}

/// Render search hits as `[<course> - Lesson <n>]\n<text>` blocks separated
/// by blank lines, with one source per hit in the same order.
pub fn format_results(results: &SearchResults) -> ToolOutput {
    let mut blocks = Vec::with_capacity(results.len());
    let mut sources = Vec::with_capacity(results.len());

    for (document, metadata, _) in results.iter() {
        let header = match metadata.lesson_number {
            Some(lesson) => format!("[{} - Lesson {lesson}]", metadata.course_title),
            None => format!("[{}]", metadata.course_title),
        };
        blocks.push(format!("{header}\n{document}"));
        sources.push(Source::from_metadata(metadata));
    }

    ToolOutput::with_sources(blocks.join("\n\n"), sources)
}

#[async_trait]
impl Tool for CourseSearchTool {
    fn name(&self) -> &str {
        SEARCH_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Search course materials with smart course name matching and lesson filtering"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to search for in the course content"
                },
                "course_name": {
                    "type": "string",
                    "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                },
                "lesson_number": {
                    "type": "integer",
                    "description": "Specific lesson number to search within (e.g. 1, 2, 3)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: &Value) -> Result<ToolOutput> {
        let args: SearchArgs =
            serde_json::from_value(input.clone()).map_err(|e| RagError::ToolError {
                tool: SEARCH_TOOL_NAME.into(),
                message: format!("invalid arguments: {e}"),
            })?;
        self.search(&args.query, args.course_name.as_deref(), args.lesson_number).await
    }
}

/// The result of one tool call: text for the model plus the sources behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallResult {
    pub content: String,
    /// Set when the tool was unknown or failed; `content` then explains why.
    pub is_error: bool,
    /// Empty for failed calls and calls that found nothing.
    pub sources: Vec<Source>,
}

impl ToolCallResult {
    /// A failed call.
    pub fn error(content: impl Into<String>) -> Self {
        Self { content: content.into(), is_error: true, sources: Vec::new() }
    }
}

struct RegisteredTool {
    definition: ToolDefinition,
    tool: Arc<dyn Tool>,
    last_sources: Mutex<Vec<Source>>,
}

/// Registry of tools keyed by name.
///
/// Tools are kept in registration order. Each entry remembers the sources
/// returned by its most recent execution until [`reset_sources`] is called.
///
/// [`reset_sources`]: ToolManager::reset_sources
#[derive(Default)]
pub struct ToolManager {
    tools: Vec<RegisteredTool>,
    by_name: HashMap<String, usize>,
}

impl ToolManager {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under the name from its definition.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DuplicateTool`] if the name is already taken.
    pub fn register_tool(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let definition = tool.definition();
        if self.by_name.contains_key(&definition.name) {
            error!(tool = %definition.name, "duplicate tool registration");
            return Err(RagError::DuplicateTool(definition.name));
        }
        info!(tool = %definition.name, "registered tool");
        self.by_name.insert(definition.name.clone(), self.tools.len());
        self.tools.push(RegisteredTool { definition, tool, last_sources: Mutex::new(Vec::new()) });
        Ok(())
    }

    /// Definitions of all registered tools, in registration order.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition.clone()).collect()
    }

    /// Names of all registered tools, in registration order.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.definition.name.as_str()).collect()
    }

    /// Whether a tool with this name is registered.
    pub fn has_tool(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Execute a tool by name and return its text.
    ///
    /// Never fails: unknown names and tool errors come back as explanatory
    /// text. See [`execute_tool_call`](Self::execute_tool_call).
    pub async fn execute_tool(&self, name: &str, input: &Value) -> String {
        self.execute_tool_call(name, input).await.content
    }

    /// Execute a tool by name, reporting whether the call failed.
    ///
    /// Sources from a call that found something replace the tool's recorded
    /// sources. Failed calls and calls with no sources leave them untouched.
    pub async fn execute_tool_call(&self, name: &str, input: &Value) -> ToolCallResult {
        let result = self.call_tool(name, input).await;
        self.record_sources(name, &result.sources).await;
        result
    }

    /// Execute a tool by name without recording its sources.
    ///
    /// Callers that run several calls concurrently use this and then
    /// [`record_sources`](Self::record_sources) in request order.
    pub async fn call_tool(&self, name: &str, input: &Value) -> ToolCallResult {
        let Some(entry) = self.entry(name) else {
            warn!(tool = name, "model requested an unknown tool");
            return ToolCallResult::error(format!("Tool '{name}' not found"));
        };

        info!(tool = name, "executing tool");
        match entry.tool.execute(input).await {
            Ok(output) => {
                ToolCallResult { content: output.content, is_error: false, sources: output.sources }
            }
            Err(e) => {
                error!(tool = name, error = %e, "tool execution failed");
                ToolCallResult::error(format!("Error executing tool '{name}': {e}"))
            }
        }
    }

    /// Replace a tool's recorded sources. Empty `sources` and unknown names
    /// are ignored.
    pub async fn record_sources(&self, name: &str, sources: &[Source]) {
        if sources.is_empty() {
            return;
        }
        if let Some(entry) = self.entry(name) {
            *entry.last_sources.lock().await = sources.to_vec();
        }
    }

    fn entry(&self, name: &str) -> Option<&RegisteredTool> {
        self.by_name.get(name).map(|&i| &self.tools[i])
    }

    /// Sources from the first tool, in registration order, that has any.
    pub async fn last_sources(&self) -> Vec<Source> {
        for entry in &self.tools {
            let sources = entry.last_sources.lock().await;
            if !sources.is_empty() {
                return sources.clone();
            }
        }
        Vec::new()
    }

    /// Forget the sources recorded by every tool.
    pub async fn reset_sources(&self) {
        for entry in &self.tools {
            entry.last_sources.lock().await.clear();
        }
    }
}
