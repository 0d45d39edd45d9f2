//! In-memory vector store using cosine similarity.
//!
//! This module provides [`InMemoryVectorStore`], a vector store backed by
//! `BTreeMap`s protected by a `tokio::sync::RwLock`. It is suitable for
//! development, testing, and course libraries that fit in memory.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::models::{Course, CourseChunk};
use crate::vectorstore::{SearchFilter, SearchResults, VectorStore};

/// Minimum similarity for a fuzzy course-name match against the catalog.
const DEFAULT_RESOLVE_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone)]
struct CatalogEntry {
    course: Course,
    embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
struct StoredChunk {
    chunk: CourseChunk,
    embedding: Vec<f32>,
}

#[derive(Debug, Default)]
struct Collections {
    /// course title → catalog entry
    catalog: BTreeMap<String, CatalogEntry>,
    /// `{course_title}_{chunk_index}` → chunk
    content: BTreeMap<String, StoredChunk>,
}

/// An in-memory course store using cosine similarity for search.
///
/// Holds a course catalog (used to resolve partial course names such as
/// `"MCP"` to a full title) and the chunked course content.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use course_rag::{HashingEmbedder, InMemoryVectorStore};
///
/// let store = InMemoryVectorStore::new(Arc::new(HashingEmbedder::default()), 5);
/// ```
pub struct InMemoryVectorStore {
    embedder: Arc<dyn EmbeddingProvider>,
    max_results: usize,
    resolve_threshold: f32,
    collections: RwLock<Collections>,
}

impl InMemoryVectorStore {
    /// Create an empty store returning at most `max_results` hits per search.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, max_results: usize) -> Self {
        Self {
            embedder,
            max_results,
            resolve_threshold: DEFAULT_RESOLVE_THRESHOLD,
            collections: RwLock::new(Collections::default()),
        }
    }

    /// Set the minimum similarity for fuzzy course-name resolution.
    pub fn with_resolve_threshold(mut self, threshold: f32) -> Self {
        self.resolve_threshold = threshold;
        self
    }

    /// Resolve a user-supplied course name to a catalog title.
    ///
    /// Tries an exact case-insensitive match, then substring containment, then
    /// the most similar title by embedding above the resolve threshold.
    async fn resolve_course_name(&self, name: &str) -> Result<Option<String>> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(None);
        }

        let query_embedding = self.embedder.embed(name).await.map_err(embedding_failed)?;
        let collections = self.collections.read().await;

        if let Some(title) = collections.catalog.keys().find(|t| t.to_lowercase() == needle) {
            return Ok(Some(title.clone()));
        }

        let containing = collections.catalog.values().filter(|e| {
            let title = e.course.title.to_lowercase();
            title.contains(&needle) || needle.contains(&title)
        });
        if let Some((_, title)) = most_similar(containing, &query_embedding) {
            return Ok(Some(title.to_string()));
        }

        match most_similar(collections.catalog.values(), &query_embedding) {
            Some((score, title)) if score >= self.resolve_threshold => {
                debug!(course_name = name, resolved = title, score, "fuzzy course match");
                Ok(Some(title.to_string()))
            }
            _ => Ok(None),
        }
    }
}

fn most_similar<'a>(
    entries: impl Iterator<Item = &'a CatalogEntry>,
    query: &[f32],
) -> Option<(f32, &'a str)> {
    entries
        .map(|e| (cosine_similarity(&e.embedding, query), e.course.title.as_str()))
        .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
}

fn embedding_failed(e: RagError) -> RagError {
    match e {
        RagError::EmbeddingError { .. } => e,
        other => RagError::EmbeddingError { provider: "InMemory".into(), message: other.to_string() },
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn search(
        &self,
        query: &str,
        filter: &SearchFilter,
        limit: Option<usize>,
    ) -> Result<SearchResults> {
        let course_title = match &filter.course_name {
            Some(name) => match self.resolve_course_name(name).await? {
                Some(title) => Some(title),
                None => {
                    debug!(course_name = %name, "course name did not resolve");
                    return Ok(SearchResults::empty(format!("No course found matching '{name}'")));
                }
            },
            None => None,
        };

        let query_embedding = self.embedder.embed(query).await.map_err(embedding_failed)?;
        let limit = limit.unwrap_or(self.max_results);

        let collections = self.collections.read().await;
        let mut scored: Vec<(f32, &CourseChunk)> = collections
            .content
            .values()
            .filter(|s| course_title.as_ref().is_none_or(|t| &s.chunk.course_title == t))
            .filter(|s| filter.lesson_number.is_none_or(|n| s.chunk.lesson_number == Some(n)))
            .map(|s| (cosine_similarity(&s.embedding, &query_embedding), &s.chunk))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        let mut documents = Vec::with_capacity(scored.len());
        let mut metadata = Vec::with_capacity(scored.len());
        let mut distances = Vec::with_capacity(scored.len());
        for (similarity, chunk) in scored {
            documents.push(chunk.content.clone());
            metadata.push(chunk.metadata());
            distances.push(1.0 - similarity);
        }

        debug!(query, result_count = documents.len(), "in-memory search completed");
        SearchResults::new(documents, metadata, distances)
    }

    async fn add_course_metadata(&self, course: &Course) -> Result<()> {
        let embedding = self.embedder.embed(&course.title).await.map_err(embedding_failed)?;
        let mut collections = self.collections.write().await;
        collections
            .catalog
            .insert(course.title.clone(), CatalogEntry { course: course.clone(), embedding });
        info!(course = %course.title, lessons = course.lessons.len(), "added course metadata");
        Ok(())
    }

    async fn add_course_content(&self, chunks: &[CourseChunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await.map_err(embedding_failed)?;
        if embeddings.len() != chunks.len() {
            return Err(RagError::EmbeddingError {
                provider: "InMemory".into(),
                message: format!(
                    "expected {} embeddings, provider returned {}",
                    chunks.len(),
                    embeddings.len()
                ),
            });
        }

        let mut collections = self.collections.write().await;
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            let id = format!("{}_{}", chunk.course_title, chunk.chunk_index);
            collections.content.insert(id, StoredChunk { chunk: chunk.clone(), embedding });
        }
        info!(chunk_count = chunks.len(), "added course content");
        Ok(())
    }

    async fn existing_course_titles(&self) -> Result<Vec<String>> {
        Ok(self.collections.read().await.catalog.keys().cloned().collect())
    }

    async fn course_count(&self) -> Result<usize> {
        Ok(self.collections.read().await.catalog.len())
    }

    async fn clear_all_data(&self) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.catalog.clear();
        collections.content.clear();
        info!("cleared all course data");
        Ok(())
    }

    async fn course_link(&self, course_title: &str) -> Result<Option<String>> {
        let collections = self.collections.read().await;
        Ok(collections.catalog.get(course_title).and_then(|e| e.course.course_link.clone()))
    }

    async fn lesson_link(&self, course_title: &str, lesson_number: u32) -> Result<Option<String>> {
        let collections = self.collections.read().await;
        Ok(collections
            .catalog
            .get(course_title)
            .and_then(|e| e.course.lesson(lesson_number))
            .and_then(|l| l.lesson_link.clone()))
    }
}
