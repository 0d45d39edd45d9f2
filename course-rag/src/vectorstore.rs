//! Vector store trait for storing and searching course content.

use async_trait::async_trait;

use crate::error::{RagError, Result};
use crate::models::{ChunkMetadata, Course, CourseChunk};

/// Optional filters applied to a content search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    /// Course title or a fragment of it; resolved against the course catalog.
    pub course_name: Option<String>,
    /// Restrict results to a single lesson.
    pub lesson_number: Option<u32>,
}

impl SearchFilter {
    /// A filter that matches everything.
    pub fn none() -> Self {
        Self::default()
    }

    /// Restrict to a course.
    pub fn course(mut self, name: impl Into<String>) -> Self {
        self.course_name = Some(name.into());
        self
    }

    /// Restrict to a lesson.
    pub fn lesson(mut self, lesson_number: u32) -> Self {
        self.lesson_number = Some(lesson_number);
        self
    }
}

/// Ranked search hits, or an error message explaining why there are none.
///
/// `documents`, `metadata` and `distances` always have the same length. A
/// result carrying an error message has no documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    documents: Vec<String>,
    metadata: Vec<ChunkMetadata>,
    distances: Vec<f32>,
    error: Option<String>,
}

impl SearchResults {
    /// Build results from parallel sequences.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStoreError`] if the sequences differ in length.
    pub fn new(
        documents: Vec<String>,
        metadata: Vec<ChunkMetadata>,
        distances: Vec<f32>,
    ) -> Result<Self> {
        if documents.len() != metadata.len() || documents.len() != distances.len() {
            return Err(RagError::VectorStoreError {
                backend: "SearchResults".into(),
                message: format!(
                    "mismatched result lengths: {} documents, {} metadata, {} distances",
                    documents.len(),
                    metadata.len(),
                    distances.len()
                ),
            });
        }
        Ok(Self { documents, metadata, distances, error: None })
    }

    /// Results with no documents and no error.
    pub fn no_matches() -> Self {
        Self::default()
    }

    /// Empty results carrying an error message, e.g. an unmatched course name.
    pub fn empty(error: impl Into<String>) -> Self {
        Self { error: Some(error.into()), ..Self::default() }
    }

    /// Whether there are no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// The error message, if this result represents a failed lookup.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    pub fn metadata(&self) -> &[ChunkMetadata] {
        &self.metadata
    }

    pub fn distances(&self) -> &[f32] {
        &self.distances
    }

    /// Iterate over `(document, metadata, distance)` triples in rank order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ChunkMetadata, f32)> {
        self.documents
            .iter()
            .zip(&self.metadata)
            .zip(&self.distances)
            .map(|((doc, meta), dist)| (doc.as_str(), meta, *dist))
    }
}

/// A storage backend for course metadata and searchable course content.
///
/// Implementations keep two logical collections: a catalog of courses used to
/// resolve fuzzy course names, and the chunked content itself.
///
/// # Example
///
/// ```rust,ignore
/// use course_rag::{InMemoryVectorStore, SearchFilter, VectorStore};
///
/// let store = InMemoryVectorStore::new(embedder, 5);
/// store.add_course_metadata(&course).await?;
/// store.add_course_content(&chunks).await?;
/// let results = store.search("neural networks", &SearchFilter::none().lesson(2), None).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Search course content.
    ///
    /// A course name that resolves to no course yields
    /// [`SearchResults::empty`] with an explanatory message rather than an
    /// `Err`. `limit` falls back to the store's configured maximum.
    async fn search(
        &self,
        query: &str,
        filter: &SearchFilter,
        limit: Option<usize>,
    ) -> Result<SearchResults>;

    /// Add a course to the catalog. Re-adding a title replaces it.
    async fn add_course_metadata(&self, course: &Course) -> Result<()>;

    /// Add content chunks.
    async fn add_course_content(&self, chunks: &[CourseChunk]) -> Result<()>;

    /// Titles of every course in the catalog.
    async fn existing_course_titles(&self) -> Result<Vec<String>>;

    /// Number of courses in the catalog.
    async fn course_count(&self) -> Result<usize> {
        Ok(self.existing_course_titles().await?.len())
    }

    /// Remove all courses and content.
    async fn clear_all_data(&self) -> Result<()>;

    /// Link for a course, if known.
    async fn course_link(&self, course_title: &str) -> Result<Option<String>>;

    /// Link for a lesson, if known.
    async fn lesson_link(&self, course_title: &str, lesson_number: u32) -> Result<Option<String>>;
}
