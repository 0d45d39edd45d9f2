//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use course_rag::models::{ChunkMetadata, Course, CourseChunk};
use course_rag::vectorstore::{SearchFilter, SearchResults, VectorStore};
use course_rag::Result;

pub const COURSE_TITLE: &str = "Test Course: Introduction to AI";

fn meta(lesson: u32, chunk_index: usize) -> ChunkMetadata {
    ChunkMetadata {
        course_title: COURSE_TITLE.to_string(),
        lesson_number: Some(lesson),
        lesson_link: Some(format!("https://example.com/lesson/{lesson}")),
        chunk_index,
    }
}

/// A store with canned answers keyed on the query text.
///
/// - queries mentioning "machine learning" hit one lesson 1 chunk
/// - queries mentioning "neural" hit two lesson 2 chunks
/// - a course name containing "nonexistent" yields an error result
/// - anything else matches nothing
///
/// Every search is recorded.
#[derive(Default)]
pub struct FixtureStore {
    pub searches: Mutex<Vec<(String, SearchFilter)>>,
}

impl FixtureStore {
    pub fn searches(&self) -> Vec<(String, SearchFilter)> {
        self.searches.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorStore for FixtureStore {
    async fn search(
        &self,
        query: &str,
        filter: &SearchFilter,
        _limit: Option<usize>,
    ) -> Result<SearchResults> {
        self.searches.lock().unwrap().push((query.to_string(), filter.clone()));
        let query = query.to_lowercase();

        if query.contains("machine learning") {
            return SearchResults::new(
                vec![
                    "Machine learning is a subset of AI that focuses on algorithms that can learn from data."
                        .to_string(),
                ],
                vec![meta(1, 1)],
                vec![0.2],
            );
        }
        if query.contains("neural") {
            return SearchResults::new(
                vec![
                    "Neural networks are computing systems inspired by biological neural networks."
                        .to_string(),
                    "Deep learning uses multiple layers of neural networks.".to_string(),
                ],
                vec![meta(2, 2), meta(2, 3)],
                vec![0.1, 0.15],
            );
        }
        if let Some(name) = &filter.course_name {
            if name.to_lowercase().contains("nonexistent") {
                return Ok(SearchResults::empty(format!("No course found matching '{name}'")));
            }
        }
        Ok(SearchResults::no_matches())
    }

    async fn add_course_metadata(&self, _course: &Course) -> Result<()> {
        Ok(())
    }

    async fn add_course_content(&self, _chunks: &[CourseChunk]) -> Result<()> {
        Ok(())
    }

    async fn existing_course_titles(&self) -> Result<Vec<String>> {
        Ok(vec![COURSE_TITLE.to_string()])
    }

    async fn clear_all_data(&self) -> Result<()> {
        Ok(())
    }

    async fn course_link(&self, _course_title: &str) -> Result<Option<String>> {
        Ok(Some("https://example.com/course/ai-intro".to_string()))
    }

    async fn lesson_link(&self, _course_title: &str, lesson_number: u32) -> Result<Option<String>> {
        Ok(Some(format!("https://example.com/lesson/{lesson_number}")))
    }
}

/// Wraps [`FixtureStore`], holding back searches that mention "neural".
pub struct DelayedStore {
    pub inner: FixtureStore,
    pub delay: Duration,
}

impl DelayedStore {
    pub fn new(delay: Duration) -> Self {
        Self { inner: FixtureStore::default(), delay }
    }
}

#[async_trait]
impl VectorStore for DelayedStore {
    async fn search(
        &self,
        query: &str,
        filter: &SearchFilter,
        limit: Option<usize>,
    ) -> Result<SearchResults> {
        if query.to_lowercase().contains("neural") {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.search(query, filter, limit).await
    }

    async fn add_course_metadata(&self, course: &Course) -> Result<()> {
        self.inner.add_course_metadata(course).await
    }

    async fn add_course_content(&self, chunks: &[CourseChunk]) -> Result<()> {
        self.inner.add_course_content(chunks).await
    }

    async fn existing_course_titles(&self) -> Result<Vec<String>> {
        self.inner.existing_course_titles().await
    }

    async fn clear_all_data(&self) -> Result<()> {
        self.inner.clear_all_data().await
    }

    async fn course_link(&self, course_title: &str) -> Result<Option<String>> {
        self.inner.course_link(course_title).await
    }

    async fn lesson_link(&self, course_title: &str, lesson_number: u32) -> Result<Option<String>> {
        self.inner.lesson_link(course_title, lesson_number).await
    }
}

/// A course transcript in the on-disk format.
pub fn course_document(title: &str, lessons: &[(u32, &str, &str)]) -> String {
    let mut text = format!(
        "Course Title: {title}\nCourse Link: https://example.com/{}\nCourse Instructor: Dr. Test\n\n",
        title.to_lowercase().replace(' ', "-")
    );
    for (number, lesson_title, body) in lessons {
        text.push_str(&format!(
            "Lesson {number}: {lesson_title}\nLesson Link: https://example.com/lesson/{number}\n{body}\n\n"
        ));
    }
    text
}
