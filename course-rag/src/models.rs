//! Data types for courses, lessons, chunks, and source citations.

use serde::{Deserialize, Serialize};

/// A single lesson within a [`Course`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Lesson {
    /// Sequential lesson number within the course.
    pub lesson_number: u32,
    /// Lesson title.
    pub title: String,
    /// Optional link to the lesson page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson_link: Option<String>,
}

/// A course made up of lessons. The title doubles as the course identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Course {
    /// Full course title, unique across the store.
    pub title: String,
    /// Optional link to the course page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_link: Option<String>,
    /// Optional instructor name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
    /// Lessons in document order.
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

impl Course {
    /// Look up a lesson by number.
    pub fn lesson(&self, lesson_number: u32) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.lesson_number == lesson_number)
    }
}

/// A piece of course text ready to be embedded and stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CourseChunk {
    /// The chunk text.
    pub content: String,
    /// Title of the course this chunk belongs to.
    pub course_title: String,
    /// Lesson the chunk came from, if the course has lessons.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson_number: Option<u32>,
    /// Link of the lesson the chunk came from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson_link: Option<String>,
    /// Position of the chunk within the course.
    pub chunk_index: usize,
}

impl CourseChunk {
    /// Metadata stored alongside this chunk in a vector store.
    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            course_title: self.course_title.clone(),
            lesson_number: self.lesson_number,
            lesson_link: self.lesson_link.clone(),
            chunk_index: self.chunk_index,
        }
    }
}

/// Metadata returned with each search hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub course_title: String,
    #[serde(default)]
    pub lesson_number: Option<u32>,
    #[serde(default)]
    pub lesson_link: Option<String>,
    #[serde(default)]
    pub chunk_index: usize,
}

/// Citation for one retrieved chunk, shown to the user next to the answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    /// Course title.
    pub text: String,
    /// Lesson number, when known.
    pub lesson_number: Option<u32>,
    /// Lesson link, when known.
    pub link: Option<String>,
}

impl Source {
    /// Build a citation from search metadata.
    pub fn from_metadata(metadata: &ChunkMetadata) -> Self {
        Self {
            text: metadata.course_title.clone(),
            lesson_number: metadata.lesson_number,
            link: metadata.lesson_link.clone(),
        }
    }
}
