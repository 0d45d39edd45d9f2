//! Course document parsing and chunking.
//!
//! Course transcripts are plain text files of the form:
//!
//! ```text
//! Course Title: Building Towards Computer Use
//! Course Link: https://example.com/course
//! Course Instructor: Jane Doe
//!
//! Lesson 0: Introduction
//! Lesson Link: https://example.com/lesson/0
//! Transcript text...
//!
//! Lesson 1: Getting Started
//! ...
//! ```
//!
//! [`DocumentProcessor`] turns such a file into a [`Course`] plus the
//! [`CourseChunk`]s that get embedded into the vector store.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::config::RagConfig;
use crate::error::{RagError, Result};
use crate::models::{Course, CourseChunk, Lesson};

static COURSE_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^course\s+title:\s*(.+)$").expect("valid regex"));
static COURSE_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^course\s+link:\s*(.+)$").expect("valid regex"));
static COURSE_INSTRUCTOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^course\s+instructor:\s*(.+)$").expect("valid regex"));
static LESSON_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^lesson\s+(\d+):\s*(.*)$").expect("valid regex"));
static LESSON_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^lesson\s+link:\s*(.+)$").expect("valid regex"));

/// One lesson's worth of transcript (or the whole body when there are no
/// lesson markers).
struct Section {
    lesson: Option<Lesson>,
    body: Vec<String>,
}

/// Parses course transcripts and splits them into overlapping chunks.
#[derive(Debug, Clone)]
pub struct DocumentProcessor {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl DocumentProcessor {
    /// Create a processor.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` — maximum number of characters per chunk
    /// * `chunk_overlap` — characters of trailing sentences repeated in the next chunk
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }

    /// Create a processor from the chunking settings in `config`.
    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Read and parse a course file.
    ///
    /// The file stem is used as the course title when the file has no
    /// `Course Title:` line.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Io`] if the file cannot be read and
    /// [`RagError::DocumentError`] if it has no content.
    pub async fn process_course_document(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<(Course, Vec<CourseChunk>)> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await?;
        let fallback_title =
            path.file_stem().and_then(|s| s.to_str()).unwrap_or("Untitled Course").to_string();
        let (course, chunks) = self.parse_course(&text, &fallback_title)?;
        info!(
            path = %path.display(),
            course = %course.title,
            lessons = course.lessons.len(),
            chunk_count = chunks.len(),
            "processed course document"
        );
        Ok((course, chunks))
    }

    /// Parse course text into a [`Course`] and its chunks.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DocumentError`] if `text` is blank.
    pub fn parse_course(
        &self,
        text: &str,
        fallback_title: &str,
    ) -> Result<(Course, Vec<CourseChunk>)> {
        if text.trim().is_empty() {
            return Err(RagError::DocumentError(format!("course '{fallback_title}' is empty")));
        }

        let mut course = Course {
            title: fallback_title.to_string(),
            course_link: None,
            instructor: None,
            lessons: Vec::new(),
        };

        let mut lines = text.lines().map(str::trim).peekable();

        // Header block: metadata lines before the first lesson or body text.
        while let Some(&line) = lines.peek() {
            if line.is_empty() {
                lines.next();
            } else if let Some(caps) = COURSE_TITLE.captures(line) {
                course.title = caps[1].trim().to_string();
                lines.next();
            } else if let Some(caps) = COURSE_LINK.captures(line) {
                course.course_link = Some(caps[1].trim().to_string());
                lines.next();
            } else if let Some(caps) = COURSE_INSTRUCTOR.captures(line) {
                course.instructor = Some(caps[1].trim().to_string());
                lines.next();
            } else {
                break;
            }
        }

        let mut sections: Vec<Section> = Vec::new();
        let mut current = Section { lesson: None, body: Vec::new() };

        while let Some(line) = lines.next() {
            if let Some(caps) = LESSON_HEADER.captures(line) {
                let lesson_number = caps[1].parse::<u32>().map_err(|e| {
                    RagError::DocumentError(format!("invalid lesson number '{}': {e}", &caps[1]))
                })?;
                let mut lesson =
                    Lesson { lesson_number, title: caps[2].trim().to_string(), lesson_link: None };
                let link = lines.peek().copied().and_then(|next| LESSON_LINK.captures(next));
                if let Some(caps) = link {
                    lesson.lesson_link = Some(caps[1].trim().to_string());
                    lines.next();
                }
                let next = Section { lesson: Some(lesson), body: Vec::new() };
                let finished = std::mem::replace(&mut current, next);
                if finished.lesson.is_some() || !finished.body.is_empty() {
                    sections.push(finished);
                }
            } else if !line.is_empty() {
                current.body.push(line.to_string());
            }
        }
        if current.lesson.is_some() || !current.body.is_empty() {
            sections.push(current);
        }

        let last_lesson_number =
            sections.iter().rev().find_map(|s| s.lesson.as_ref().map(|l| l.lesson_number));

        let mut chunks = Vec::new();
        for section in sections {
            let body = section.body.join(" ");
            match section.lesson {
                Some(lesson) => {
                    let is_last = Some(lesson.lesson_number) == last_lesson_number;
                    for (i, piece) in self.chunk_text(&body).into_iter().enumerate() {
                        let content = if is_last {
                            format!(
                                "Course {} Lesson {} content: {piece}",
                                course.title, lesson.lesson_number
                            )
                        } else if i == 0 {
                            format!("Lesson {} content: {piece}", lesson.lesson_number)
                        } else {
                            piece
                        };
                        chunks.push(CourseChunk {
                            content,
                            course_title: course.title.clone(),
                            lesson_number: Some(lesson.lesson_number),
                            lesson_link: lesson.lesson_link.clone(),
                            chunk_index: chunks.len(),
                        });
                    }
                    course.lessons.push(lesson);
                }
                None => {
                    for piece in self.chunk_text(&body) {
                        chunks.push(CourseChunk {
                            content: piece,
                            course_title: course.title.clone(),
                            lesson_number: None,
                            lesson_link: None,
                            chunk_index: chunks.len(),
                        });
                    }
                }
            }
        }

        debug!(course = %course.title, chunk_count = chunks.len(), "parsed course");
        Ok((course, chunks))
    }

    /// Split text into sentence-aligned chunks of at most `chunk_size`
    /// characters, repeating up to `chunk_overlap` characters of trailing
    /// sentences at the start of the next chunk.
    ///
    /// A sentence longer than `chunk_size` becomes a chunk on its own.
    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        let sentences = split_sentences(text);
        let lengths: Vec<usize> = sentences.iter().map(|s| s.chars().count()).collect();

        let mut chunks = Vec::new();
        let mut start = 0;
        while start < sentences.len() {
            let mut end = start;
            let mut size = 0;
            while end < sentences.len() {
                let space = usize::from(end > start);
                if end > start && size + lengths[end] + space > self.chunk_size {
                    break;
                }
                size += lengths[end] + space;
                end += 1;
            }

            chunks.push(sentences[start..end].join(" "));
            if end == sentences.len() {
                break;
            }

            // Walk back over trailing sentences that fit in the overlap budget.
            let mut overlap = 0;
            let mut carried = 0;
            for k in (start..end).rev() {
                let len = lengths[k] + usize::from(k + 1 < end);
                if overlap + len > self.chunk_overlap {
                    break;
                }
                overlap += len;
                carried += 1;
            }
            start = (end - carried).max(start + 1);
        }
        chunks
    }
}

/// Split normalized text after `.`, `!` or `?` followed by whitespace.
fn split_sentences(text: &str) -> Vec<String> {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = normalized.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if matches!(b, b'.' | b'!' | b'?') && bytes.get(i + 1) == Some(&b' ') {
            let sentence = normalized[start..=i].trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            start = i + 1;
        }
    }
    let rest = normalized[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}
