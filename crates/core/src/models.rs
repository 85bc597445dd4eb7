use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SEARCH_LIMIT: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lesson {
    pub number: u32,
    pub title: String,
    pub link: Option<String>,
}

/// A course as parsed from one transcript document. The title is the
/// canonical key across both indexes; re-ingesting the same title replaces
/// the previous course wholesale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Course {
    pub title: String,
    pub link: Option<String>,
    pub instructor: Option<String>,
    pub lessons: Vec<Lesson>,
}

impl Course {
    pub fn lesson_link(&self, number: u32) -> Option<&str> {
        self.lessons
            .iter()
            .find(|lesson| lesson.number == number)
            .and_then(|lesson| lesson.link.as_deref())
    }
}

/// One overlapping window of transcript text, the unit of retrieval.
/// `lesson_number` is `None` for text that precedes the first lesson marker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CourseChunk {
    pub chunk_id: String,
    pub course_title: String,
    pub lesson_number: Option<u32>,
    pub chunk_index: u64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub course: Course,
    pub chunk_count: usize,
    pub ingested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkingOptions {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            max_chars: 800,
            overlap_chars: 100,
        }
    }
}

impl ChunkingOptions {
    pub fn validate(&self) -> Result<(), crate::error::IngestError> {
        if self.max_chars == 0 {
            return Err(crate::error::IngestError::InvalidChunkConfig(
                "max_chars must be positive".to_string(),
            ));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(crate::error::IngestError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than max {}",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

/// Equality filters applied inside the content index before ranking, so they
/// never perturb the relative order of surviving hits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentFilter {
    pub course_title: Option<String>,
    pub lesson_number: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ContentQuery {
    pub text: String,
    pub course_title: Option<String>,
    pub lesson_number: Option<u32>,
    pub limit: usize,
}

impl ContentQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            course_title: None,
            lesson_number: None,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn filter(&self) -> ContentFilter {
        ContentFilter {
            course_title: self.course_title.clone(),
            lesson_number: self.lesson_number,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentHit {
    pub text: String,
    pub course_title: String,
    pub lesson_number: Option<u32>,
    pub chunk_index: u64,
    pub score: f64,
}

/// Where an answer fragment came from, surfaced to the end user alongside
/// the final answer. Lives only for one query-answer cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceAttribution {
    pub course_title: String,
    pub lesson_number: Option<u32>,
    pub link: Option<String>,
}

impl SourceAttribution {
    pub fn label(&self) -> String {
        match self.lesson_number {
            Some(number) => format!("{} - Lesson {}", self.course_title, number),
            None => self.course_title.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lesson_link_lookup_matches_number() {
        let course = Course {
            title: "Test".to_string(),
            link: None,
            instructor: None,
            lessons: vec![
                Lesson {
                    number: 0,
                    title: "Intro".to_string(),
                    link: None,
                },
                Lesson {
                    number: 1,
                    title: "Basics".to_string(),
                    link: Some("https://example.com/1".to_string()),
                },
            ],
        };

        assert_eq!(course.lesson_link(1), Some("https://example.com/1"));
        assert_eq!(course.lesson_link(0), None);
        assert_eq!(course.lesson_link(9), None);
    }

    #[test]
    fn attribution_label_includes_lesson_when_present() {
        let with_lesson = SourceAttribution {
            course_title: "MCP Course".to_string(),
            lesson_number: Some(1),
            link: None,
        };
        let without_lesson = SourceAttribution {
            course_title: "MCP Course".to_string(),
            lesson_number: None,
            link: None,
        };

        assert_eq!(with_lesson.label(), "MCP Course - Lesson 1");
        assert_eq!(without_lesson.label(), "MCP Course");
    }

    #[test]
    fn overlap_must_stay_below_window_size() {
        let bad = ChunkingOptions {
            max_chars: 100,
            overlap_chars: 100,
        };
        assert!(bad.validate().is_err());
        assert!(ChunkingOptions::default().validate().is_ok());
    }
}
