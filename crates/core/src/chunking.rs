use crate::error::IngestError;
use crate::extractor::parse_course_document;
use crate::models::{ChunkingOptions, Course, CourseChunk};
use sha2::{Digest, Sha256};

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\u{a0}', " ")
}

/// Splits text into whitespace-normalized sentences. A sentence ends at
/// `.`, `!` or `?` (plus any trailing closing quote) followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(character) = chars.next() {
        current.push(character);

        if matches!(character, '.' | '!' | '?') {
            while let Some(&next) = chars.peek() {
                if matches!(next, '"' | '\'' | ')' | ']') {
                    current.push(next);
                    chars.next();
                } else {
                    break;
                }
            }

            if chars.peek().map_or(true, |next| next.is_whitespace()) {
                let sentence = normalize_whitespace(&current);
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                current.clear();
            }
        }
    }

    let sentence = normalize_whitespace(&current);
    if !sentence.is_empty() {
        sentences.push(sentence);
    }

    sentences
}

/// Accumulates sentences into windows of at most `max_chars`, seeding each
/// new window with the trailing sentences of the previous one until the
/// configured overlap is covered. The cap is soft: a single sentence longer
/// than `max_chars` stays whole.
pub fn build_windows(sentences: &[String], options: ChunkingOptions) -> Vec<String> {
    let mut windows = Vec::new();
    let mut start = 0;

    while start < sentences.len() {
        let mut end = start;
        let mut length = 0;

        while end < sentences.len() {
            let extra = sentences[end].len() + usize::from(length > 0);
            if length > 0 && length + extra > options.max_chars {
                break;
            }
            length += extra;
            end += 1;
        }

        windows.push(sentences[start..end].join(" "));

        if end == sentences.len() {
            break;
        }

        let mut next_start = end;
        let mut covered = 0;
        while next_start > start + 1 && covered < options.overlap_chars {
            covered += sentences[next_start - 1].len() + 1;
            next_start -= 1;
        }
        start = next_start;
    }

    windows
}

/// Stable chunk identity derived from the owning course and position, so
/// re-ingesting identical content writes identical ids.
pub fn make_chunk_id(course_title: &str, chunk_index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(course_title.as_bytes());
    hasher.update(chunk_index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Full document-to-chunk transformation: header extraction plus windowing.
/// Pure function of its input; identical input yields identical chunks.
pub fn process_document(
    raw_text: &str,
    declared_title: &str,
    options: ChunkingOptions,
) -> Result<(Course, Vec<CourseChunk>), IngestError> {
    options.validate()?;

    if raw_text.trim().is_empty() {
        return Err(IngestError::EmptyDocument(declared_title.to_string()));
    }

    let parsed = parse_course_document(raw_text, declared_title);
    let mut chunks = Vec::new();
    let mut cursor = 0u64;

    for section in &parsed.sections {
        let sentences = split_sentences(&section.text);
        for window in build_windows(&sentences, options) {
            chunks.push(CourseChunk {
                chunk_id: make_chunk_id(&parsed.course.title, cursor, &window),
                course_title: parsed.course.title.clone(),
                lesson_number: section.lesson_number,
                chunk_index: cursor,
                text: window,
            });
            cursor = cursor.saturating_add(1);
        }
    }

    if chunks.is_empty() {
        return Err(IngestError::EmptyDocument(declared_title.to_string()));
    }

    Ok((parsed.course, chunks))
}
