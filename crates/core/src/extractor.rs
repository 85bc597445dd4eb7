//! Transcript parsing: pulls course metadata out of the structured header
//! region and splits the body into per-lesson sections for the chunker.

use crate::models::{Course, Lesson};

/// One contiguous stretch of transcript text. `lesson_number` is `None` for
/// text that appears before the first lesson marker.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonSection {
    pub lesson_number: Option<u32>,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub course: Course,
    pub sections: Vec<LessonSection>,
}

/// Header lines recognized at the top of a transcript:
///
/// ```text
/// Course Title: MCP Server Implementation
/// Course Link: https://example.com/courses/mcp
/// Course Instructor: Jane Doe
/// ```
///
/// followed by a body of `Lesson N: <title>` markers, each optionally
/// trailed by a `Lesson Link:` line. A document without a `Course Title:`
/// line falls back to `declared_title` with no lessons.
pub fn parse_course_document(raw_text: &str, declared_title: &str) -> ParsedDocument {
    let mut lines = raw_text.lines().peekable();

    let mut title: Option<String> = None;
    let mut link: Option<String> = None;
    let mut instructor: Option<String> = None;

    // Header region: leading lines with recognized prefixes, blanks allowed.
    while let Some(line) = lines.peek() {
        let trimmed = line.trim();
        if trimmed.is_empty() && title.is_none() && link.is_none() && instructor.is_none() {
            lines.next();
            continue;
        }
        if let Some(value) = strip_prefix_ci(trimmed, "Course Title:") {
            title = Some(value.to_string());
        } else if let Some(value) = strip_prefix_ci(trimmed, "Course Link:") {
            link = Some(value.to_string());
        } else if let Some(value) = strip_prefix_ci(trimmed, "Course Instructor:") {
            instructor = Some(value.to_string());
        } else {
            break;
        }
        lines.next();
    }

    if title.is_none() {
        // No structured header: the whole document is course-level text.
        return ParsedDocument {
            course: Course {
                title: declared_title.to_string(),
                link: None,
                instructor: None,
                lessons: Vec::new(),
            },
            sections: non_empty_section(None, raw_text),
        };
    }

    let mut lessons: Vec<Lesson> = Vec::new();
    let mut sections: Vec<LessonSection> = Vec::new();
    let mut current_number: Option<u32> = None;
    let mut current_text = String::new();

    for line in lines {
        let trimmed = line.trim();

        if let Some((number, lesson_title)) = parse_lesson_marker(trimmed) {
            sections.extend(non_empty_section(current_number, &current_text));
            current_text.clear();
            current_number = Some(number);
            if !lessons.iter().any(|lesson| lesson.number == number) {
                lessons.push(Lesson {
                    number,
                    title: lesson_title,
                    link: None,
                });
            }
            continue;
        }

        if let Some(value) = strip_prefix_ci(trimmed, "Lesson Link:") {
            if let Some(number) = current_number {
                if let Some(lesson) = lessons.iter_mut().find(|lesson| lesson.number == number) {
                    lesson.link = Some(value.to_string());
                }
                continue;
            }
        }

        if !current_text.is_empty() {
            current_text.push('\n');
        }
        current_text.push_str(line);
    }
    sections.extend(non_empty_section(current_number, &current_text));

    ParsedDocument {
        course: Course {
            title: title.unwrap_or_else(|| declared_title.to_string()),
            link,
            instructor,
            lessons,
        },
        sections,
    }
}

fn non_empty_section(lesson_number: Option<u32>, text: &str) -> Vec<LessonSection> {
    if text.trim().is_empty() {
        Vec::new()
    } else {
        vec![LessonSection {
            lesson_number,
            text: text.trim().to_string(),
        }]
    }
}

fn strip_prefix_ci<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    match line.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => Some(line[prefix.len()..].trim()),
        _ => None,
    }
}

fn parse_lesson_marker(line: &str) -> Option<(u32, String)> {
    let rest = strip_prefix_ci(line, "Lesson ")?;
    let colon = rest.find(':')?;
    let number = rest[..colon].trim().parse::<u32>().ok()?;
    Some((number, rest[colon + 1..].trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Course Title: MCP Server Implementation
Course Link: https://example.com/courses/mcp
Course Instructor: Jane Doe

Lesson 0: Introduction
Lesson Link: https://example.com/courses/mcp/lesson/0
Welcome to the course. This lesson covers the basics.

Lesson 1: Protocol Deep Dive
The protocol has three components.
";

    #[test]
    fn header_fields_are_extracted() {
        let parsed = parse_course_document(SAMPLE, "ignored");

        assert_eq!(parsed.course.title, "MCP Server Implementation");
        assert_eq!(
            parsed.course.link.as_deref(),
            Some("https://example.com/courses/mcp")
        );
        assert_eq!(parsed.course.instructor.as_deref(), Some("Jane Doe"));
        assert_eq!(parsed.course.lessons.len(), 2);
        assert_eq!(
            parsed.course.lessons[0].link.as_deref(),
            Some("https://example.com/courses/mcp/lesson/0")
        );
        assert_eq!(parsed.course.lessons[1].title, "Protocol Deep Dive");
        assert!(parsed.course.lessons[1].link.is_none());
    }

    #[test]
    fn sections_follow_lesson_markers() {
        let parsed = parse_course_document(SAMPLE, "ignored");

        assert_eq!(parsed.sections.len(), 2);
        assert_eq!(parsed.sections[0].lesson_number, Some(0));
        assert!(parsed.sections[0].text.contains("Welcome to the course"));
        assert_eq!(parsed.sections[1].lesson_number, Some(1));
        assert!(parsed.sections[1].text.contains("three components"));
    }

    #[test]
    fn text_before_first_marker_is_course_level() {
        let input = "\
Course Title: Only Title
Some preamble before any lesson.

Lesson 1: Start
Lesson one text.
";
        let parsed = parse_course_document(input, "ignored");

        assert_eq!(parsed.sections.len(), 2);
        assert_eq!(parsed.sections[0].lesson_number, None);
        assert!(parsed.sections[0].text.contains("preamble"));
        assert_eq!(parsed.sections[1].lesson_number, Some(1));
    }

    #[test]
    fn missing_header_falls_back_to_declared_title() {
        let parsed = parse_course_document("Just plain transcript text.", "fallback_doc");

        assert_eq!(parsed.course.title, "fallback_doc");
        assert!(parsed.course.lessons.is_empty());
        assert_eq!(parsed.sections.len(), 1);
        assert_eq!(parsed.sections[0].lesson_number, None);
    }

    #[test]
    fn malformed_lesson_marker_is_plain_text() {
        let input = "\
Course Title: T
Lesson one: not a marker because the number is spelled out.
";
        let parsed = parse_course_document(input, "ignored");

        assert!(parsed.course.lessons.is_empty());
        assert_eq!(parsed.sections.len(), 1);
        assert_eq!(parsed.sections[0].lesson_number, None);
    }
}
