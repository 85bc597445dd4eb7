//! The two retrieval tools exposed to the model: semantic content search and
//! structural course outlines. A closed set behind one dispatcher; anything
//! that goes wrong during execution comes back as text the model can react
//! to, never as a fatal error.

use crate::embeddings::Embedder;
use crate::llm::ToolDefinition;
use crate::models::{CatalogEntry, ContentQuery, SourceAttribution};
use crate::resolver::CourseResolver;
use crate::store::DualIndex;
use crate::traits::{CatalogIndex, ContentIndex};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const CONTENT_SEARCH_TOOL: &str = "search_course_content";
pub const OUTLINE_TOOL: &str = "get_course_outline";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToolKind {
    ContentSearch,
    Outline,
}

impl ToolKind {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            CONTENT_SEARCH_TOOL => Some(Self::ContentSearch),
            OUTLINE_TOOL => Some(Self::Outline),
            _ => None,
        }
    }
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: CONTENT_SEARCH_TOOL.to_string(),
            description: "Search course transcript content for questions about \
                          specific topics or lesson material."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to search for in course content"
                    },
                    "course_name": {
                        "type": "string",
                        "description": "Course title, partial names accepted"
                    },
                    "lesson_number": {
                        "type": "integer",
                        "description": "Restrict the search to one lesson"
                    }
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: OUTLINE_TOOL.to_string(),
            description: "Get the full lesson list of a course, with titles and \
                          links. Use for questions about course structure."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "course_name": {
                        "type": "string",
                        "description": "Course title, partial names accepted"
                    }
                },
                "required": ["course_name"]
            }),
        },
    ]
}

/// Executes tool calls against the dual index and tracks which sources each
/// call touched. One orchestrator lives for exactly one query cycle, so an
/// abandoned cycle takes its pending attributions with it.
pub struct ToolOrchestrator<C, T, E>
where
    C: CatalogIndex,
    T: ContentIndex,
    E: Embedder,
{
    index: Arc<DualIndex<C, T, E>>,
    sources: Mutex<Vec<SourceAttribution>>,
}

impl<C, T, E> ToolOrchestrator<C, T, E>
where
    C: CatalogIndex + Send + Sync,
    T: ContentIndex + Send + Sync,
    E: Embedder + Send + Sync,
{
    pub fn new(index: Arc<DualIndex<C, T, E>>) -> Self {
        Self {
            index,
            sources: Mutex::new(Vec::new()),
        }
    }

    /// Dispatches one tool call. The return value is always model-facing
    /// text; validation problems and execution failures are phrased as such.
    pub async fn execute(&self, tool_name: &str, arguments: &Value) -> String {
        match ToolKind::from_name(tool_name) {
            Some(ToolKind::ContentSearch) => self.execute_content_search(arguments).await,
            Some(ToolKind::Outline) => self.execute_outline(arguments).await,
            None => format!("Unknown tool '{tool_name}'."),
        }
    }

    /// Returns and clears the attributions accumulated since the last drain.
    pub async fn drain_sources(&self) -> Vec<SourceAttribution> {
        std::mem::take(&mut *self.sources.lock().await)
    }

    async fn execute_content_search(&self, arguments: &Value) -> String {
        let Some(query_text) = arguments.get("query").and_then(Value::as_str) else {
            return format!("The '{CONTENT_SEARCH_TOOL}' tool requires a 'query' argument.");
        };
        let course_name = arguments.get("course_name").and_then(Value::as_str);
        let lesson_number = arguments
            .get("lesson_number")
            .and_then(Value::as_u64)
            .map(|number| number as u32);

        let resolved_title = match course_name {
            Some(name) => match CourseResolver::new(&self.index).resolve(name).await {
                Ok(Some(title)) => Some(title),
                Ok(None) => return format!("No course found matching '{name}'."),
                Err(error) => return format!("Tool execution failed: {error}"),
            },
            None => None,
        };

        let mut query = ContentQuery::new(query_text);
        query.course_title = resolved_title;
        query.lesson_number = lesson_number;

        let hits = match self.index.search_content(&query).await {
            Ok(hits) => hits,
            Err(error) => return format!("Tool execution failed: {error}"),
        };

        if hits.is_empty() {
            let mut message = String::from("No relevant content found");
            if let Some(title) = &query.course_title {
                message.push_str(&format!(" in course '{title}'"));
            }
            if let Some(lesson) = lesson_number {
                message.push_str(&format!(" in lesson {lesson}"));
            }
            message.push('.');
            return message;
        }

        let mut entries: HashMap<String, Option<CatalogEntry>> = HashMap::new();
        let mut blocks = Vec::new();
        let mut sources = self.sources.lock().await;

        for hit in &hits {
            let header = match hit.lesson_number {
                Some(lesson) => format!("[{} - Lesson {}]", hit.course_title, lesson),
                None => format!("[{}]", hit.course_title),
            };
            blocks.push(format!("{header}\n{}", hit.text));

            let entry = match entries.get(&hit.course_title) {
                Some(cached) => cached.clone(),
                None => {
                    let fetched = self
                        .index
                        .course_entry(&hit.course_title)
                        .await
                        .unwrap_or(None);
                    entries.insert(hit.course_title.clone(), fetched.clone());
                    fetched
                }
            };

            let link = entry.as_ref().and_then(|entry| match hit.lesson_number {
                Some(lesson) => entry.course.lesson_link(lesson).map(str::to_string),
                None => entry.course.link.clone(),
            });

            let attribution = SourceAttribution {
                course_title: hit.course_title.clone(),
                lesson_number: hit.lesson_number,
                link,
            };
            if !sources.contains(&attribution) {
                sources.push(attribution);
            }
        }

        blocks.join("\n\n")
    }

    async fn execute_outline(&self, arguments: &Value) -> String {
        let Some(name) = arguments.get("course_name").and_then(Value::as_str) else {
            return format!("The '{OUTLINE_TOOL}' tool requires a 'course_name' argument.");
        };

        let title = match CourseResolver::new(&self.index).resolve(name).await {
            Ok(Some(title)) => title,
            Ok(None) => return format!("No course found matching '{name}'."),
            Err(error) => return format!("Tool execution failed: {error}"),
        };

        let entry = match self.index.course_entry(&title).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return format!("No course found matching '{name}'."),
            Err(error) => return format!("Tool execution failed: {error}"),
        };

        let course = &entry.course;
        let mut output = format!("Course: {}", course.title);
        if let Some(link) = &course.link {
            output.push_str(&format!("\nCourse Link: {link}"));
        }
        if let Some(instructor) = &course.instructor {
            output.push_str(&format!("\nInstructor: {instructor}"));
        }
        output.push_str(&format!("\nLessons ({}):", course.lessons.len()));
        for lesson in &course.lessons {
            output.push_str(&format!("\n  {}. {}", lesson.number, lesson.title));
            if let Some(link) = &lesson.link {
                output.push_str(&format!(" ({link})"));
            }
        }

        let mut sources = self.sources.lock().await;
        let attribution = SourceAttribution {
            course_title: course.title.clone(),
            lesson_number: None,
            link: course.link.clone(),
        };
        if !sources.contains(&attribution) {
            sources.push(attribution);
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::models::{Course, CourseChunk, Lesson};
    use crate::stores::MemoryStore;

    type TestIndex = DualIndex<MemoryStore, MemoryStore, CharacterNgramEmbedder>;

    async fn seeded_index() -> Arc<TestIndex> {
        let store = MemoryStore::new();
        let index = Arc::new(DualIndex::new(
            store.clone(),
            store,
            CharacterNgramEmbedder::default(),
        ));

        let course = Course {
            title: "MCP Server Implementation".to_string(),
            link: Some("https://example.com/mcp".to_string()),
            instructor: Some("Jane Doe".to_string()),
            lessons: vec![
                Lesson {
                    number: 0,
                    title: "Introduction".to_string(),
                    link: Some("https://example.com/mcp/0".to_string()),
                },
                Lesson {
                    number: 1,
                    title: "Protocol Basics".to_string(),
                    link: Some("https://example.com/mcp/1".to_string()),
                },
            ],
        };
        let chunks = vec![
            CourseChunk {
                chunk_id: "c0".to_string(),
                course_title: course.title.clone(),
                lesson_number: Some(0),
                chunk_index: 0,
                text: "Welcome to the course about servers.".to_string(),
            },
            CourseChunk {
                chunk_id: "c1".to_string(),
                course_title: course.title.clone(),
                lesson_number: Some(1),
                chunk_index: 1,
                text: "The protocol exchanges typed messages.".to_string(),
            },
        ];

        index.upsert_course(&course, chunks.len()).await.unwrap();
        index.upsert_chunks(&course.title, &chunks).await.unwrap();
        index
    }

    #[tokio::test]
    async fn content_search_formats_hits_and_tracks_sources() {
        let orchestrator = ToolOrchestrator::new(seeded_index().await);

        let output = orchestrator
            .execute(
                CONTENT_SEARCH_TOOL,
                &json!({ "query": "protocol messages", "course_name": "MCP" }),
            )
            .await;

        assert!(output.contains("[MCP Server Implementation - Lesson 1]"));
        assert!(output.contains("typed messages"));

        let sources = orchestrator.drain_sources().await;
        assert!(!sources.is_empty());
        assert!(sources
            .iter()
            .all(|source| source.course_title == "MCP Server Implementation"));
        let lesson_one = sources
            .iter()
            .find(|source| source.lesson_number == Some(1))
            .expect("lesson 1 attribution");
        assert_eq!(lesson_one.link.as_deref(), Some("https://example.com/mcp/1"));
    }

    #[tokio::test]
    async fn lesson_filter_limits_results() {
        let orchestrator = ToolOrchestrator::new(seeded_index().await);

        let output = orchestrator
            .execute(
                CONTENT_SEARCH_TOOL,
                &json!({ "query": "course", "lesson_number": 0 }),
            )
            .await;

        assert!(output.contains("Lesson 0"));
        assert!(!output.contains("Lesson 1"));
    }

    #[tokio::test]
    async fn unresolvable_course_returns_no_match_message() {
        let store = MemoryStore::new();
        let index = Arc::new(DualIndex::new(
            store.clone(),
            store,
            CharacterNgramEmbedder::default(),
        ));
        let orchestrator = ToolOrchestrator::new(index);

        let output = orchestrator
            .execute(
                CONTENT_SEARCH_TOOL,
                &json!({ "query": "anything", "course_name": "Ghost Course" }),
            )
            .await;

        assert_eq!(output, "No course found matching 'Ghost Course'.");
        assert!(orchestrator.drain_sources().await.is_empty());
    }

    #[tokio::test]
    async fn missing_query_argument_is_reported_as_text() {
        let orchestrator = ToolOrchestrator::new(seeded_index().await);

        let output = orchestrator
            .execute(CONTENT_SEARCH_TOOL, &json!({ "course_name": "MCP" }))
            .await;

        assert!(output.contains("requires a 'query' argument"));
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_as_text() {
        let orchestrator = ToolOrchestrator::new(seeded_index().await);
        let output = orchestrator.execute("delete_everything", &json!({})).await;
        assert_eq!(output, "Unknown tool 'delete_everything'.");
    }

    #[tokio::test]
    async fn outline_lists_every_lesson_without_content_search() {
        let orchestrator = ToolOrchestrator::new(seeded_index().await);

        let output = orchestrator
            .execute(OUTLINE_TOOL, &json!({ "course_name": "mcp server" }))
            .await;

        assert!(output.starts_with("Course: MCP Server Implementation"));
        assert!(output.contains("Course Link: https://example.com/mcp"));
        assert!(output.contains("Instructor: Jane Doe"));
        assert!(output.contains("Lessons (2):"));
        assert!(output.contains("0. Introduction (https://example.com/mcp/0)"));
        assert!(output.contains("1. Protocol Basics"));

        let sources = orchestrator.drain_sources().await;
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].lesson_number, None);
    }

    #[tokio::test]
    async fn drain_clears_accumulated_sources() {
        let orchestrator = ToolOrchestrator::new(seeded_index().await);

        orchestrator
            .execute(CONTENT_SEARCH_TOOL, &json!({ "query": "protocol" }))
            .await;

        let first = orchestrator.drain_sources().await;
        let second = orchestrator.drain_sources().await;

        assert!(!first.is_empty());
        assert!(second.is_empty());
    }

    #[test]
    fn definitions_declare_both_tools() {
        let definitions = tool_definitions();

        assert_eq!(definitions.len(), 2);
        assert_eq!(definitions[0].name, CONTENT_SEARCH_TOOL);
        assert_eq!(definitions[0].input_schema["required"][0], "query");
        assert_eq!(definitions[1].name, OUTLINE_TOOL);
        assert_eq!(definitions[1].input_schema["required"][0], "course_name");
    }
}
