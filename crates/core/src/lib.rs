pub mod chunking;
pub mod coordinator;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod resolver;
pub mod session;
pub mod store;
pub mod stores;
pub mod tools;
pub mod traits;

pub use chunking::{build_windows, make_chunk_id, normalize_whitespace, process_document, split_sentences};
pub use coordinator::{QueryCoordinator, QueryOutcome, DEFAULT_MAX_TOOL_ROUNDS};
pub use embeddings::{CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{IngestError, QueryError, SearchError};
pub use extractor::{parse_course_document, LessonSection, ParsedDocument};
pub use ingest::{
    discover_documents, ingest_document, ingest_folder, IngestionReport, SkippedDocument,
};
pub use llm::{
    AnthropicClient, ChatEvent, ChatModel, ChatRequest, ModelTurn, ToolCall, ToolDefinition,
    ToolOutput,
};
pub use models::{
    CatalogEntry, ChunkingOptions, ContentFilter, ContentHit, ContentQuery, Course, CourseChunk,
    Lesson, SourceAttribution, DEFAULT_SEARCH_LIMIT,
};
pub use resolver::CourseResolver;
pub use session::SessionTracker;
pub use store::DualIndex;
pub use stores::{MemoryStore, QdrantDualStore};
pub use tools::{tool_definitions, ToolOrchestrator, CONTENT_SEARCH_TOOL, OUTLINE_TOOL};
pub use traits::{CatalogIndex, ContentIndex};
