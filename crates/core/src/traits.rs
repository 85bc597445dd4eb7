use crate::models::{CatalogEntry, ContentFilter, ContentHit, CourseChunk};
use crate::SearchError;
use async_trait::async_trait;

/// Coarse index: one entry per course, searchable by title vector.
#[async_trait]
pub trait CatalogIndex {
    /// Writes or replaces the entry for `entry.course.title`. Readers never
    /// observe a half-written entry.
    async fn upsert_entry(
        &self,
        entry: &CatalogEntry,
        title_vector: &[f32],
    ) -> Result<(), SearchError>;

    /// Entries ranked by similarity to `fragment_vector`, best first.
    async fn nearest_titles(
        &self,
        fragment_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<CatalogEntry>, SearchError>;

    /// Exact-title lookup.
    async fn entry(&self, title: &str) -> Result<Option<CatalogEntry>, SearchError>;

    async fn titles(&self) -> Result<Vec<String>, SearchError>;
}

/// Fine index: one entry per chunk, filterable by course and lesson.
#[async_trait]
pub trait ContentIndex {
    /// Replaces every chunk stored under `course_title` with the given set.
    /// The delete-then-insert must be atomic as seen by readers.
    async fn replace_chunks(
        &self,
        course_title: &str,
        chunks: &[CourseChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), SearchError>;

    /// Hits ranked by similarity to `query_vector`, best first, with the
    /// filter applied before ranking.
    async fn search(
        &self,
        query_vector: &[f32],
        filter: &ContentFilter,
        limit: usize,
    ) -> Result<Vec<ContentHit>, SearchError>;
}
