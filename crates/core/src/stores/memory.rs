use crate::models::{CatalogEntry, ContentFilter, ContentHit, CourseChunk};
use crate::traits::{CatalogIndex, ContentIndex};
use crate::SearchError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-process dual store. Cloning shares the underlying collections, so one
/// instance can serve as both the catalog and the content backend. The write
/// lock is held across the whole delete-then-insert of a course, which keeps
/// per-title replacement atomic for concurrent readers.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<State>>,
}

#[derive(Default)]
struct State {
    catalog: HashMap<String, (CatalogEntry, Vec<f32>)>,
    content: HashMap<String, Vec<(CourseChunk, Vec<f32>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine(left: &[f32], right: &[f32]) -> f64 {
    if left.len() != right.len() {
        return 0.0;
    }
    let dot: f32 = left.iter().zip(right).map(|(a, b)| a * b).sum();
    let left_norm: f32 = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let right_norm: f32 = right.iter().map(|value| value * value).sum::<f32>().sqrt();
    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    f64::from(dot / (left_norm * right_norm))
}

#[async_trait]
impl CatalogIndex for MemoryStore {
    async fn upsert_entry(
        &self,
        entry: &CatalogEntry,
        title_vector: &[f32],
    ) -> Result<(), SearchError> {
        let mut state = self.inner.write().await;
        state.catalog.insert(
            entry.course.title.clone(),
            (entry.clone(), title_vector.to_vec()),
        );
        Ok(())
    }

    async fn nearest_titles(
        &self,
        fragment_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<CatalogEntry>, SearchError> {
        let state = self.inner.read().await;
        let mut scored: Vec<(f64, &CatalogEntry)> = state
            .catalog
            .values()
            .map(|(entry, vector)| (cosine(fragment_vector, vector), entry))
            .collect();

        scored.sort_by(|left, right| {
            right
                .0
                .total_cmp(&left.0)
                .then_with(|| left.1.course.title.cmp(&right.1.course.title))
        });

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, entry)| entry.clone())
            .collect())
    }

    async fn entry(&self, title: &str) -> Result<Option<CatalogEntry>, SearchError> {
        let state = self.inner.read().await;
        Ok(state.catalog.get(title).map(|(entry, _)| entry.clone()))
    }

    async fn titles(&self) -> Result<Vec<String>, SearchError> {
        let state = self.inner.read().await;
        let mut titles: Vec<String> = state.catalog.keys().cloned().collect();
        titles.sort_unstable();
        Ok(titles)
    }
}

#[async_trait]
impl ContentIndex for MemoryStore {
    async fn replace_chunks(
        &self,
        course_title: &str,
        chunks: &[CourseChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), SearchError> {
        if chunks.len() != embeddings.len() {
            return Err(SearchError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let mut state = self.inner.write().await;
        let entries = chunks
            .iter()
            .cloned()
            .zip(embeddings.iter().cloned())
            .collect();
        state.content.insert(course_title.to_string(), entries);
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        filter: &ContentFilter,
        limit: usize,
    ) -> Result<Vec<ContentHit>, SearchError> {
        let state = self.inner.read().await;

        let mut hits: Vec<ContentHit> = state
            .content
            .iter()
            .filter(|(title, _)| {
                filter
                    .course_title
                    .as_ref()
                    .map_or(true, |wanted| wanted == *title)
            })
            .flat_map(|(_, entries)| entries.iter())
            .filter(|(chunk, _)| {
                filter
                    .lesson_number
                    .map_or(true, |wanted| chunk.lesson_number == Some(wanted))
            })
            .map(|(chunk, vector)| ContentHit {
                text: chunk.text.clone(),
                course_title: chunk.course_title.clone(),
                lesson_number: chunk.lesson_number,
                chunk_index: chunk.chunk_index,
                score: cosine(query_vector, vector),
            })
            .collect();

        hits.sort_by(|left, right| {
            right
                .score
                .total_cmp(&left.score)
                .then_with(|| left.chunk_index.cmp(&right.chunk_index))
        });
        hits.truncate(limit);
        Ok(hits)
    }
}
