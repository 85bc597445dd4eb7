use crate::embeddings::Embedder;
use crate::models::{CatalogEntry, ContentHit, ContentQuery, Course, CourseChunk};
use crate::traits::{CatalogIndex, ContentIndex};
use crate::SearchError;
use chrono::Utc;

/// Facade over the two logical collections. Owns the embedding capability
/// so callers deal only in text; both backends are injected, which lets
/// isolated instances coexist in tests.
pub struct DualIndex<C, T, E>
where
    C: CatalogIndex,
    T: ContentIndex,
    E: Embedder,
{
    catalog: C,
    content: T,
    embedder: E,
}

impl<C, T, E> DualIndex<C, T, E>
where
    C: CatalogIndex + Send + Sync,
    T: ContentIndex + Send + Sync,
    E: Embedder + Send + Sync,
{
    pub fn new(catalog: C, content: T, embedder: E) -> Self {
        Self {
            catalog,
            content,
            embedder,
        }
    }

    /// Writes or replaces the catalog entry for `course`.
    pub async fn upsert_course(
        &self,
        course: &Course,
        chunk_count: usize,
    ) -> Result<(), SearchError> {
        let title_vector = self.embedder.embed(&course.title)?;
        let entry = CatalogEntry {
            course: course.clone(),
            chunk_count,
            ingested_at: Utc::now(),
        };
        self.catalog.upsert_entry(&entry, &title_vector).await
    }

    /// Replaces every stored chunk for `course_title` with the given set.
    pub async fn upsert_chunks(
        &self,
        course_title: &str,
        chunks: &[CourseChunk],
    ) -> Result<(), SearchError> {
        let embeddings = chunks
            .iter()
            .map(|chunk| self.embedder.embed(&chunk.text))
            .collect::<Result<Vec<_>, SearchError>>()?;
        self.content
            .replace_chunks(course_title, chunks, &embeddings)
            .await
    }

    /// Top hits by descending similarity, ties broken by ascending chunk
    /// index. Filters are applied store-side before ranking.
    pub async fn search_content(
        &self,
        query: &ContentQuery,
    ) -> Result<Vec<ContentHit>, SearchError> {
        let query_vector = self.embedder.embed(&query.text)?;
        let mut hits = self
            .content
            .search(&query_vector, &query.filter(), query.limit)
            .await?;

        hits.sort_by(|left, right| {
            right
                .score
                .total_cmp(&left.score)
                .then_with(|| left.chunk_index.cmp(&right.chunk_index))
        });
        hits.truncate(query.limit);
        Ok(hits)
    }

    /// Catalog entries nearest to `name_fragment` in embedding space.
    pub async fn search_catalog(
        &self,
        name_fragment: &str,
        limit: usize,
    ) -> Result<Vec<CatalogEntry>, SearchError> {
        let fragment_vector = self.embedder.embed(name_fragment)?;
        self.catalog.nearest_titles(&fragment_vector, limit).await
    }

    /// Exact-title catalog lookup, used for outlines and lesson links.
    pub async fn course_entry(&self, title: &str) -> Result<Option<CatalogEntry>, SearchError> {
        self.catalog.entry(title).await
    }

    pub async fn list_courses(&self) -> Result<Vec<String>, SearchError> {
        self.catalog.titles().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::models::{ContentQuery, Lesson};
    use crate::stores::MemoryStore;

    fn index() -> DualIndex<MemoryStore, MemoryStore, CharacterNgramEmbedder> {
        let store = MemoryStore::new();
        DualIndex::new(store.clone(), store, CharacterNgramEmbedder::default())
    }

    fn course(title: &str) -> Course {
        Course {
            title: title.to_string(),
            link: None,
            instructor: None,
            lessons: vec![Lesson {
                number: 0,
                title: "Introduction".to_string(),
                link: None,
            }],
        }
    }

    fn chunk(title: &str, index: u64, text: &str) -> CourseChunk {
        CourseChunk {
            chunk_id: format!("{title}-{index}"),
            course_title: title.to_string(),
            lesson_number: Some(0),
            chunk_index: index,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn second_upsert_wins_completely() {
        let index = index();
        index
            .upsert_chunks(
                "Course A",
                &[
                    chunk("Course A", 0, "first version text"),
                    chunk("Course A", 1, "more first version text"),
                ],
            )
            .await
            .unwrap();
        index
            .upsert_chunks("Course A", &[chunk("Course A", 0, "second version text")])
            .await
            .unwrap();

        let hits = index
            .search_content(&ContentQuery::new("version text"))
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "second version text");
    }

    #[tokio::test]
    async fn content_search_respects_course_filter() {
        let index = index();
        index
            .upsert_chunks(
                "Course A",
                &[chunk("Course A", 0, "shared retrieval topic")],
            )
            .await
            .unwrap();
        index
            .upsert_chunks(
                "Course B",
                &[chunk("Course B", 0, "shared retrieval topic")],
            )
            .await
            .unwrap();

        let mut query = ContentQuery::new("retrieval topic");
        query.course_title = Some("Course B".to_string());
        let hits = index.search_content(&query).await.unwrap();

        assert!(!hits.is_empty());
        assert!(hits.iter().all(|hit| hit.course_title == "Course B"));
    }

    #[tokio::test]
    async fn catalog_search_ranks_title_similarity() {
        let index = index();
        index
            .upsert_course(&course("MCP Server Implementation"), 3)
            .await
            .unwrap();
        index
            .upsert_course(&course("Watercolor Painting Basics"), 2)
            .await
            .unwrap();

        let entries = index.search_catalog("MCP", 1).await.unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].course.title, "MCP Server Implementation");
    }

    #[tokio::test]
    async fn list_courses_returns_all_titles() {
        let index = index();
        index.upsert_course(&course("Course A"), 1).await.unwrap();
        index.upsert_course(&course("Course B"), 1).await.unwrap();

        let titles = index.list_courses().await.unwrap();
        assert_eq!(titles, vec!["Course A".to_string(), "Course B".to_string()]);
    }
}
