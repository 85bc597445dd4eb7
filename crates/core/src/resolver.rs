use crate::embeddings::Embedder;
use crate::store::DualIndex;
use crate::traits::{CatalogIndex, ContentIndex};
use crate::SearchError;

/// Maps a user-supplied, possibly partial or misspelled course name to an
/// exact catalog title via nearest-neighbor lookup in embedding space.
///
/// Deliberately permissive: the best match is returned without a similarity
/// cutoff, so close-but-imperfect phrasing still resolves. An empty catalog
/// resolves to `None` rather than erroring.
pub struct CourseResolver<'a, C, T, E>
where
    C: CatalogIndex,
    T: ContentIndex,
    E: Embedder,
{
    index: &'a DualIndex<C, T, E>,
}

impl<'a, C, T, E> CourseResolver<'a, C, T, E>
where
    C: CatalogIndex + Send + Sync,
    T: ContentIndex + Send + Sync,
    E: Embedder + Send + Sync,
{
    pub fn new(index: &'a DualIndex<C, T, E>) -> Self {
        Self { index }
    }

    pub async fn resolve(&self, name_fragment: &str) -> Result<Option<String>, SearchError> {
        let entries = self.index.search_catalog(name_fragment, 1).await?;
        Ok(entries.into_iter().next().map(|entry| entry.course.title))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::models::Course;
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
            lessons: Vec::new(),
        }
    }

    #[tokio::test]
    async fn partial_name_resolves_to_exact_title() {
        let index = index();
        index
            .upsert_course(&course("MCP Server Implementation"), 0)
            .await
            .unwrap();
        index
            .upsert_course(&course("Watercolor Painting Basics"), 0)
            .await
            .unwrap();

        let resolver = CourseResolver::new(&index);
        let resolved = resolver.resolve("MCP").await.unwrap();

        assert_eq!(resolved.as_deref(), Some("MCP Server Implementation"));
    }

    #[tokio::test]
    async fn resolution_is_case_insensitive() {
        let index = index();
        index
            .upsert_course(&course("MCP Server Implementation"), 0)
            .await
            .unwrap();
        index
            .upsert_course(&course("Watercolor Painting Basics"), 0)
            .await
            .unwrap();

        let resolver = CourseResolver::new(&index);
        let resolved = resolver.resolve("mcp server").await.unwrap();

        assert_eq!(resolved.as_deref(), Some("MCP Server Implementation"));
    }

    #[tokio::test]
    async fn empty_catalog_resolves_to_none() {
        let index = index();
        let resolver = CourseResolver::new(&index);

        let resolved = resolver.resolve("anything").await.unwrap();
        assert!(resolved.is_none());
    }
}
