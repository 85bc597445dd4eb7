use crate::models::{CatalogEntry, ContentFilter, ContentHit, CourseChunk};
use crate::traits::{CatalogIndex, ContentIndex};
use crate::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// Qdrant REST backend holding both logical collections: a small catalog
/// collection (one point per course) and a large content collection (one
/// point per chunk). Point ids are derived from stable keys so re-ingestion
/// upserts in place.
pub struct QdrantDualStore {
    endpoint: String,
    catalog_collection: String,
    content_collection: String,
    client: Client,
    vector_size: usize,
}

impl QdrantDualStore {
    pub fn new(
        endpoint: impl Into<String>,
        catalog_collection: impl Into<String>,
        content_collection: impl Into<String>,
        vector_size: usize,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            catalog_collection: catalog_collection.into(),
            content_collection: content_collection.into(),
            client: Client::new(),
            vector_size,
        }
    }

    pub async fn ensure_collections(&self) -> Result<(), SearchError> {
        for collection in [&self.catalog_collection, &self.content_collection] {
            let response = self
                .client
                .put(format!("{}/collections/{}", self.endpoint, collection))
                .json(&json!({
                    "vectors": { "size": self.vector_size, "distance": "Cosine" }
                }))
                .send()
                .await?;

            // 409 means the collection already exists.
            if !response.status().is_success() && response.status().as_u16() != 409 {
                return Err(SearchError::BackendResponse {
                    backend: "qdrant".to_string(),
                    details: response.status().to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_vector(&self, vector: &[f32]) -> Result<(), SearchError> {
        if vector.len() != self.vector_size {
            return Err(SearchError::Request(format!(
                "vector dimension {} is not {}",
                vector.len(),
                self.vector_size
            )));
        }
        Ok(())
    }

    async fn upsert_points(&self, collection: &str, points: Vec<Value>) -> Result<(), SearchError> {
        if points.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .put(format!(
                "{}/collections/{}/points?wait=true",
                self.endpoint, collection
            ))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }
        Ok(())
    }
}

fn stable_point_id(key: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

fn title_condition(title: &str) -> Value {
    json!({ "key": "course_title", "match": { "value": title } })
}

#[async_trait]
impl CatalogIndex for QdrantDualStore {
    async fn upsert_entry(
        &self,
        entry: &CatalogEntry,
        title_vector: &[f32],
    ) -> Result<(), SearchError> {
        self.check_vector(title_vector)?;

        let point = json!({
            "id": stable_point_id(&entry.course.title),
            "vector": title_vector,
            "payload": {
                "course_title": entry.course.title,
                "entry": serde_json::to_value(entry)?,
            },
        });

        self.upsert_points(&self.catalog_collection, vec![point]).await
    }

    async fn nearest_titles(
        &self,
        fragment_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<CatalogEntry>, SearchError> {
        self.check_vector(fragment_vector)?;

        let response = self
            .client
            .post(format!(
                "{}/collections/{}/points/search",
                self.endpoint, self.catalog_collection
            ))
            .json(&json!({
                "vector": fragment_vector,
                "limit": limit,
                "with_payload": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let hits = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut entries = Vec::new();
        for hit in hits {
            if let Some(payload) = hit.pointer("/payload/entry") {
                entries.push(serde_json::from_value(payload.clone())?);
            }
        }
        Ok(entries)
    }

    async fn entry(&self, title: &str) -> Result<Option<CatalogEntry>, SearchError> {
        let response = self
            .client
            .post(format!(
                "{}/collections/{}/points/scroll",
                self.endpoint, self.catalog_collection
            ))
            .json(&json!({
                "filter": { "must": [title_condition(title)] },
                "limit": 1,
                "with_payload": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        match parsed.pointer("/result/points/0/payload/entry") {
            Some(payload) => Ok(Some(serde_json::from_value(payload.clone())?)),
            None => Ok(None),
        }
    }

    async fn titles(&self) -> Result<Vec<String>, SearchError> {
        let response = self
            .client
            .post(format!(
                "{}/collections/{}/points/scroll",
                self.endpoint, self.catalog_collection
            ))
            .json(&json!({ "limit": 1024, "with_payload": true }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let points = parsed
            .pointer("/result/points")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut titles: Vec<String> = points
            .iter()
            .filter_map(|point| {
                point
                    .pointer("/payload/course_title")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .collect();
        titles.sort_unstable();
        Ok(titles)
    }
}

#[async_trait]
impl ContentIndex for QdrantDualStore {
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

        // Drop any stale chunks from a previous version of this course
        // before the new set goes in.
        let response = self
            .client
            .post(format!(
                "{}/collections/{}/points/delete?wait=true",
                self.endpoint, self.content_collection
            ))
            .json(&json!({
                "filter": { "must": [title_condition(course_title)] }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let points = chunks
            .iter()
            .zip(embeddings.iter())
            .map(|(chunk, embedding)| {
                self.check_vector(embedding)?;
                Ok(json!({
                    "id": stable_point_id(&chunk.chunk_id),
                    "vector": embedding,
                    "payload": {
                        "course_title": chunk.course_title,
                        "lesson_number": chunk.lesson_number,
                        "chunk_index": chunk.chunk_index,
                        "text": chunk.text,
                    },
                }))
            })
            .collect::<Result<Vec<_>, SearchError>>()?;

        self.upsert_points(&self.content_collection, points).await
    }

    async fn search(
        &self,
        query_vector: &[f32],
        filter: &ContentFilter,
        limit: usize,
    ) -> Result<Vec<ContentHit>, SearchError> {
        self.check_vector(query_vector)?;

        let mut must = Vec::new();
        if let Some(title) = &filter.course_title {
            must.push(title_condition(title));
        }
        if let Some(lesson) = filter.lesson_number {
            must.push(json!({ "key": "lesson_number", "match": { "value": lesson } }));
        }

        let mut body = json!({
            "vector": query_vector,
            "limit": limit,
            "with_payload": true,
        });
        if !must.is_empty() {
            body["filter"] = json!({ "must": must });
        }

        let response = self
            .client
            .post(format!(
                "{}/collections/{}/points/search",
                self.endpoint, self.content_collection
            ))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let hits = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut result = Vec::new();
        for hit in hits {
            result.push(ContentHit {
                text: hit
                    .pointer("/payload/text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                course_title: hit
                    .pointer("/payload/course_title")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                lesson_number: hit
                    .pointer("/payload/lesson_number")
                    .and_then(Value::as_u64)
                    .map(|number| number as u32),
                chunk_index: hit
                    .pointer("/payload/chunk_index")
                    .and_then(Value::as_u64)
                    .unwrap_or_default(),
                score: hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0),
            });
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::stable_point_id;

    #[test]
    fn point_ids_are_stable_per_key() {
        assert_eq!(stable_point_id("Course A"), stable_point_id("Course A"));
        assert_ne!(stable_point_id("Course A"), stable_point_id("Course B"));
    }
}
