//! In-process index with brute-force cosine similarity.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{IndexStore, batch_document_ids, check_embeddings, resolve_date_range};
use crate::error::IndexStoreError;
use crate::models::{
    ChunkBatch, ClassSchema, DeleteSelector, DocumentChunk, DocumentChunkWithScore, QueryResult,
    QueryWithEmbedding,
};

/// Index kept entirely in memory. Used for tests and the `memory` driver.
pub struct InMemoryIndex {
    class_name: String,
    dimension: usize,
    classes: RwLock<HashMap<String, ClassSchema>>,
    /// Chunk id -> chunk
    chunks: RwLock<HashMap<String, DocumentChunk>>,
}

impl InMemoryIndex {
    pub fn new(class_name: impl Into<String>, dimension: usize) -> Self {
        Self {
            class_name: class_name.into(),
            dimension,
            classes: RwLock::new(HashMap::new()),
            chunks: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored chunks.
    pub async fn len(&self) -> usize {
        self.chunks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.chunks.read().await.is_empty()
    }

    /// Ids of the chunks stored for a document, sorted.
    pub async fn chunk_ids(&self, document_id: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .chunks
            .read()
            .await
            .values()
            .filter(|c| c.document_id() == document_id)
            .map(|c| c.id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub async fn class(&self, name: &str) -> Option<ClassSchema> {
        self.classes.read().await.get(name).cloned()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl IndexStore for InMemoryIndex {
    async fn health_check(&self) -> Result<bool, IndexStoreError> {
        Ok(true)
    }

    async fn create_class(&self, schema: &ClassSchema) -> Result<bool, IndexStoreError> {
        let mut classes = self.classes.write().await;
        if classes.contains_key(&schema.name) || schema.name == self.class_name {
            return Ok(false);
        }
        classes.insert(schema.name.clone(), schema.clone());
        Ok(true)
    }

    async fn upsert(&self, batches: Vec<ChunkBatch>) -> Result<Vec<String>, IndexStoreError> {
        check_embeddings(&batches, self.dimension)?;
        let document_ids = batch_document_ids(&batches);

        let mut chunks = self.chunks.write().await;
        chunks.retain(|_, chunk| !document_ids.iter().any(|id| id == chunk.document_id()));
        for chunk in batches.into_iter().flat_map(|b| b.chunks) {
            chunks.insert(chunk.id.clone(), chunk);
        }

        Ok(document_ids)
    }

    async fn query(
        &self,
        queries: Vec<QueryWithEmbedding>,
    ) -> Result<Vec<QueryResult>, IndexStoreError> {
        let chunks = self.chunks.read().await;
        let mut results = Vec::with_capacity(queries.len());

        for QueryWithEmbedding { query, embedding } in queries {
            let filter = query.filter.unwrap_or_default();
            let range = resolve_date_range(&filter)?;

            let matches: Vec<DocumentChunkWithScore> = chunks
                .values()
                .filter(|chunk| filter.matches(&chunk.metadata, &range))
                .map(|chunk| DocumentChunkWithScore {
                    id: chunk.id.clone(),
                    text: chunk.text.clone(),
                    metadata: chunk.metadata.clone(),
                    score: cosine_similarity(&embedding, &chunk.embedding),
                })
                .collect();

            let mut result = QueryResult::new(query.query, matches);
            result.results.truncate(query.top_k as usize);
            results.push(result);
        }

        Ok(results)
    }

    async fn delete(&self, selector: DeleteSelector) -> Result<bool, IndexStoreError> {
        let mut chunks = self.chunks.write().await;
        match selector {
            DeleteSelector::All => chunks.clear(),
            DeleteSelector::Filter(filter) if filter.is_empty() => {}
            DeleteSelector::Filter(filter) => {
                let range = resolve_date_range(&filter)?;
                chunks.retain(|_, chunk| !filter.matches(&chunk.metadata, &range));
            }
            DeleteSelector::Ids(ids) => {
                chunks.retain(|_, chunk| !ids.iter().any(|id| id == chunk.document_id()));
            }
        }
        Ok(true)
    }

    fn class_name(&self) -> &str {
        &self.class_name
    }
}

impl std::fmt::Debug for InMemoryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryIndex")
            .field("class_name", &self.class_name)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentMetadata, DocumentMetadataFilter, Query, Source};

    fn chunk(document_id: &str, index: u32, text: &str, embedding: Vec<f32>) -> DocumentChunk {
        chunk_with(document_id, index, text, embedding, DocumentMetadata::default())
    }

    fn chunk_with(
        document_id: &str,
        index: u32,
        text: &str,
        embedding: Vec<f32>,
        metadata: DocumentMetadata,
    ) -> DocumentChunk {
        let mut chunk = DocumentChunk::from_document(document_id, &metadata, text.into(), index);
        chunk.embedding = embedding;
        chunk
    }

    fn batch(document_id: &str, chunks: Vec<DocumentChunk>) -> ChunkBatch {
        ChunkBatch {
            document_id: document_id.into(),
            chunks,
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_document_chunks() {
        let index = InMemoryIndex::new("chunks", 2);
        let first = vec![
            chunk("doc1", 0, "a", vec![1.0, 0.0]),
            chunk("doc1", 1, "b", vec![1.0, 0.0]),
            chunk("doc1", 2, "c", vec![1.0, 0.0]),
        ];
        index.upsert(vec![batch("doc1", first)]).await.unwrap();
        assert_eq!(index.len().await, 3);

        let second = vec![chunk("doc1", 0, "ab", vec![0.0, 1.0])];
        let ids = index.upsert(vec![batch("doc1", second)]).await.unwrap();
        assert_eq!(ids, ["doc1"]);
        assert_eq!(index.chunk_ids("doc1").await, ["doc1_0"]);
    }

    #[tokio::test]
    async fn test_upsert_empty_batch_reports_id_and_clears() {
        let index = InMemoryIndex::new("chunks", 2);
        index
            .upsert(vec![batch("doc1", vec![chunk("doc1", 0, "a", vec![1.0, 0.0])])])
            .await
            .unwrap();

        let ids = index.upsert(vec![batch("doc1", vec![])]).await.unwrap();
        assert_eq!(ids, ["doc1"]);
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn test_upsert_rejects_wrong_dimension() {
        let index = InMemoryIndex::new("chunks", 3);
        let err = index
            .upsert(vec![batch("doc1", vec![chunk("doc1", 0, "a", vec![1.0])])])
            .await
            .unwrap_err();
        assert!(matches!(err, IndexStoreError::UpsertError(_)));
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn test_query_orders_by_score_and_limits() {
        let index = InMemoryIndex::new("chunks", 2);
        index
            .upsert(vec![
                batch("near", vec![chunk("near", 0, "near", vec![1.0, 0.1])]),
                batch("far", vec![chunk("far", 0, "far", vec![0.0, 1.0])]),
                batch("mid", vec![chunk("mid", 0, "mid", vec![1.0, 1.0])]),
            ])
            .await
            .unwrap();

        let results = index
            .query(vec![Query::new("q").with_top_k(2).with_embedding(vec![1.0, 0.0])])
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        let ids: Vec<&str> = results[0].results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["near_0", "mid_0"]);
        assert!(results[0].results[0].score >= results[0].results[1].score);
    }

    #[tokio::test]
    async fn test_query_filter() {
        let index = InMemoryIndex::new("chunks", 2);
        let email = DocumentMetadata {
            source: Some(Source::Email),
            created_at: Some("2024-03-01".into()),
            ..Default::default()
        };
        let file = DocumentMetadata {
            source: Some(Source::File),
            created_at: Some("2023-01-01".into()),
            ..Default::default()
        };
        index
            .upsert(vec![
                batch("e", vec![chunk_with("e", 0, "mail", vec![1.0, 0.0], email)]),
                batch("f", vec![chunk_with("f", 0, "file", vec![1.0, 0.0], file)]),
            ])
            .await
            .unwrap();

        let by_source = DocumentMetadataFilter {
            source: Some(Source::Email),
            ..Default::default()
        };
        let by_date = DocumentMetadataFilter {
            start_date: Some("2023-06-01".into()),
            ..Default::default()
        };
        let nothing = DocumentMetadataFilter {
            author: Some("nobody".into()),
            ..Default::default()
        };
        let results = index
            .query(vec![
                Query::new("a").with_filter(by_source).with_embedding(vec![1.0, 0.0]),
                Query::new("b").with_filter(by_date).with_embedding(vec![1.0, 0.0]),
                Query::new("c").with_filter(nothing).with_embedding(vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        assert_eq!(results[0].results[0].metadata.document_id, "e");
        assert_eq!(results[0].len(), 1);
        assert_eq!(results[1].results[0].metadata.document_id, "e");
        assert_eq!(results[1].len(), 1);
        assert!(results[2].is_empty());
        assert_eq!(results[2].query, "c");
    }

    #[tokio::test]
    async fn test_delete_selectors() {
        let index = InMemoryIndex::new("chunks", 2);
        let alice = DocumentMetadata {
            author: Some("alice".into()),
            ..Default::default()
        };
        index
            .upsert(vec![
                batch("a", vec![chunk("a", 0, "a", vec![1.0, 0.0])]),
                batch("b", vec![chunk_with("b", 0, "b", vec![1.0, 0.0], alice)]),
                batch("c", vec![chunk("c", 0, "c", vec![1.0, 0.0]), chunk("c", 1, "c", vec![1.0, 0.0])]),
            ])
            .await
            .unwrap();

        assert!(index.delete(DeleteSelector::Ids(vec!["a".into()])).await.unwrap());
        assert!(index.chunk_ids("a").await.is_empty());
        assert_eq!(index.len().await, 3);

        let filter = DocumentMetadataFilter {
            author: Some("alice".into()),
            ..Default::default()
        };
        assert!(index.delete(DeleteSelector::Filter(filter)).await.unwrap());
        assert_eq!(index.len().await, 2);

        assert!(index.delete(DeleteSelector::All).await.unwrap());
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn test_create_class_is_idempotent() {
        let index = InMemoryIndex::new("chunks", 2);
        let schema = ClassSchema::for_bucket("b1");
        assert!(index.create_class(&schema).await.unwrap());
        assert!(!index.create_class(&schema).await.unwrap());
        assert_eq!(index.class("b1").await, Some(schema));
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
