//! Index store abstraction layer.
//!
//! Chunk records with their embeddings live in one class (a Qdrant
//! collection or a PostgreSQL table). Backends are selected by configuration
//! and share the filter semantics of [`DocumentMetadataFilter::matches`].

mod memory;
mod pgvector;
mod qdrant;

pub use memory::InMemoryIndex;
pub use pgvector::PgVectorBackend;
pub use qdrant::QdrantBackend;

use async_trait::async_trait;

use crate::error::IndexStoreError;
use crate::models::{
    ChunkBatch, ClassSchema, DateRange, DeleteSelector, DocumentChunkMetadata,
    DocumentMetadataFilter, IndexDriver, IndexStoreConfig, QueryResult, QueryWithEmbedding,
    parse_timestamp,
};

/// Operations the coordinator needs from a searchable index.
#[async_trait]
pub trait IndexStore: Send + Sync {
    async fn health_check(&self) -> Result<bool, IndexStoreError>;

    /// Provision a class. Returns `false` when it already exists.
    async fn create_class(&self, schema: &ClassSchema) -> Result<bool, IndexStoreError>;

    /// Write chunk batches, replacing any chunks previously stored for each
    /// batch's document. Returns the ids of the documents written.
    async fn upsert(&self, batches: Vec<ChunkBatch>) -> Result<Vec<String>, IndexStoreError>;

    /// Nearest-neighbour search, one result set per query, in query order.
    async fn query(
        &self,
        queries: Vec<QueryWithEmbedding>,
    ) -> Result<Vec<QueryResult>, IndexStoreError>;

    async fn delete(&self, selector: DeleteSelector) -> Result<bool, IndexStoreError>;

    /// Class holding the chunk records.
    fn class_name(&self) -> &str;
}

/// Create an index store backend based on configuration.
pub async fn create_backend(
    config: &IndexStoreConfig,
    dimension: u64,
) -> Result<Box<dyn IndexStore>, IndexStoreError> {
    match config.driver {
        IndexDriver::Qdrant => {
            let backend = QdrantBackend::new(config, dimension)?;
            Ok(Box::new(backend))
        }
        IndexDriver::PostgreSQL => {
            let backend = PgVectorBackend::new(config, dimension).await?;
            Ok(Box::new(backend))
        }
        IndexDriver::Memory => Ok(Box::new(InMemoryIndex::new(
            &config.class_name,
            dimension as usize,
        ))),
    }
}

/// Resolve a filter's date bounds, rejecting unparseable dates.
fn resolve_date_range(filter: &DocumentMetadataFilter) -> Result<DateRange, IndexStoreError> {
    filter.date_range().map_err(IndexStoreError::InvalidFilter)
}

/// `created_at` as unix seconds, when it parses.
fn created_at_timestamp(metadata: &DocumentChunkMetadata) -> Option<i64> {
    metadata.document.created_at.as_deref().and_then(parse_timestamp)
}

/// Document ids of the batches, deduplicated, in first-seen order.
fn batch_document_ids(batches: &[ChunkBatch]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::with_capacity(batches.len());
    for batch in batches {
        if !ids.contains(&batch.document_id) {
            ids.push(batch.document_id.clone());
        }
    }
    ids
}

fn check_embeddings(batches: &[ChunkBatch], dimension: usize) -> Result<(), IndexStoreError> {
    for chunk in batches.iter().flat_map(|b| &b.chunks) {
        if chunk.embedding.len() != dimension {
            return Err(IndexStoreError::UpsertError(format!(
                "chunk {} has an embedding of dimension {}, expected {}",
                chunk.id,
                chunk.embedding.len(),
                dimension
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Document, DocumentChunk};

    #[test]
    fn test_batch_document_ids_dedup() {
        let batches = vec![
            ChunkBatch { document_id: "a".into(), chunks: vec![] },
            ChunkBatch { document_id: "b".into(), chunks: vec![] },
            ChunkBatch { document_id: "a".into(), chunks: vec![] },
        ];
        assert_eq!(batch_document_ids(&batches), ["a", "b"]);
    }

    #[test]
    fn test_check_embeddings_rejects_missing_vectors() {
        let doc = Document::new("a", "text");
        let chunk = DocumentChunk::from_document("a", &doc.metadata, "text".into(), 0);
        let batches = vec![ChunkBatch { document_id: "a".into(), chunks: vec![chunk] }];
        assert!(matches!(
            check_embeddings(&batches, 3),
            Err(IndexStoreError::UpsertError(_))
        ));
    }

    #[test]
    fn test_invalid_date_is_a_filter_error() {
        let filter = DocumentMetadataFilter {
            start_date: Some("yesterday-ish".into()),
            ..Default::default()
        };
        assert!(matches!(
            resolve_date_range(&filter),
            Err(IndexStoreError::InvalidFilter(_))
        ));
    }

    #[tokio::test]
    async fn test_create_memory_backend() {
        let config = IndexStoreConfig::memory("chunks");
        let backend = create_backend(&config, 4).await.unwrap();
        assert_eq!(backend.class_name(), "chunks");
        assert!(backend.health_check().await.unwrap());
    }
}
