//! Coordinates the blob store, chunker, embedder and index store so they
//! behave as one logical document store.
//!
//! The two stores fail independently and there is no transaction spanning
//! them. Every write is keyed by document id and idempotent, blob failures are
//! isolated per document, and index failures always surface to the caller.

use futures::{StreamExt, stream};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::error::{EmbeddingError, HybridError};
use crate::models::{
    BlobOutcome, BlobStatus, ClassSchema, Config, DeleteReport, DeleteRequest, Document, Query,
    QueryResult, UpsertReport,
};
use crate::services::blob_store::{BlobStore, create_blob_store};
use crate::services::chunker::TextChunker;
use crate::services::embedding::{Embedder, EmbeddingClient, InstructionType};
use crate::services::index_store::{IndexStore, create_backend};

const DEFAULT_UPLOAD_CONCURRENCY: usize = 8;

pub struct HybridDataStore {
    blob_store: Arc<dyn BlobStore>,
    index_store: Arc<dyn IndexStore>,
    embedder: Arc<dyn Embedder>,
    chunker: TextChunker,
    bucket: String,
    upload_concurrency: usize,
}

impl HybridDataStore {
    pub fn new(
        blob_store: Arc<dyn BlobStore>,
        index_store: Arc<dyn IndexStore>,
        embedder: Arc<dyn Embedder>,
        chunker: TextChunker,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            blob_store,
            index_store,
            embedder,
            chunker,
            bucket: bucket.into(),
            upload_concurrency: DEFAULT_UPLOAD_CONCURRENCY,
        }
    }

    /// Bound on concurrent blob uploads and deletes within one call.
    pub fn with_upload_concurrency(mut self, upload_concurrency: usize) -> Self {
        self.upload_concurrency = upload_concurrency.max(1);
        self
    }

    /// Build every adapter from configuration.
    pub async fn from_config(config: &Config) -> Result<Self, HybridError> {
        config.validate()?;

        let blob_store: Arc<dyn BlobStore> = Arc::from(create_blob_store(&config.blob_store).await?);
        let embedder = Arc::new(EmbeddingClient::new(&config.embedding)?);
        let index_store: Arc<dyn IndexStore> = Arc::from(
            create_backend(&config.index_store, u64::from(config.embedding.dimension)).await?,
        );

        tracing::debug!(
            bucket = %config.blob_store.bucket,
            class = %config.index_store.class_name,
            "hybrid store initialized"
        );

        Ok(Self::new(
            blob_store,
            index_store,
            embedder,
            TextChunker::new(&config.chunking),
            &config.blob_store.bucket,
        )
        .with_upload_concurrency(config.blob_store.upload_concurrency))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn blob_store(&self) -> &dyn BlobStore {
        self.blob_store.as_ref()
    }

    pub fn index_store(&self) -> &dyn IndexStore {
        self.index_store.as_ref()
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    /// Store and index documents. Returns the ids the index accepted.
    ///
    /// Ids whose blob upload failed are still returned when indexing
    /// succeeded; use [`Self::upsert_with_report`] to see blob outcomes.
    pub async fn upsert(
        &self,
        documents: &[Document],
        chunk_token_size: Option<usize>,
    ) -> Result<Vec<String>, HybridError> {
        self.upsert_with_report(documents, chunk_token_size)
            .await
            .map(|report| report.indexed_ids)
    }

    pub async fn upsert_with_report(
        &self,
        documents: &[Document],
        chunk_token_size: Option<usize>,
    ) -> Result<UpsertReport, HybridError> {
        if documents.is_empty() {
            return Ok(UpsertReport::default());
        }

        let documents: Vec<Document> = documents
            .iter()
            .cloned()
            .map(|mut document| {
                if document.id.is_none() {
                    document.id = Some(Document::generate_id());
                }
                document
            })
            .collect();
        let documents = last_per_id(documents);

        let blob = self.store_blobs(&documents).await;

        // Resident objects without text only carry listing metadata; they
        // must not clear chunks already indexed under the same id.
        let metadata_only: HashSet<&str> = documents
            .iter()
            .filter(|d| d.resident && d.text.is_empty())
            .filter_map(|d| d.id.as_deref())
            .collect();

        let mut batches = self.chunker.chunk(&documents, chunk_token_size);
        batches.retain(|b| !metadata_only.contains(b.document_id.as_str()));

        let texts: Vec<String> = batches
            .iter()
            .flat_map(|b| b.chunks.iter().map(|c| c.text.clone()))
            .collect();
        let chunk_count = texts.len();

        if chunk_count > 0 {
            let embeddings = self.embedder.embed(texts, InstructionType::Document).await?;
            if embeddings.len() != chunk_count {
                return Err(EmbeddingError::InvalidResponse(format!(
                    "expected {} embeddings, got {}",
                    chunk_count,
                    embeddings.len()
                ))
                .into());
            }

            let chunks = batches.iter_mut().flat_map(|b| b.chunks.iter_mut());
            for (chunk, embedding) in chunks.zip(embeddings) {
                chunk.embedding = embedding;
            }
        }

        let accepted = if batches.is_empty() {
            Vec::new()
        } else {
            self.index_store.upsert(batches).await?
        };

        let indexed_ids: Vec<String> = documents
            .iter()
            .filter_map(|d| d.id.as_deref())
            .filter(|id| metadata_only.contains(id) || accepted.iter().any(|a| a == id))
            .map(str::to_string)
            .collect();

        let report = UpsertReport { indexed_ids, blob };
        tracing::info!(
            documents = documents.len(),
            chunks = chunk_count,
            indexed = report.indexed_ids.len(),
            blob_failures = report.blob_failures().count(),
            "upsert complete"
        );
        Ok(report)
    }

    async fn store_blobs(&self, documents: &[Document]) -> Vec<BlobOutcome> {
        stream::iter(documents)
            .map(|document| self.store_blob(document))
            .buffered(self.upload_concurrency)
            .collect()
            .await
    }

    async fn store_blob(&self, document: &Document) -> BlobOutcome {
        let id = document.id.as_deref().unwrap_or_default();

        if document.resident {
            return BlobOutcome::new(id, BlobStatus::Resident);
        }

        let Some(source) = document.blob_source() else {
            tracing::warn!(document_id = id, "no blob payload to store, skipping upload");
            return BlobOutcome::new(
                id,
                BlobStatus::Skipped {
                    reason: "no file_path, content or text".to_string(),
                },
            );
        };

        match self.blob_store.upload(&self.bucket, id, &source).await {
            Ok(bytes) => BlobOutcome::new(id, BlobStatus::Stored { bytes }),
            Err(e) => {
                tracing::warn!(document_id = id, error = %e, "blob upload failed, indexing anyway");
                BlobOutcome::new(id, BlobStatus::Failed { error: e.to_string() })
            }
        }
    }

    /// Run similarity queries. Results come back in query order.
    pub async fn query(&self, queries: Vec<Query>) -> Result<Vec<QueryResult>, HybridError> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(query) = queries.iter().find(|q| q.top_k == 0) {
            return Err(HybridError::InvalidQuery(format!(
                "top_k must be at least 1 (query '{}')",
                query.query
            )));
        }

        let texts: Vec<String> = queries.iter().map(|q| q.query.clone()).collect();
        let embeddings = self.embedder.embed(texts, InstructionType::Query).await?;
        if embeddings.len() != queries.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                queries.len(),
                embeddings.len()
            ))
            .into());
        }

        let queries = queries
            .into_iter()
            .zip(embeddings)
            .map(|(query, embedding)| query.with_embedding(embedding))
            .collect();

        let results = self.index_store.query(queries).await?;
        tracing::debug!(queries = results.len(), "query complete");
        Ok(results)
    }

    /// Delete from the index and, when ids are given, from the blob store.
    ///
    /// Returns the index result only: a blob delete failure still yields
    /// `true`. Use [`Self::delete_with_report`] to see blob outcomes.
    pub async fn delete(&self, request: &DeleteRequest) -> Result<bool, HybridError> {
        self.delete_with_report(request)
            .await
            .map(|report| report.index_deleted)
    }

    pub async fn delete_with_report(
        &self,
        request: &DeleteRequest,
    ) -> Result<DeleteReport, HybridError> {
        let selector = request.selector().ok_or_else(|| {
            HybridError::InvalidRequest("one of ids, filter or delete_all must be set".to_string())
        })?;

        let index_result = self.index_store.delete(selector).await;

        let blob = match &request.ids {
            Some(ids) => self.delete_blobs(ids).await,
            None => Vec::new(),
        };

        let index_deleted = index_result?;
        let report = DeleteReport { index_deleted, blob };
        tracing::info!(
            index_deleted,
            blobs = report.blob.len(),
            blob_failures = report.blob_failures().count(),
            "delete complete"
        );
        Ok(report)
    }

    async fn delete_blobs(&self, ids: &[String]) -> Vec<BlobOutcome> {
        stream::iter(ids)
            .map(|id| async move {
                match self.blob_store.delete(&self.bucket, id).await {
                    Ok(()) => BlobOutcome::new(id.as_str(), BlobStatus::Deleted),
                    Err(e) => {
                        tracing::warn!(document_id = %id, error = %e, "blob delete failed");
                        BlobOutcome::new(id.as_str(), BlobStatus::Failed { error: e.to_string() })
                    }
                }
            })
            .buffered(self.upload_concurrency)
            .collect()
            .await
    }

    /// Provision the index class describing the objects of a bucket.
    /// Returns `false` when the class already existed.
    pub async fn create_schema_from_bucket(&self, bucket_name: &str) -> Result<bool, HybridError> {
        let schema = ClassSchema::for_bucket(bucket_name);
        schema.validate().map_err(HybridError::InvalidSchema)?;

        let created = self.index_store.create_class(&schema).await?;
        tracing::info!(bucket = bucket_name, class = %schema.name, created, "schema provisioned");
        Ok(created)
    }

    /// Index every object of a bucket, one document per object.
    ///
    /// Objects are indexed by their listing metadata only; their contents are
    /// not chunked. A failed listing ingests nothing.
    pub async fn batch_ingest_from_bucket(
        &self,
        bucket_name: &str,
    ) -> Result<Vec<String>, HybridError> {
        let objects = self.blob_store.list(bucket_name).await;
        if objects.is_empty() {
            tracing::info!(bucket = bucket_name, "bucket is empty, nothing to ingest");
            return Ok(Vec::new());
        }

        let documents: Vec<Document> = objects.iter().map(Document::from_bucket_object).collect();
        tracing::info!(bucket = bucket_name, count = documents.len(), "ingesting bucket");
        self.upsert(&documents, None).await
    }

    /// Copy a stored object from the configured bucket to a local path.
    pub async fn download(&self, id: &str, destination: &Path) -> Result<u64, HybridError> {
        Ok(self.blob_store.download(&self.bucket, id, destination).await?)
    }
}

/// Keep the last document for each id, in the order those survivors appear.
fn last_per_id(documents: Vec<Document>) -> Vec<Document> {
    let total = documents.len();
    let mut seen = HashSet::new();
    let mut kept: Vec<Document> = documents
        .into_iter()
        .rev()
        .filter(|d| seen.insert(d.id.clone()))
        .collect();
    kept.reverse();

    if kept.len() < total {
        tracing::warn!(
            dropped = total - kept.len(),
            "duplicate document ids in one upsert, keeping the last of each"
        );
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BlobCause, BlobOperation, BlobStoreError};
    use crate::models::{
        BlobSource, BlobStoreConfig, BucketObject, ChunkingConfig, DocumentMetadata,
        DocumentMetadataFilter, Source,
    };
    use crate::services::blob_store::ObjectStoreBackend;
    use crate::services::index_store::InMemoryIndex;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DIM: usize = 8;
    const BUCKET: &str = "test-bucket";

    /// Deterministic bag-of-bytes embedder.
    #[derive(Default)]
    struct HashEmbedder {
        calls: AtomicUsize,
    }

    fn hash_embedding(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; DIM];
        vector[0] = 1.0;
        for (i, byte) in text.bytes().enumerate() {
            vector[(i + byte as usize) % DIM] += f32::from(byte) / 255.0;
        }
        vector
    }

    #[async_trait]
    impl Embedder for HashEmbedder {
        async fn embed(
            &self,
            texts: Vec<String>,
            _instruction_type: InstructionType,
        ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| hash_embedding(t)).collect())
        }

        async fn health_check(&self) -> Result<bool, EmbeddingError> {
            Ok(true)
        }

        fn dimension(&self) -> usize {
            DIM
        }
    }

    struct DownEmbedder;

    #[async_trait]
    impl Embedder for DownEmbedder {
        async fn embed(
            &self,
            _texts: Vec<String>,
            _instruction_type: InstructionType,
        ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::ConnectionError("connection refused".into()))
        }

        async fn health_check(&self) -> Result<bool, EmbeddingError> {
            Ok(false)
        }

        fn dimension(&self) -> usize {
            DIM
        }
    }

    /// Memory blob store that can be told to fail specific operations.
    struct FaultyBlobStore {
        inner: ObjectStoreBackend,
        failing_uploads: HashSet<String>,
        fail_deletes: bool,
        listing: Option<Vec<BucketObject>>,
    }

    impl FaultyBlobStore {
        async fn new() -> Self {
            Self {
                inner: ObjectStoreBackend::new(&BlobStoreConfig::memory(BUCKET))
                    .await
                    .unwrap(),
                failing_uploads: HashSet::new(),
                fail_deletes: false,
                listing: None,
            }
        }

        fn denied(operation: BlobOperation, bucket: &str, id: &str) -> BlobStoreError {
            BlobStoreError::new(operation, bucket, id, BlobCause::Provider("access denied".into()))
        }
    }

    #[async_trait]
    impl BlobStore for FaultyBlobStore {
        async fn upload(
            &self,
            bucket: &str,
            id: &str,
            source: &BlobSource,
        ) -> Result<u64, BlobStoreError> {
            if self.failing_uploads.contains(id) {
                return Err(Self::denied(BlobOperation::Upload, bucket, id));
            }
            self.inner.upload(bucket, id, source).await
        }

        async fn download(
            &self,
            bucket: &str,
            id: &str,
            destination: &Path,
        ) -> Result<u64, BlobStoreError> {
            self.inner.download(bucket, id, destination).await
        }

        async fn get(&self, bucket: &str, id: &str) -> Result<Bytes, BlobStoreError> {
            self.inner.get(bucket, id).await
        }

        async fn delete(&self, bucket: &str, id: &str) -> Result<(), BlobStoreError> {
            if self.fail_deletes {
                return Err(Self::denied(BlobOperation::Delete, bucket, id));
            }
            self.inner.delete(bucket, id).await
        }

        async fn list(&self, bucket: &str) -> Vec<BucketObject> {
            match &self.listing {
                Some(listing) => listing.clone(),
                None => self.inner.list(bucket).await,
            }
        }

        async fn health_check(&self) -> Result<bool, BlobStoreError> {
            self.inner.health_check().await
        }

        fn default_bucket(&self) -> &str {
            self.inner.default_bucket()
        }
    }

    struct Harness {
        store: HybridDataStore,
        blobs: Arc<FaultyBlobStore>,
        index: Arc<InMemoryIndex>,
        embedder: Arc<HashEmbedder>,
    }

    async fn harness_with(blobs: FaultyBlobStore) -> Harness {
        let blobs = Arc::new(blobs);
        let index = Arc::new(InMemoryIndex::new("documents", DIM));
        let embedder = Arc::new(HashEmbedder::default());
        let chunker = TextChunker::new(&ChunkingConfig {
            chunk_token_size: 200,
            chars_per_token: 1,
            chunk_overlap: 0,
        });
        let store = HybridDataStore::new(
            blobs.clone(),
            index.clone(),
            embedder.clone(),
            chunker,
            BUCKET,
        );
        Harness {
            store,
            blobs,
            index,
            embedder,
        }
    }

    async fn harness() -> Harness {
        harness_with(FaultyBlobStore::new().await).await
    }

    #[tokio::test]
    async fn test_upsert_then_query_single_chunk() {
        let h = harness().await;
        let ids = h
            .store
            .upsert(&[Document::new("doc1", "hello world")], Some(100))
            .await
            .unwrap();
        assert_eq!(ids, ["doc1"]);

        let results = h
            .store
            .query(vec![Query::new("hello").with_top_k(1)])
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].results.len(), 1);
        assert_eq!(results[0].results[0].id, "doc1_0");
        assert_eq!(results[0].results[0].metadata.document_id, "doc1");

        let stored = h.blobs.get(BUCKET, "doc1").await.unwrap();
        assert_eq!(&stored[..], b"hello world");
    }

    #[tokio::test]
    async fn test_upsert_chunks_and_embeds_in_one_call() {
        let h = harness().await;
        let text = "x".repeat(25);
        h.store
            .upsert(&[Document::new("a", text), Document::new("b", "short")], Some(10))
            .await
            .unwrap();

        assert_eq!(h.index.chunk_ids("a").await, ["a_0", "a_1", "a_2"]);
        assert_eq!(h.index.chunk_ids("b").await, ["b_0"]);
        assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let h = harness().await;
        let doc = Document::new("doc1", "a".repeat(450));

        h.store.upsert(&[doc.clone()], None).await.unwrap();
        h.store.upsert(&[doc], None).await.unwrap();

        assert_eq!(h.index.chunk_ids("doc1").await, ["doc1_0", "doc1_1", "doc1_2"]);
        assert_eq!(h.index.len().await, 3);
        assert_eq!(h.blobs.list(BUCKET).await.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_generates_missing_ids() {
        let h = harness().await;
        let doc = Document {
            text: "anonymous".to_string(),
            ..Default::default()
        };

        let ids = h.store.upsert(&[doc.clone()], None).await.unwrap();
        assert_eq!(ids.len(), 1);
        assert!(uuid::Uuid::parse_str(&ids[0]).is_ok());
        assert!(doc.id.is_none());
        assert!(h.blobs.get(BUCKET, &ids[0]).await.is_ok());
    }

    #[tokio::test]
    async fn test_blob_failure_does_not_block_indexing() {
        let mut blobs = FaultyBlobStore::new().await;
        blobs.failing_uploads.insert("bad".to_string());
        let h = harness_with(blobs).await;

        let report = h
            .store
            .upsert_with_report(
                &[Document::new("good", "fine"), Document::new("bad", "also fine")],
                None,
            )
            .await
            .unwrap();

        assert_eq!(report.indexed_ids, ["good", "bad"]);
        assert_eq!(report.fully_stored_ids(), ["good"]);
        let failures: Vec<&str> = report.blob_failures().map(|o| o.id.as_str()).collect();
        assert_eq!(failures, ["bad"]);
        assert_eq!(h.index.chunk_ids("bad").await, ["bad_0"]);
    }

    #[tokio::test]
    async fn test_blob_payload_resolution() {
        let h = harness().await;
        let report = h
            .store
            .upsert_with_report(
                &[
                    Document::new("inline", "indexed text").with_content(Bytes::from_static(b"raw")),
                    Document::new("empty", ""),
                ],
                None,
            )
            .await
            .unwrap();

        assert_eq!(report.blob[0].status, BlobStatus::Stored { bytes: 3 });
        assert!(matches!(report.blob[1].status, BlobStatus::Skipped { .. }));
        assert_eq!(&h.blobs.get(BUCKET, "inline").await.unwrap()[..], b"raw");
        assert_eq!(report.indexed_ids, ["inline", "empty"]);
    }

    #[tokio::test]
    async fn test_embedding_unavailable_is_fatal() {
        let blobs = Arc::new(FaultyBlobStore::new().await);
        let index = Arc::new(InMemoryIndex::new("documents", DIM));
        let store = HybridDataStore::new(
            blobs,
            index.clone(),
            Arc::new(DownEmbedder),
            TextChunker::with_defaults(),
            BUCKET,
        );

        let err = store
            .upsert(&[Document::new("doc1", "text")], None)
            .await
            .unwrap_err();
        assert!(matches!(err, HybridError::EmbeddingUnavailable(_)));
        assert!(index.is_empty().await);

        let err = store.query(vec![Query::new("text")]).await.unwrap_err();
        assert!(matches!(err, HybridError::EmbeddingUnavailable(_)));
    }

    #[tokio::test]
    async fn test_query_preserves_input_order() {
        let h = harness().await;
        h.store
            .upsert(
                &[
                    Document::new("zebra", "zzzzzzzzzzzz"),
                    Document::new("apple", "apple pie"),
                ],
                None,
            )
            .await
            .unwrap();

        let results = h
            .store
            .query(vec![Query::new("zzzzzzzzzzzz"), Query::new("apple pie")])
            .await
            .unwrap();

        assert_eq!(results[0].query, "zzzzzzzzzzzz");
        assert_eq!(results[1].query, "apple pie");
        assert_eq!(results[0].results[0].metadata.document_id, "zebra");
        assert_eq!(results[1].results[0].metadata.document_id, "apple");
    }

    #[tokio::test]
    async fn test_query_filter_matching_nothing_is_empty() {
        let h = harness().await;
        let metadata = DocumentMetadata {
            source: Some(Source::Email),
            ..Default::default()
        };
        h.store
            .upsert(&[Document::new("doc1", "hello").with_metadata(metadata)], None)
            .await
            .unwrap();

        let filter = DocumentMetadataFilter {
            source: Some(Source::Chat),
            ..Default::default()
        };
        let results = h
            .store
            .query(vec![Query::new("hello").with_filter(filter)])
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].results.is_empty());
    }

    #[tokio::test]
    async fn test_query_rejects_zero_top_k() {
        let h = harness().await;
        let err = h
            .store
            .query(vec![Query::new("hello").with_top_k(0)])
            .await
            .unwrap_err();
        assert!(matches!(err, HybridError::InvalidQuery(_)));
        assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_delete_by_ids_removes_both_sides() {
        let h = harness().await;
        h.store
            .upsert(&[Document::new("doc1", "hello"), Document::new("doc2", "bye")], None)
            .await
            .unwrap();

        let report = h
            .store
            .delete_with_report(&DeleteRequest::ids(["doc1"]))
            .await
            .unwrap();

        assert!(report.fully_deleted());
        assert!(h.index.chunk_ids("doc1").await.is_empty());
        assert_eq!(h.index.chunk_ids("doc2").await, ["doc2_0"]);
        assert!(h.blobs.get(BUCKET, "doc1").await.unwrap_err().is_not_found());
    }

    // Known gap: the boolean reflects only the index delete.
    #[tokio::test]
    async fn test_delete_returns_true_when_blob_delete_fails() {
        let mut blobs = FaultyBlobStore::new().await;
        blobs.fail_deletes = true;
        let h = harness_with(blobs).await;
        h.store
            .upsert(&[Document::new("doc1", "hello")], None)
            .await
            .unwrap();

        let deleted = h.store.delete(&DeleteRequest::ids(["doc1"])).await.unwrap();

        assert!(deleted);
        assert!(h.index.chunk_ids("doc1").await.is_empty());
        assert_eq!(&h.blobs.get(BUCKET, "doc1").await.unwrap()[..], b"hello");

        let report = h
            .store
            .delete_with_report(&DeleteRequest::ids(["doc1"]))
            .await
            .unwrap();
        assert!(report.index_deleted);
        assert!(!report.fully_deleted());
    }

    #[tokio::test]
    async fn test_delete_selector_precedence() {
        let h = harness().await;
        h.store
            .upsert(&[Document::new("doc1", "one"), Document::new("doc2", "two")], None)
            .await
            .unwrap();

        let request = DeleteRequest {
            ids: Some(vec!["doc1".to_string()]),
            delete_all: true,
            ..Default::default()
        };
        assert!(h.store.delete(&request).await.unwrap());
        assert!(h.index.is_empty().await);
        // ids still drive blob deletion
        assert!(h.blobs.get(BUCKET, "doc1").await.is_err());
        assert!(h.blobs.get(BUCKET, "doc2").await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_by_filter() {
        let h = harness().await;
        let alice = DocumentMetadata {
            author: Some("alice".into()),
            ..Default::default()
        };
        h.store
            .upsert(
                &[
                    Document::new("doc1", "one").with_metadata(alice),
                    Document::new("doc2", "two"),
                ],
                None,
            )
            .await
            .unwrap();

        let filter = DocumentMetadataFilter {
            author: Some("alice".into()),
            ..Default::default()
        };
        let report = h
            .store
            .delete_with_report(&DeleteRequest::filter(filter))
            .await
            .unwrap();

        assert!(report.index_deleted);
        assert!(report.blob.is_empty());
        assert!(h.index.chunk_ids("doc1").await.is_empty());
        assert_eq!(h.index.chunk_ids("doc2").await, ["doc2_0"]);
    }

    #[tokio::test]
    async fn test_delete_without_selector_is_invalid() {
        let h = harness().await;
        let err = h.store.delete(&DeleteRequest::default()).await.unwrap_err();
        assert!(matches!(err, HybridError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_batch_ingest_from_bucket() {
        let mut blobs = FaultyBlobStore::new().await;
        blobs.listing = Some(vec![BucketObject::new("b1", "sample.txt", 1024)]);
        let h = harness_with(blobs).await;

        let ids = h.store.batch_ingest_from_bucket("b1").await.unwrap();

        assert!(ids.contains(&"sample.txt".to_string()));
        // Empty text yields no chunks and no embedding request
        assert!(h.index.is_empty().await);
        assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_batch_ingest_does_not_reupload_objects() {
        let h = harness().await;
        h.blobs
            .upload("b1", "a.md", &BlobSource::Bytes(Bytes::from_static(b"# a")))
            .await
            .unwrap();

        let report = h
            .store
            .upsert_with_report(
                &h.blobs
                    .list("b1")
                    .await
                    .iter()
                    .map(Document::from_bucket_object)
                    .collect::<Vec<_>>(),
                None,
            )
            .await
            .unwrap();

        assert_eq!(report.indexed_ids, ["a.md"]);
        assert_eq!(report.blob[0].status, BlobStatus::Resident);
        assert!(h.blobs.list(BUCKET).await.is_empty());
    }

    #[tokio::test]
    async fn test_batch_ingest_keeps_indexed_chunks() {
        let h = harness().await;
        h.store
            .upsert(&[Document::new("doc1", "hello world")], None)
            .await
            .unwrap();

        let ids = h.store.batch_ingest_from_bucket(BUCKET).await.unwrap();

        assert_eq!(ids, ["doc1"]);
        assert_eq!(h.index.chunk_ids("doc1").await, ["doc1_0"]);
        let results = h.store.query(vec![Query::new("hello world")]).await.unwrap();
        assert_eq!(results[0].results.len(), 1);
        assert_eq!(results[0].results[0].text, "hello world");
    }

    #[tokio::test]
    async fn test_duplicate_ids_last_document_wins() {
        let h = harness().await;
        let report = h
            .store
            .upsert_with_report(
                &[Document::new("d", "x".repeat(450)), Document::new("d", "short")],
                None,
            )
            .await
            .unwrap();

        assert_eq!(report.indexed_ids, ["d"]);
        assert_eq!(report.blob.len(), 1);
        assert_eq!(h.index.chunk_ids("d").await, ["d_0"]);
        assert_eq!(&h.blobs.get(BUCKET, "d").await.unwrap()[..], b"short");

        let results = h.store.query(vec![Query::new("short")]).await.unwrap();
        assert_eq!(results[0].results[0].text, "short");
    }

    #[tokio::test]
    async fn test_batch_ingest_empty_bucket() {
        let h = harness().await;
        assert!(h.store.batch_ingest_from_bucket("nothing-here").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_schema_from_bucket() {
        let h = harness().await;
        assert!(h.store.create_schema_from_bucket("my-bucket").await.unwrap());
        assert!(!h.store.create_schema_from_bucket("my-bucket").await.unwrap());

        let schema = h.index.class("my_bucket").await.unwrap();
        let fields: Vec<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(fields, ["path", "object_name", "type", "size"]);
    }

    #[tokio::test]
    async fn test_create_schema_rejects_unusable_bucket_name() {
        let h = harness().await;
        let err = h.store.create_schema_from_bucket("").await.unwrap_err();
        assert!(matches!(err, HybridError::InvalidSchema(_)));
    }

    #[tokio::test]
    async fn test_download() {
        let h = harness().await;
        h.store
            .upsert(&[Document::new("doc1", "payload")], None)
            .await
            .unwrap();

        let dir = tempfile::TempDir::new().unwrap();
        let destination = dir.path().join("doc1.txt");
        let written = h.store.download("doc1", &destination).await.unwrap();

        assert_eq!(written, 7);
        assert_eq!(std::fs::read_to_string(destination).unwrap(), "payload");

        let err = h
            .store
            .download("missing", &dir.path().join("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, HybridError::BlobStore(e) if e.is_not_found()));
    }

    #[tokio::test]
    async fn test_from_config_with_memory_drivers() {
        let mut config = Config::default();
        config.blob_store = BlobStoreConfig::memory("cfg-bucket");
        config.index_store = crate::models::IndexStoreConfig::memory("chunks");

        let store = HybridDataStore::from_config(&config).await.unwrap();
        assert_eq!(store.bucket(), "cfg-bucket");
        assert_eq!(store.index_store().class_name(), "chunks");
        assert!(store.blob_store().health_check().await.unwrap());
    }
}
