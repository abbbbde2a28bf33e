//! Qdrant index store backend implementation.

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, DeletePointsBuilder,
    Distance, FieldType, Filter, PointStruct, Range, SearchPointsBuilder, UpsertPointsBuilder,
    Value, VectorParamsBuilder,
};
use std::collections::HashMap;
use tokio::sync::OnceCell;

use super::{
    IndexStore, batch_document_ids, check_embeddings, created_at_timestamp, resolve_date_range,
};
use crate::error::IndexStoreError;
use crate::models::{
    ChunkBatch, ClassSchema, DeleteSelector, DocumentChunk, DocumentChunkMetadata,
    DocumentChunkWithScore, DocumentMetadata, DocumentMetadataFilter, FieldKind, IndexStoreConfig,
    QueryResult, QueryWithEmbedding,
};

type Payload = HashMap<String, Value>;

/// Qdrant index store backend.
pub struct QdrantBackend {
    client: Qdrant,
    collection: String,
    dimension: u64,
    chunk_collection_ready: OnceCell<()>,
}

impl QdrantBackend {
    pub fn new(config: &IndexStoreConfig, dimension: u64) -> Result<Self, IndexStoreError> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| IndexStoreError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            collection: config.class_name.clone(),
            dimension,
            chunk_collection_ready: OnceCell::new(),
        })
    }

    /// Create a collection with the given keyword/integer payload indexes.
    /// Returns `false` when the collection already exists.
    async fn create_collection(
        &self,
        name: &str,
        indexed_fields: &[(&str, FieldType)],
    ) -> Result<bool, IndexStoreError> {
        let exists = self
            .client
            .collection_exists(name)
            .await
            .map_err(|e| IndexStoreError::ClassError(e.to_string()))?;
        if exists {
            return Ok(false);
        }

        let create_collection = CreateCollectionBuilder::new(name)
            .vectors_config(VectorParamsBuilder::new(self.dimension, Distance::Cosine));
        self.client
            .create_collection(create_collection)
            .await
            .map_err(|e| IndexStoreError::ClassError(e.to_string()))?;

        for (field, field_type) in indexed_fields {
            self.client
                .create_field_index(CreateFieldIndexCollectionBuilder::new(
                    name,
                    *field,
                    *field_type,
                ))
                .await
                .map_err(|e| IndexStoreError::ClassError(e.to_string()))?;
        }

        tracing::info!(collection = name, "created qdrant collection");
        Ok(true)
    }

    async fn create_chunk_collection(&self) -> Result<bool, IndexStoreError> {
        self.create_collection(
            &self.collection,
            &[
                ("document_id", FieldType::Keyword),
                ("created_at_ts", FieldType::Integer),
            ],
        )
        .await
    }

    async fn ensure_chunk_collection(&self) -> Result<(), IndexStoreError> {
        self.chunk_collection_ready
            .get_or_try_init(|| async { self.create_chunk_collection().await.map(|_| ()) })
            .await
            .map(|_| ())
    }

    async fn delete_points(&self, filter: Filter) -> Result<(), IndexStoreError> {
        let delete = DeletePointsBuilder::new(&self.collection)
            .points(filter)
            .wait(true);

        self.client
            .delete_points(delete)
            .await
            .map_err(|e| IndexStoreError::DeleteError(e.to_string()))?;

        Ok(())
    }

    fn document_ids_filter(document_ids: &[String]) -> Filter {
        let conditions: Vec<Condition> = document_ids
            .iter()
            .map(|id| Condition::matches("document_id", id.clone()))
            .collect();
        Filter::should(conditions)
    }

    /// Translate a metadata filter. `None` when no field is set.
    fn build_filter(filter: &DocumentMetadataFilter) -> Result<Option<Filter>, IndexStoreError> {
        let range = resolve_date_range(filter)?;
        let mut must_conditions: Vec<Condition> = Vec::new();

        let equalities = [
            ("document_id", filter.document_id.clone()),
            ("source", filter.source.as_ref().map(ToString::to_string)),
            ("source_id", filter.source_id.clone()),
            ("author", filter.author.clone()),
        ];
        for (field, value) in equalities {
            if let Some(value) = value {
                must_conditions.push(Condition::matches(field, value));
            }
        }

        if !range.is_empty() {
            must_conditions.push(Condition::range(
                "created_at_ts",
                Range {
                    gte: range.start.map(|ts| ts as f64),
                    lte: range.end.map(|ts| ts as f64),
                    ..Default::default()
                },
            ));
        }

        if must_conditions.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Filter::must(must_conditions)))
        }
    }

    fn chunk_payload(chunk: DocumentChunk) -> (String, Vec<f32>, Payload) {
        let point_id = chunk.point_id();
        let timestamp = created_at_timestamp(&chunk.metadata);
        let DocumentChunk {
            id,
            text,
            metadata,
            embedding,
        } = chunk;
        let DocumentChunkMetadata {
            document_id,
            chunk_index,
            document,
        } = metadata;

        let mut payload: Payload = HashMap::new();
        payload.insert("chunk_id".to_string(), id.into());
        payload.insert("document_id".to_string(), document_id.into());
        payload.insert("chunk_index".to_string(), i64::from(chunk_index).into());
        payload.insert("text".to_string(), text.into());

        let optional_strings = [
            ("source", document.source.map(|s| s.to_string())),
            ("source_id", document.source_id),
            ("url", document.url),
            ("created_at", document.created_at),
            ("author", document.author),
            ("path", document.path),
            ("object_name", document.object_name),
            ("type", document.object_type),
        ];
        for (key, value) in optional_strings {
            if let Some(value) = value {
                payload.insert(key.to_string(), value.into());
            }
        }
        if let Some(size) = document.size {
            payload.insert("size".to_string(), (size as i64).into());
        }
        if let Some(ts) = timestamp {
            payload.insert("created_at_ts".to_string(), ts.into());
        }

        (point_id, embedding, payload)
    }

    fn chunk_from_payload(payload: &Payload, score: f32) -> DocumentChunkWithScore {
        let metadata = DocumentChunkMetadata {
            document_id: payload_string(payload, "document_id").unwrap_or_default(),
            chunk_index: payload_int(payload, "chunk_index").unwrap_or(0) as u32,
            document: DocumentMetadata {
                source: payload_string(payload, "source").and_then(|s| s.parse().ok()),
                source_id: payload_string(payload, "source_id"),
                url: payload_string(payload, "url"),
                created_at: payload_string(payload, "created_at"),
                author: payload_string(payload, "author"),
                path: payload_string(payload, "path"),
                object_name: payload_string(payload, "object_name"),
                object_type: payload_string(payload, "type"),
                size: payload_int(payload, "size").map(|n| n as u64),
            },
        };

        DocumentChunkWithScore {
            id: payload_string(payload, "chunk_id").unwrap_or_default(),
            text: payload_string(payload, "text").unwrap_or_default(),
            metadata,
            score,
        }
    }
}

fn payload_string(payload: &Payload, key: &str) -> Option<String> {
    match payload.get(key)?.kind.as_ref()? {
        Kind::StringValue(s) => Some(s.clone()),
        _ => None,
    }
}

fn payload_int(payload: &Payload, key: &str) -> Option<i64> {
    match payload.get(key)?.kind.as_ref()? {
        Kind::IntegerValue(n) => Some(*n),
        Kind::DoubleValue(d) => Some(*d as i64),
        _ => None,
    }
}

fn field_type(kind: FieldKind) -> FieldType {
    match kind {
        FieldKind::String => FieldType::Keyword,
        FieldKind::Int => FieldType::Integer,
    }
}

#[async_trait]
impl IndexStore for QdrantBackend {
    async fn health_check(&self) -> Result<bool, IndexStoreError> {
        self.client
            .health_check()
            .await
            .map(|_| true)
            .map_err(|e| IndexStoreError::ConnectionError(e.to_string()))
    }

    async fn create_class(&self, schema: &ClassSchema) -> Result<bool, IndexStoreError> {
        let indexed_fields: Vec<(&str, FieldType)> = schema
            .fields
            .iter()
            .map(|f| (f.name.as_str(), field_type(f.kind)))
            .collect();
        self.create_collection(&schema.name, &indexed_fields).await
    }

    async fn upsert(&self, batches: Vec<ChunkBatch>) -> Result<Vec<String>, IndexStoreError> {
        check_embeddings(&batches, self.dimension as usize)?;
        let document_ids = batch_document_ids(&batches);
        if document_ids.is_empty() {
            return Ok(document_ids);
        }

        self.ensure_chunk_collection().await?;
        self.delete_points(Self::document_ids_filter(&document_ids))
            .await
            .map_err(|e| IndexStoreError::UpsertError(e.to_string()))?;

        let points: Vec<PointStruct> = batches
            .into_iter()
            .flat_map(|b| b.chunks)
            .map(|chunk| {
                let (point_id, vector, payload) = Self::chunk_payload(chunk);
                PointStruct::new(point_id, vector, payload)
            })
            .collect();

        if !points.is_empty() {
            let count = points.len();
            let upsert = UpsertPointsBuilder::new(&self.collection, points).wait(true);
            self.client
                .upsert_points(upsert)
                .await
                .map_err(|e| IndexStoreError::UpsertError(e.to_string()))?;
            tracing::debug!(collection = %self.collection, count, "upserted points");
        }

        Ok(document_ids)
    }

    async fn query(
        &self,
        queries: Vec<QueryWithEmbedding>,
    ) -> Result<Vec<QueryResult>, IndexStoreError> {
        self.ensure_chunk_collection().await?;
        let mut results = Vec::with_capacity(queries.len());

        for QueryWithEmbedding { query, embedding } in queries {
            let filter = match &query.filter {
                Some(filter) => Self::build_filter(filter)?,
                None => None,
            };

            let mut search_builder =
                SearchPointsBuilder::new(&self.collection, embedding, u64::from(query.top_k))
                    .with_payload(true);
            if let Some(f) = filter {
                search_builder = search_builder.filter(f);
            }

            let response = self
                .client
                .search_points(search_builder)
                .await
                .map_err(|e| IndexStoreError::QueryError(e.to_string()))?;

            let matches = response
                .result
                .iter()
                .map(|point| Self::chunk_from_payload(&point.payload, point.score))
                .collect();
            results.push(QueryResult::new(query.query, matches));
        }

        Ok(results)
    }

    async fn delete(&self, selector: DeleteSelector) -> Result<bool, IndexStoreError> {
        match selector {
            DeleteSelector::All => {
                let exists = self
                    .client
                    .collection_exists(&self.collection)
                    .await
                    .map_err(|e| IndexStoreError::DeleteError(e.to_string()))?;
                if exists {
                    self.client
                        .delete_collection(&self.collection)
                        .await
                        .map_err(|e| IndexStoreError::DeleteError(e.to_string()))?;
                }
                self.create_chunk_collection().await?;
            }
            DeleteSelector::Filter(filter) => {
                if let Some(filter) = Self::build_filter(&filter)? {
                    self.ensure_chunk_collection().await?;
                    self.delete_points(filter).await?;
                }
            }
            DeleteSelector::Ids(ids) => {
                if !ids.is_empty() {
                    self.ensure_chunk_collection().await?;
                    self.delete_points(Self::document_ids_filter(&ids)).await?;
                }
            }
        }
        Ok(true)
    }

    fn class_name(&self) -> &str {
        &self.collection
    }
}
