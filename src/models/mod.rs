mod bucket;
mod config;
mod document;
mod outcome;
mod schema;
mod search;
mod source;

pub use bucket::BucketObject;
pub use config::{
    BlobDriver, BlobStoreConfig, ChunkingConfig, Config, DEFAULT_BUCKET, DEFAULT_CHUNK_TOKEN_SIZE,
    DEFAULT_CLASS, DEFAULT_EMBEDDING_DIMENSION, DEFAULT_EMBEDDING_URL, DEFAULT_QDRANT_URL,
    EmbeddingConfig, EmbeddingProtocol, IndexDriver, IndexStoreConfig,
};
pub use document::{
    BlobSource, ChunkBatch, Document, DocumentChunk, DocumentChunkMetadata, DocumentMetadata,
};
pub use outcome::{BlobOutcome, BlobStatus, DeleteReport, UpsertReport};
pub use schema::{ClassSchema, FieldKind, SchemaField, class_name_for_bucket, validate_identifier};
pub use search::{
    DEFAULT_TOP_K, DateRange, DeleteRequest, DeleteSelector, DocumentChunkWithScore,
    DocumentMetadataFilter, OutputFormat, Query, QueryResult, QueryWithEmbedding, parse_timestamp,
    sort_by_score,
};
pub use source::Source;
