//! Error types for the hybrid document store.

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Blob store operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobOperation {
    Upload,
    Download,
    Get,
    Delete,
    List,
    Connect,
}

impl std::fmt::Display for BlobOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BlobOperation::Upload => "upload",
            BlobOperation::Download => "download",
            BlobOperation::Get => "get",
            BlobOperation::Delete => "delete",
            BlobOperation::List => "list",
            BlobOperation::Connect => "connect",
        };
        f.write_str(name)
    }
}

/// Cause of a blob store failure.
#[derive(Debug, Error)]
pub enum BlobCause {
    #[error("object not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Provider(String),
}

impl From<object_store::Error> for BlobCause {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { .. } => BlobCause::NotFound,
            other => BlobCause::Provider(other.to_string()),
        }
    }
}

/// Errors raised by the blob store adapter.
#[derive(Debug, Error)]
#[error("blob store {operation} failed for {bucket}/{id}: {cause}")]
pub struct BlobStoreError {
    pub operation: BlobOperation,
    pub bucket: String,
    pub id: String,
    #[source]
    pub cause: BlobCause,
}

impl BlobStoreError {
    pub fn new(
        operation: BlobOperation,
        bucket: impl Into<String>,
        id: impl Into<String>,
        cause: impl Into<BlobCause>,
    ) -> Self {
        Self {
            operation,
            bucket: bucket.into(),
            id: id.into(),
            cause: cause.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.cause, BlobCause::NotFound)
    }
}

impl Retryable for BlobStoreError {
    fn is_retryable(&self) -> bool {
        match &self.cause {
            BlobCause::Connection(_) => true,
            BlobCause::Provider(msg) => is_transient_provider_message(msg),
            BlobCause::NotFound | BlobCause::Io(_) => false,
        }
    }
}

impl Retryable for object_store::Error {
    fn is_retryable(&self) -> bool {
        match self {
            object_store::Error::NotFound { .. }
            | object_store::Error::AlreadyExists { .. }
            | object_store::Error::Precondition { .. }
            | object_store::Error::NotImplemented => false,
            other => is_transient_provider_message(&other.to_string()),
        }
    }
}

fn is_transient_provider_message(msg: &str) -> bool {
    let msg = msg.to_lowercase();
    msg.contains("timeout")
        || msg.contains("timed out")
        || msg.contains("connection")
        || msg.contains("503")
        || msg.contains("slow down")
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to connect to embedding provider: {0}")]
    ConnectionError(String),

    #[error("embedding provider error: {0}")]
    ServerError(String),

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("input {index} exceeds the provider limit ({len} > {limit} characters)")]
    InputTooLong {
        index: usize,
        len: usize,
        limit: usize,
    },

    #[error("embedding timeout")]
    Timeout,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::ConnectionError(_) | EmbeddingError::Timeout => true,
            // 5xx and rate limiting are usually transient
            EmbeddingError::ServerError(msg) => {
                msg.contains("503")
                    || msg.contains("502")
                    || msg.contains("504")
                    || msg.contains("429")
                    || msg.to_lowercase().contains("unavailable")
                    || msg.to_lowercase().contains("too many requests")
            }
            EmbeddingError::RequestError(e) => e.is_timeout() || e.is_connect(),
            EmbeddingError::InvalidResponse(_) | EmbeddingError::InputTooLong { .. } => false,
        }
    }
}

/// Errors related to index store operations.
#[derive(Debug, Error)]
pub enum IndexStoreError {
    #[error("failed to connect to index store: {0}")]
    ConnectionError(String),

    #[error("class error: {0}")]
    ClassError(String),

    #[error("upsert error: {0}")]
    UpsertError(String),

    #[error("query error: {0}")]
    QueryError(String),

    #[error("delete error: {0}")]
    DeleteError(String),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("PostgreSQL error: {0}")]
    PostgresError(String),

    #[error("pgvector extension error: {0}")]
    PgVectorExtensionError(String),
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Errors surfaced by the hybrid coordinator.
///
/// Blob-side failures never appear here; they are isolated per document and
/// reported through [`crate::models::UpsertReport`] and
/// [`crate::models::DeleteReport`].
#[derive(Debug, Error)]
pub enum HybridError {
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(#[from] EmbeddingError),

    #[error("index store error: {0}")]
    IndexStore(#[from] IndexStoreError),

    #[error("blob store error: {0}")]
    BlobStore(#[from] BlobStoreError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid delete request: {0}")]
    InvalidRequest(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_error_display() {
        let err = BlobStoreError::new(BlobOperation::Delete, "docs", "doc1", BlobCause::NotFound);
        assert_eq!(
            err.to_string(),
            "blob store delete failed for docs/doc1: object not found"
        );
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_blob_error_retryable() {
        let err = BlobStoreError::new(
            BlobOperation::Upload,
            "docs",
            "doc1",
            BlobCause::Connection("refused".to_string()),
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn test_embedding_error_retryable() {
        assert!(EmbeddingError::Timeout.is_retryable());
        assert!(EmbeddingError::ServerError("status 503: busy".to_string()).is_retryable());
        assert!(!EmbeddingError::ServerError("status 400: bad".to_string()).is_retryable());
        assert!(
            !EmbeddingError::InputTooLong {
                index: 0,
                len: 10,
                limit: 5
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_hybrid_error_from_embedding() {
        let err: HybridError = EmbeddingError::Timeout.into();
        assert!(matches!(err, HybridError::EmbeddingUnavailable(_)));
        assert_eq!(err.to_string(), "embedding unavailable: embedding timeout");
    }
}
