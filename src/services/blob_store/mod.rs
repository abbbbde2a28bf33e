//! Blob store abstraction layer.
//!
//! Raw document payloads are stored as opaque objects keyed by document id,
//! scoped to a named bucket. The backend is selected by configuration.

mod backend;

pub use backend::ObjectStoreBackend;

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

use crate::error::BlobStoreError;
use crate::models::{BlobSource, BlobStoreConfig, BucketObject};

/// Bucket-scoped object operations consumed by the coordinator.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store the payload under `id`, overwriting any existing object.
    /// Returns the number of bytes written.
    async fn upload(
        &self,
        bucket: &str,
        id: &str,
        source: &BlobSource,
    ) -> Result<u64, BlobStoreError>;

    /// Write the object to `destination`. Returns the number of bytes written.
    async fn download(
        &self,
        bucket: &str,
        id: &str,
        destination: &Path,
    ) -> Result<u64, BlobStoreError>;

    /// Fetch the object contents.
    async fn get(&self, bucket: &str, id: &str) -> Result<Bytes, BlobStoreError>;

    /// Remove the object. Deleting an absent object succeeds.
    async fn delete(&self, bucket: &str, id: &str) -> Result<(), BlobStoreError>;

    /// List every object in the bucket.
    ///
    /// Provider failures are logged and yield an empty listing.
    async fn list(&self, bucket: &str) -> Vec<BucketObject>;

    async fn health_check(&self) -> Result<bool, BlobStoreError>;

    /// Bucket used when the caller does not name one.
    fn default_bucket(&self) -> &str;
}

/// Create a blob store backend based on configuration.
pub async fn create_blob_store(
    config: &BlobStoreConfig,
) -> Result<Box<dyn BlobStore>, BlobStoreError> {
    let backend = ObjectStoreBackend::new(config).await?;
    Ok(Box::new(backend))
}
