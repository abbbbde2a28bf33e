//! `object_store` implementation of the blob store.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjPath;
use object_store::{ObjectMeta, ObjectStore, PutPayload};
use tokio::sync::RwLock;

use super::BlobStore;
use crate::error::{BlobCause, BlobOperation, BlobStoreError};
use crate::models::{BlobDriver, BlobSource, BlobStoreConfig, BucketObject};
use crate::utils::retry::{RetryConfig, with_retry};

type DynStore = Arc<dyn ObjectStore>;

/// Blob store over S3-compatible storage, a local directory, or memory.
///
/// One `ObjectStore` is built per bucket on first use and cached.
pub struct ObjectStoreBackend {
    config: BlobStoreConfig,
    stores: RwLock<HashMap<String, DynStore>>,
    retry: RetryConfig,
}

impl ObjectStoreBackend {
    /// Create the backend and open the configured default bucket.
    pub async fn new(config: &BlobStoreConfig) -> Result<Self, BlobStoreError> {
        let backend = Self {
            config: config.clone(),
            stores: RwLock::new(HashMap::new()),
            retry: RetryConfig::new(config.max_retries),
        };
        backend.store(&config.bucket).await?;

        tracing::debug!(
            driver = %config.driver,
            bucket = %config.bucket,
            "blob store ready"
        );
        Ok(backend)
    }

    async fn store(&self, bucket: &str) -> Result<DynStore, BlobStoreError> {
        if let Some(store) = self.stores.read().await.get(bucket) {
            return Ok(Arc::clone(store));
        }

        let mut stores = self.stores.write().await;
        if let Some(store) = stores.get(bucket) {
            return Ok(Arc::clone(store));
        }

        let store = self.build_store(bucket).await?;
        stores.insert(bucket.to_string(), Arc::clone(&store));
        Ok(store)
    }

    async fn build_store(&self, bucket: &str) -> Result<DynStore, BlobStoreError> {
        let connect_error =
            |cause: BlobCause| BlobStoreError::new(BlobOperation::Connect, bucket, "", cause);

        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket.starts_with('.') {
            return Err(connect_error(BlobCause::Provider(format!(
                "invalid bucket name '{}'",
                bucket
            ))));
        }

        match self.config.driver {
            BlobDriver::S3 => {
                let mut builder = AmazonS3Builder::new()
                    .with_bucket_name(bucket)
                    .with_region(&self.config.region)
                    .with_allow_http(!self.config.secure);
                if let Some(endpoint) = &self.config.endpoint {
                    builder = builder.with_endpoint(endpoint_url(endpoint, self.config.secure));
                }
                if let Some(key) = &self.config.access_key {
                    builder = builder.with_access_key_id(key);
                }
                if let Some(secret) = &self.config.secret_key {
                    builder = builder.with_secret_access_key(secret);
                }
                let store = builder.build().map_err(|e| connect_error(e.into()))?;
                Ok(Arc::new(store))
            }
            BlobDriver::Local => {
                let base = self.config.local_base_path().join(bucket);
                tokio::fs::create_dir_all(&base)
                    .await
                    .map_err(|e| connect_error(e.into()))?;
                let store =
                    LocalFileSystem::new_with_prefix(&base).map_err(|e| connect_error(e.into()))?;
                Ok(Arc::new(store))
            }
            BlobDriver::Memory => Ok(Arc::new(InMemory::new())),
        }
    }

    async fn fetch(&self, bucket: &str, id: &str, operation: BlobOperation) -> Result<Bytes, BlobStoreError> {
        let store = self.store(bucket).await?;
        let location = ObjPath::from(id);

        with_retry(&self.retry, || {
            let store = Arc::clone(&store);
            let location = location.clone();
            async move {
                let result = store.get(&location).await?;
                result.bytes().await
            }
        })
        .await
        .into_result()
        .map_err(|e| BlobStoreError::new(operation, bucket, id, e))
    }
}

/// Accept `host:port` endpoints as MinIO clients do.
fn endpoint_url(endpoint: &str, secure: bool) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else if secure {
        format!("https://{}", endpoint)
    } else {
        format!("http://{}", endpoint)
    }
}

#[async_trait]
impl BlobStore for ObjectStoreBackend {
    async fn upload(
        &self,
        bucket: &str,
        id: &str,
        source: &BlobSource,
    ) -> Result<u64, BlobStoreError> {
        let data = match source {
            BlobSource::File(path) => tokio::fs::read(path)
                .await
                .map(Bytes::from)
                .map_err(|e| BlobStoreError::new(BlobOperation::Upload, bucket, id, e))?,
            BlobSource::Bytes(bytes) => bytes.clone(),
        };
        let size = data.len() as u64;

        let store = self.store(bucket).await?;
        let location = ObjPath::from(id);

        with_retry(&self.retry, || {
            let store = Arc::clone(&store);
            let location = location.clone();
            let payload = PutPayload::from_bytes(data.clone());
            async move { store.put(&location, payload).await.map(|_| ()) }
        })
        .await
        .into_result()
        .map_err(|e| BlobStoreError::new(BlobOperation::Upload, bucket, id, e))?;

        tracing::debug!(bucket, id, bytes = size, "uploaded blob");
        Ok(size)
    }

    async fn download(
        &self,
        bucket: &str,
        id: &str,
        destination: &Path,
    ) -> Result<u64, BlobStoreError> {
        let data = self.fetch(bucket, id, BlobOperation::Download).await?;

        let io_error = |e: std::io::Error| BlobStoreError::new(BlobOperation::Download, bucket, id, e);
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        tokio::fs::write(destination, &data).await.map_err(io_error)?;

        tracing::debug!(bucket, id, path = %destination.display(), "downloaded blob");
        Ok(data.len() as u64)
    }

    async fn get(&self, bucket: &str, id: &str) -> Result<Bytes, BlobStoreError> {
        self.fetch(bucket, id, BlobOperation::Get).await
    }

    async fn delete(&self, bucket: &str, id: &str) -> Result<(), BlobStoreError> {
        let store = self.store(bucket).await?;
        let location = ObjPath::from(id);

        let result = with_retry(&self.retry, || {
            let store = Arc::clone(&store);
            let location = location.clone();
            async move { store.delete(&location).await }
        })
        .await
        .into_result();

        match result {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => {
                tracing::debug!(bucket, id, "deleted blob");
                Ok(())
            }
            Err(e) => Err(BlobStoreError::new(BlobOperation::Delete, bucket, id, e)),
        }
    }

    async fn list(&self, bucket: &str) -> Vec<BucketObject> {
        let store = match self.store(bucket).await {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(bucket, error = %e, "cannot open bucket for listing");
                return Vec::new();
            }
        };

        let listing: Result<Vec<ObjectMeta>, _> = store.list(None).try_collect().await;
        match listing {
            Ok(metas) => {
                let mut objects: Vec<BucketObject> = metas
                    .into_iter()
                    .map(|meta| BucketObject::new(bucket, meta.location.to_string(), meta.size as u64))
                    .collect();
                objects.sort_by(|a, b| a.object_name.cmp(&b.object_name));
                objects
            }
            Err(e) => {
                let error = BlobStoreError::new(BlobOperation::List, bucket, "", e);
                tracing::warn!(error = %error, "bucket listing failed, returning no objects");
                Vec::new()
            }
        }
    }

    async fn health_check(&self) -> Result<bool, BlobStoreError> {
        let bucket = self.default_bucket();
        let store = self.store(bucket).await?;
        store
            .list_with_delimiter(None)
            .await
            .map(|_| true)
            .map_err(|e| BlobStoreError::new(BlobOperation::Connect, bucket, "", e))
    }

    fn default_bucket(&self) -> &str {
        &self.config.bucket
    }
}
