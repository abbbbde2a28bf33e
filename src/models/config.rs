use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_BUCKET: &str = "default-bucket";
pub const DEFAULT_CLASS: &str = "documents";
pub const DEFAULT_EMBEDDING_URL: &str = "http://localhost:11411";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 1024;
pub const DEFAULT_CHUNK_TOKEN_SIZE: u32 = 200;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub blob_store: BlobStoreConfig,

    #[serde(default)]
    pub index_store: IndexStoreConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("hybrid-store").join("config.toml"))
    }

    /// Load the config file (if any), then apply environment overrides.
    ///
    /// A `.env` file in the working directory is honored.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        dotenvy::dotenv().ok();
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            ConfigError::PathError("could not determine config directory".to_string())
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Override settings from environment-style variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("MINIO_URL") {
            self.blob_store.endpoint = Some(url);
        }
        if let Some(key) = non_empty("MINIO_ACCESS_KEY") {
            self.blob_store.access_key = Some(key);
        }
        if let Some(secret) = non_empty("MINIO_SECRET_KEY") {
            self.blob_store.secret_key = Some(secret);
        }
        if let Some(bucket) = non_empty("MINIO_BUCKET_NAME") {
            self.blob_store.bucket = bucket;
        }
        if let Some(url) = non_empty("INDEX_URL") {
            self.index_store.url = url;
        }
        if let Some(class) = non_empty("INDEX_CLASS") {
            self.index_store.class_name = class;
        }
        if let Some(url) = non_empty("EMBEDDING_URL") {
            self.embedding.url = url;
        }
        if let Some(key) = non_empty("EMBEDDING_API_KEY").or_else(|| non_empty("OPENAI_API_KEY")) {
            self.embedding.api_key = Some(key);
        }
    }

    /// Check that everything required by the selected drivers is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.blob_store.validate()?;
        self.index_store.validate()?;
        self.embedding.validate()?;
        self.chunking.validate()
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(msg.into())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobDriver {
    /// S3-compatible object storage (MinIO, AWS)
    #[default]
    S3,
    Local,
    Memory,
}

impl std::fmt::Display for BlobDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlobDriver::S3 => write!(f, "s3"),
            BlobDriver::Local => write!(f, "local"),
            BlobDriver::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobStoreConfig {
    #[serde(default)]
    pub driver: BlobDriver,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Use HTTPS for the S3 endpoint
    #[serde(default)]
    pub secure: bool,

    /// Base directory for the local driver
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,

    #[serde(default = "default_upload_concurrency")]
    pub upload_concurrency: usize,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_bucket() -> String {
    DEFAULT_BUCKET.to_string()
}

fn default_upload_concurrency() -> usize {
    8
}

fn default_max_retries() -> u32 {
    3
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self {
            driver: BlobDriver::default(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            region: default_region(),
            bucket: default_bucket(),
            secure: false,
            local_path: None,
            upload_concurrency: default_upload_concurrency(),
            max_retries: default_max_retries(),
        }
    }
}

impl BlobStoreConfig {
    pub fn memory(bucket: impl Into<String>) -> Self {
        Self {
            driver: BlobDriver::Memory,
            bucket: bucket.into(),
            ..Default::default()
        }
    }

    pub fn local_base_path(&self) -> PathBuf {
        self.local_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("hybrid-store")
                .join("blobs")
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.trim().is_empty() {
            return Err(invalid("blob_store.bucket cannot be empty"));
        }
        if self.upload_concurrency == 0 {
            return Err(invalid("blob_store.upload_concurrency must be at least 1"));
        }
        if self.driver == BlobDriver::S3 {
            let missing: Vec<&str> = [
                ("endpoint (MINIO_URL)", &self.endpoint),
                ("access_key (MINIO_ACCESS_KEY)", &self.access_key),
                ("secret_key (MINIO_SECRET_KEY)", &self.secret_key),
            ]
            .into_iter()
            .filter(|(_, value)| value.as_deref().is_none_or(|v| v.trim().is_empty()))
            .map(|(name, _)| name)
            .collect();
            if !missing.is_empty() {
                return Err(invalid(format!(
                    "missing blob store settings: {}",
                    missing.join(", ")
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexDriver {
    #[default]
    Qdrant,
    #[serde(alias = "postgres")]
    PostgreSQL,
    Memory,
}

impl std::fmt::Display for IndexDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexDriver::Qdrant => write!(f, "qdrant"),
            IndexDriver::PostgreSQL => write!(f, "postgresql"),
            IndexDriver::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStoreConfig {
    #[serde(default)]
    pub driver: IndexDriver,

    #[serde(default = "default_qdrant_url")]
    pub url: String,

    /// Class (collection/table) holding document chunks
    #[serde(default = "default_class")]
    pub class_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// PostgreSQL schema for the chunk tables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(default = "default_pool_max")]
    pub pool_max: u32,

    #[serde(default = "default_pool_acquire_timeout")]
    pub pool_acquire_timeout: u32,
}

fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_class() -> String {
    DEFAULT_CLASS.to_string()
}

fn default_pool_max() -> u32 {
    5
}

fn default_pool_acquire_timeout() -> u32 {
    30
}

impl Default for IndexStoreConfig {
    fn default() -> Self {
        Self {
            driver: IndexDriver::default(),
            url: default_qdrant_url(),
            class_name: default_class(),
            api_key: None,
            schema: None,
            pool_max: default_pool_max(),
            pool_acquire_timeout: default_pool_acquire_timeout(),
        }
    }
}

impl IndexStoreConfig {
    pub fn memory(class_name: impl Into<String>) -> Self {
        Self {
            driver: IndexDriver::Memory,
            class_name: class_name.into(),
            ..Default::default()
        }
    }

    /// Table name qualified with the configured schema, if any.
    pub fn qualified_table_name(&self, class_name: &str) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, class_name),
            None => class_name.to_string(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        crate::models::validate_identifier(&self.class_name)
            .map_err(|e| invalid(format!("index_store.class_name: {}", e)))?;
        if let Some(schema) = &self.schema {
            crate::models::validate_identifier(schema)
                .map_err(|e| invalid(format!("index_store.schema: {}", e)))?;
        }
        if self.driver != IndexDriver::Memory && self.url.trim().is_empty() {
            return Err(invalid("index_store.url cannot be empty (INDEX_URL)"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProtocol {
    /// text-embeddings-inference style `/embed`
    #[default]
    Tei,
    /// OpenAI-compatible `/v1/embeddings`
    OpenAi,
}

impl std::fmt::Display for EmbeddingProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingProtocol::Tei => write!(f, "tei"),
            EmbeddingProtocol::OpenAi => write!(f, "openai"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub protocol: EmbeddingProtocol,

    #[serde(default = "default_embedding_url")]
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_dimension")]
    pub dimension: u32,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Inputs longer than this are rejected before any request is made
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_embedding_url() -> String {
    DEFAULT_EMBEDDING_URL.to_string()
}

fn default_dimension() -> u32 {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_timeout() -> u64 {
    120
}

fn default_batch_size() -> u32 {
    8
}

fn default_max_input_chars() -> usize {
    32_768
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            protocol: EmbeddingProtocol::default(),
            url: default_embedding_url(),
            model: None,
            api_key: None,
            dimension: default_dimension(),
            timeout_secs: default_timeout(),
            batch_size: default_batch_size(),
            max_input_chars: default_max_input_chars(),
            max_retries: default_max_retries(),
        }
    }
}

impl EmbeddingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(invalid("embedding.url cannot be empty (EMBEDDING_URL)"));
        }
        if self.dimension == 0 {
            return Err(invalid("embedding.dimension must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(invalid("embedding.batch_size must be at least 1"));
        }
        if self.protocol == EmbeddingProtocol::OpenAi {
            if self.api_key.is_none() {
                return Err(invalid(
                    "embedding.api_key is required for the openai protocol (EMBEDDING_API_KEY)",
                ));
            }
            if self.model.is_none() {
                return Err(invalid("embedding.model is required for the openai protocol"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Default chunk budget in tokens
    #[serde(default = "default_chunk_token_size")]
    pub chunk_token_size: u32,

    /// Characters per token used to turn the budget into a window
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: u32,

    /// Overlap between consecutive chunks, in tokens
    #[serde(default)]
    pub chunk_overlap: u32,
}

fn default_chunk_token_size() -> u32 {
    DEFAULT_CHUNK_TOKEN_SIZE
}

fn default_chars_per_token() -> u32 {
    4
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_token_size: default_chunk_token_size(),
            chars_per_token: default_chars_per_token(),
            chunk_overlap: 0,
        }
    }
}

impl ChunkingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_token_size == 0 || self.chars_per_token == 0 {
            return Err(invalid(
                "chunking.chunk_token_size and chunking.chars_per_token must be at least 1",
            ));
        }
        if self.chunk_overlap >= self.chunk_token_size {
            return Err(invalid(
                "chunking.chunk_overlap must be smaller than chunking.chunk_token_size",
            ));
        }
        Ok(())
    }
}
