use std::path::PathBuf;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::bucket::BucketObject;
use super::source::Source;

/// A document submitted to the hybrid store.
///
/// The raw payload goes to the blob store; `text` is what gets chunked and
/// indexed. `text` may be empty when the content lives only in the blob store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    /// Caller-assigned id; generated on upsert when absent
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub text: String,

    /// Local file holding the raw payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,

    /// Inline raw payload
    #[serde(skip)]
    pub content: Option<Bytes>,

    #[serde(default)]
    pub metadata: DocumentMetadata,

    /// Set for documents synthesized from a bucket listing; their payload is
    /// already resident in the blob store.
    #[serde(skip)]
    pub resident: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Where a document's raw payload comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum BlobSource {
    File(PathBuf),
    Bytes(Bytes),
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, metadata: DocumentMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<Bytes>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Synthesize a document for an object already stored in `bucket`.
    pub fn from_bucket_object(object: &BucketObject) -> Self {
        Self {
            id: Some(object.object_name.clone()),
            metadata: DocumentMetadata {
                source: Some(Source::File),
                path: Some(object.path.clone()),
                object_name: Some(object.object_name.clone()),
                object_type: object.object_type.clone(),
                size: Some(object.size),
                ..Default::default()
            },
            resident: true,
            ..Default::default()
        }
    }

    pub fn generate_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Resolve the payload to upload: file reference first, then inline
    /// bytes, then the text itself.
    pub fn blob_source(&self) -> Option<BlobSource> {
        if let Some(path) = &self.file_path {
            return Some(BlobSource::File(path.clone()));
        }
        if let Some(content) = &self.content {
            return Some(BlobSource::Bytes(content.clone()));
        }
        if !self.text.is_empty() {
            return Some(BlobSource::Bytes(Bytes::from(self.text.clone())));
        }
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunkMetadata {
    pub document_id: String,
    pub chunk_index: u32,
    #[serde(flatten)]
    pub document: DocumentMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub text: String,
    pub metadata: DocumentChunkMetadata,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,
}

impl DocumentChunk {
    pub fn generate_id(document_id: &str, chunk_index: u32) -> String {
        format!("{}_{}", document_id, chunk_index)
    }

    /// Stable UUID for backends that only accept UUID point ids.
    pub fn point_id(&self) -> String {
        uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, self.id.as_bytes()).to_string()
    }

    pub fn document_id(&self) -> &str {
        &self.metadata.document_id
    }

    pub fn from_document(
        document_id: &str,
        metadata: &DocumentMetadata,
        text: String,
        chunk_index: u32,
    ) -> Self {
        Self {
            id: Self::generate_id(document_id, chunk_index),
            text,
            metadata: DocumentChunkMetadata {
                document_id: document_id.to_string(),
                chunk_index,
                document: metadata.clone(),
            },
            embedding: Vec::new(),
        }
    }
}

/// All chunks derived from one document.
///
/// An empty batch is still meaningful: indexing it clears whatever chunks the
/// document had before.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkBatch {
    pub document_id: String,
    pub chunks: Vec<DocumentChunk>,
}
