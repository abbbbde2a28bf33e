//! Per-document outcomes of operations spanning both stores.

use serde::Serialize;

/// What happened on the blob side for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BlobStatus {
    Stored { bytes: u64 },
    Deleted,
    /// Payload already lives in the blob store
    Resident,
    /// No payload could be resolved
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlobOutcome {
    pub id: String,
    #[serde(flatten)]
    pub status: BlobStatus,
}

impl BlobOutcome {
    pub fn new(id: impl Into<String>, status: BlobStatus) -> Self {
        Self {
            id: id.into(),
            status,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, BlobStatus::Failed { .. })
    }
}

/// Result of an upsert across both stores.
///
/// A document id may appear in `indexed_ids` while its blob outcome is a
/// failure: the two paths are independent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpsertReport {
    pub indexed_ids: Vec<String>,
    pub blob: Vec<BlobOutcome>,
}

impl UpsertReport {
    pub fn blob_failures(&self) -> impl Iterator<Item = &BlobOutcome> {
        self.blob.iter().filter(|o| o.is_failure())
    }

    /// Ids written to both the blob store (or already resident) and the index.
    pub fn fully_stored_ids(&self) -> Vec<&str> {
        self.indexed_ids
            .iter()
            .filter(|id| {
                self.blob.iter().any(|o| {
                    &o.id == *id
                        && matches!(o.status, BlobStatus::Stored { .. } | BlobStatus::Resident)
                })
            })
            .map(String::as_str)
            .collect()
    }
}

/// Result of a delete across both stores.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeleteReport {
    pub index_deleted: bool,
    pub blob: Vec<BlobOutcome>,
}

impl DeleteReport {
    pub fn blob_failures(&self) -> impl Iterator<Item = &BlobOutcome> {
        self.blob.iter().filter(|o| o.is_failure())
    }

    /// True only when the index delete and every blob delete succeeded.
    pub fn fully_deleted(&self) -> bool {
        self.index_deleted && self.blob_failures().next().is_none()
    }
}
