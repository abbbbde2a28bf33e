use serde::{Deserialize, Serialize};

/// An entry of a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketObject {
    pub object_name: String,
    /// `{bucket}/{object_name}`
    pub path: String,
    /// MIME type guessed from the object name
    #[serde(rename = "type")]
    pub object_type: Option<String>,
    pub size: u64,
}

impl BucketObject {
    pub fn new(bucket: &str, object_name: impl Into<String>, size: u64) -> Self {
        let object_name = object_name.into();
        let object_type = mime_guess::from_path(&object_name)
            .first()
            .map(|mime| mime.essence_str().to_string());
        Self {
            path: format!("{}/{}", bucket, object_name),
            object_name,
            object_type,
            size,
        }
    }
}
