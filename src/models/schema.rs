//! Typed class schema descriptors for the index store.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

const MAX_IDENTIFIER_LEN: usize = 63;

/// Data type of a class property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Int,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::String => write!(f, "string"),
            FieldKind::Int => write!(f, "int"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    pub kind: FieldKind,
    pub description: String,
}

impl SchemaField {
    pub fn new(name: impl Into<String>, kind: FieldKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
        }
    }
}

/// A class ("collection", "table") with an ordered list of properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSchema {
    pub name: String,
    pub fields: Vec<SchemaField>,
}

impl ClassSchema {
    /// The fixed schema provisioned for a bucket.
    pub fn for_bucket(bucket_name: &str) -> Self {
        Self {
            name: class_name_for_bucket(bucket_name),
            fields: vec![
                SchemaField::new("path", FieldKind::String, "Path of the object"),
                SchemaField::new("object_name", FieldKind::String, "Name of the object"),
                SchemaField::new("type", FieldKind::String, "Type of the object"),
                SchemaField::new("size", FieldKind::Int, "Size of the object in bytes"),
            ],
        }
    }

    /// Check the schema before it is submitted to a backend.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        validate_identifier(&self.name).map_err(|e| format!("class name: {}", e))?;

        if self.fields.is_empty() {
            return Err("schema must declare at least one field".to_string());
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            validate_identifier(&field.name)
                .map_err(|e| format!("field '{}': {}", field.name, e))?;
            if !seen.insert(field.name.as_str()) {
                return Err(format!("duplicate field '{}'", field.name));
            }
        }

        Ok(())
    }
}

/// Derive a class name from a bucket name.
///
/// Bucket names allow `-` and `.`, class names do not; anything outside
/// `[A-Za-z0-9_]` becomes `_`, and a leading digit gets a `_` prefix.
pub fn class_name_for_bucket(bucket_name: &str) -> String {
    let mut name: String = bucket_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

/// `[A-Za-z_][A-Za-z0-9_]*`, at most 63 characters.
pub fn validate_identifier(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("cannot be empty".to_string());
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(format!("cannot exceed {} characters", MAX_IDENTIFIER_LEN));
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err("cannot start with a digit".to_string());
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err("must be alphanumeric with underscore".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_schema_fields() {
        let schema = ClassSchema::for_bucket("documents");
        assert_eq!(schema.name, "documents");
        let names: Vec<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["path", "object_name", "type", "size"]);
        assert_eq!(schema.fields[3].kind, FieldKind::Int);
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_class_name_for_bucket() {
        assert_eq!(class_name_for_bucket("my-minio.bucket"), "my_minio_bucket");
        assert_eq!(class_name_for_bucket("2024-logs"), "_2024_logs");
        assert!(ClassSchema::for_bucket("2024-logs").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let schema = ClassSchema {
            name: "docs".to_string(),
            fields: vec![
                SchemaField::new("path", FieldKind::String, ""),
                SchemaField::new("path", FieldKind::Int, ""),
            ],
        };
        assert_eq!(schema.validate().unwrap_err(), "duplicate field 'path'");
    }

    #[test]
    fn test_validate_rejects_bad_names() {
        let schema = ClassSchema {
            name: "bad name".to_string(),
            fields: vec![SchemaField::new("path", FieldKind::String, "")],
        };
        assert!(schema.validate().is_err());

        let schema = ClassSchema {
            name: "docs".to_string(),
            fields: vec![],
        };
        assert!(schema.validate().is_err());
    }
}
