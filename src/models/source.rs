//! Source kind of a document.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Kind of source a document originates from.
///
/// Known kinds have dedicated variants; anything else is kept verbatim
/// (lowercased) in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Source {
    Email,
    /// Files, including objects ingested from a bucket
    #[default]
    File,
    Chat,
    /// Any other source kind (e.g., "slack", "wiki")
    Other(String),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Email => write!(f, "email"),
            Source::File => write!(f, "file"),
            Source::Chat => write!(f, "chat"),
            Source::Other(s) => write!(f, "{}", s),
        }
    }
}

impl std::str::FromStr for Source {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "email" => Source::Email,
            "file" => Source::File,
            "chat" => Source::Chat,
            other => Source::Other(other.to_string()),
        })
    }
}

impl Serialize for Source {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Source {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let Ok(source) = s.parse();
        Ok(source)
    }
}
