//! Query, filter and result models.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::document::DocumentChunkMetadata;
use super::source::Source;

pub const DEFAULT_TOP_K: u32 = 3;

fn default_top_k() -> u32 {
    DEFAULT_TOP_K
}

/// Output format for CLI results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Metadata filter; every set field must match (AND).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadataFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Inclusive lower bound on `created_at`, any supported date format
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    /// Inclusive upper bound on `created_at`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

/// Date bounds of a filter resolved to unix seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl DateRange {
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, timestamp: Option<i64>) -> bool {
        if self.is_empty() {
            return true;
        }
        let Some(ts) = timestamp else {
            return false;
        };
        self.start.is_none_or(|start| ts >= start) && self.end.is_none_or(|end| ts <= end)
    }
}

impl DocumentMetadataFilter {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Parse `start_date`/`end_date`.
    ///
    /// # Errors
    ///
    /// Returns the offending value when a date cannot be parsed.
    pub fn date_range(&self) -> Result<DateRange, String> {
        let parse = |value: &Option<String>| -> Result<Option<i64>, String> {
            value
                .as_deref()
                .map(|s| parse_timestamp(s).ok_or_else(|| format!("unrecognized date '{}'", s)))
                .transpose()
        };
        Ok(DateRange {
            start: parse(&self.start_date)?,
            end: parse(&self.end_date)?,
        })
    }

    /// Evaluate the filter against chunk metadata.
    pub fn matches(&self, metadata: &DocumentChunkMetadata, range: &DateRange) -> bool {
        let doc = &metadata.document;
        let eq = |want: &Option<String>, have: Option<&str>| {
            want.as_deref().is_none_or(|w| have == Some(w))
        };

        eq(&self.document_id, Some(metadata.document_id.as_str()))
            && self
                .source
                .as_ref()
                .is_none_or(|s| doc.source.as_ref() == Some(s))
            && eq(&self.source_id, doc.source_id.as_deref())
            && eq(&self.author, doc.author.as_deref())
            && range.contains(doc.created_at.as_deref().and_then(parse_timestamp))
    }
}

/// Parse a free-form date string into unix seconds.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` and
/// `YYYY-MM-DD` (midnight UTC).
pub fn parse_timestamp(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.and_utc().timestamp());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

/// A similarity search request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub query: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<DocumentMetadataFilter>,

    #[serde(default = "default_top_k")]
    pub top_k: u32,
}

impl Query {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            filter: None,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_filter(mut self, filter: DocumentMetadataFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_embedding(self, embedding: Vec<f32>) -> QueryWithEmbedding {
        QueryWithEmbedding {
            query: self,
            embedding,
        }
    }
}

/// A query whose embedding has been resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryWithEmbedding {
    #[serde(flatten)]
    pub query: Query,
    pub embedding: Vec<f32>,
}

/// A matching chunk with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunkWithScore {
    pub id: String,
    pub text: String,
    pub metadata: DocumentChunkMetadata,
    pub score: f32,
}

/// Results of one query, ordered by descending score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub query: String,
    pub results: Vec<DocumentChunkWithScore>,
}

impl QueryResult {
    pub fn new(query: impl Into<String>, mut results: Vec<DocumentChunkWithScore>) -> Self {
        sort_by_score(&mut results);
        Self {
            query: query.into(),
            results,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }
}

/// Sort descending by score, ties broken by chunk id for stable output.
pub fn sort_by_score(results: &mut [DocumentChunkWithScore]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
}

/// Which records a delete targets.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteSelector {
    All,
    Filter(DocumentMetadataFilter),
    Ids(Vec<String>),
}

/// A delete request as accepted by the coordinator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<DocumentMetadataFilter>,
    #[serde(default)]
    pub delete_all: bool,
}

impl DeleteRequest {
    pub fn ids(ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            ids: Some(ids.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    pub fn filter(filter: DocumentMetadataFilter) -> Self {
        Self {
            filter: Some(filter),
            ..Default::default()
        }
    }

    pub fn all() -> Self {
        Self {
            delete_all: true,
            ..Default::default()
        }
    }

    /// Resolve the effective selector: `delete_all` > `filter` > `ids`.
    ///
    /// A filter with no fields set selects nothing.
    pub fn selector(&self) -> Option<DeleteSelector> {
        if self.delete_all {
            return Some(DeleteSelector::All);
        }
        if let Some(filter) = self.filter.as_ref().filter(|f| !f.is_empty()) {
            return Some(DeleteSelector::Filter(filter.clone()));
        }
        self.ids.as_ref().map(|ids| DeleteSelector::Ids(ids.clone()))
    }
}
