use clap::Args;

use crate::models::{DocumentMetadataFilter, Source};

/// Metadata filter flags shared by `query` and `delete`.
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Only chunks of this document
    #[arg(long)]
    pub document_id: Option<String>,

    /// Source kind (email, file, chat, or any other name)
    #[arg(long)]
    pub source: Option<Source>,

    #[arg(long)]
    pub source_id: Option<String>,

    #[arg(long)]
    pub author: Option<String>,

    /// Inclusive lower bound on created_at (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<String>,

    /// Inclusive upper bound on created_at (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    pub end_date: Option<String>,
}

impl FilterArgs {
    /// The filter these flags describe, or `None` when no flag was given.
    pub fn to_filter(&self) -> Option<DocumentMetadataFilter> {
        let filter = DocumentMetadataFilter {
            document_id: self.document_id.clone(),
            source: self.source.clone(),
            source_id: self.source_id.clone(),
            author: self.author.clone(),
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
        };
        (!filter.is_empty()).then_some(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_flags_is_no_filter() {
        assert!(FilterArgs::default().to_filter().is_none());
    }

    #[test]
    fn test_flags_become_filter() {
        let args = FilterArgs {
            source: Some(Source::Email),
            start_date: Some("2024-01-01".into()),
            ..Default::default()
        };
        let filter = args.to_filter().unwrap();
        assert_eq!(filter.source, Some(Source::Email));
        assert_eq!(filter.start_date.as_deref(), Some("2024-01-01"));
        assert!(filter.author.is_none());
    }
}
