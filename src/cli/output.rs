use std::fmt::Write as FmtWrite;

use serde::Serialize;

use crate::models::{BlobStatus, DeleteReport, OutputFormat, QueryResult, UpsertReport};

pub trait Formatter {
    fn format_upsert(&self, report: &UpsertReport) -> String;
    fn format_query_results(&self, results: &[QueryResult]) -> String;
    fn format_delete(&self, report: &DeleteReport) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub blob_store: ComponentStatus,
    pub index_store: ComponentStatus,
    pub embedding: ComponentStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentStatus {
    pub driver: String,
    pub target: String,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentStatus {
    pub fn new(driver: impl ToString, target: impl Into<String>) -> Self {
        Self {
            driver: driver.to_string(),
            target: target.into(),
            connected: false,
            error: None,
        }
    }

    pub fn with_result<E: std::fmt::Display>(mut self, result: Result<bool, E>) -> Self {
        match result {
            Ok(connected) => self.connected = connected,
            Err(e) => self.error = Some(e.to_string()),
        }
        self
    }
}

fn blob_status_label(status: &BlobStatus) -> String {
    match status {
        BlobStatus::Stored { bytes } => format!("stored ({} bytes)", bytes),
        BlobStatus::Deleted => "deleted".to_string(),
        BlobStatus::Resident => "already in bucket".to_string(),
        BlobStatus::Skipped { reason } => format!("skipped: {}", reason),
        BlobStatus::Failed { error } => format!("FAILED: {}", error),
    }
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_upsert(&self, report: &UpsertReport) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "Indexed {} document(s)", report.indexed_ids.len());
        for outcome in &report.blob {
            let _ = writeln!(
                output,
                "  {}  blob: {}",
                outcome.id,
                blob_status_label(&outcome.status)
            );
        }
        let failures = report.blob_failures().count();
        if failures > 0 {
            let _ = writeln!(
                output,
                "\nWarning: {} blob upload(s) failed; those documents are searchable but have no stored payload",
                failures
            );
        }
        output
    }

    fn format_query_results(&self, results: &[QueryResult]) -> String {
        let mut output = String::new();

        for result in results {
            if result.is_empty() {
                let _ = writeln!(output, "No results found for: {}\n", result.query);
                continue;
            }

            let _ = writeln!(output, "Results for: \"{}\"", result.query);
            for (i, hit) in result.results.iter().enumerate() {
                let _ = writeln!(output, "{}. [Score: {:.3}] {}", i + 1, hit.score, hit.id);
                let _ = writeln!(output, "   Document: {}", hit.metadata.document_id);
                if let Some(source) = &hit.metadata.document.source {
                    let _ = writeln!(output, "   Source:   {}", source);
                }
                if let Some(author) = &hit.metadata.document.author {
                    let _ = writeln!(output, "   Author:   {}", author);
                }
                if let Some(created_at) = &hit.metadata.document.created_at {
                    let _ = writeln!(output, "   Created:  {}", created_at);
                }
                let _ = writeln!(output, "   ---");

                let preview: String = hit.text.chars().take(200).collect();
                let preview = if hit.text.chars().count() > 200 {
                    format!("{}...", preview)
                } else {
                    preview
                };
                for line in preview.lines() {
                    let _ = writeln!(output, "   {}", line);
                }
                let _ = writeln!(output);
            }
        }

        output
    }

    fn format_delete(&self, report: &DeleteReport) -> String {
        let mut output = String::new();
        let index = if report.index_deleted {
            "deleted"
        } else {
            "nothing deleted"
        };
        let _ = writeln!(output, "Index: {}", index);
        for outcome in &report.blob {
            let _ = writeln!(
                output,
                "  {}  blob: {}",
                outcome.id,
                blob_status_label(&outcome.status)
            );
        }
        if !report.fully_deleted() && report.index_deleted {
            let _ = writeln!(
                output,
                "\nWarning: some blob objects could not be deleted and remain in the bucket"
            );
        }
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "Status");
        let _ = writeln!(output, "------");

        for (name, component) in [
            ("Blob Store:", &status.blob_store),
            ("Index Store:", &status.index_store),
            ("Embedding:", &status.embedding),
        ] {
            let state = if component.connected {
                "[CONNECTED]"
            } else {
                "[DISCONNECTED]"
            };
            let _ = writeln!(output, "{:<14}{} {}", name, component.driver, state);
            let _ = writeln!(output, "  Target:     {}", component.target);
            if let Some(error) = &component.error {
                let _ = writeln!(output, "  Error:      {}", error);
            }
        }

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: Serialize + ?Sized>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
    }
}

impl Formatter for JsonFormatter {
    fn format_upsert(&self, report: &UpsertReport) -> String {
        self.render(report)
    }

    fn format_query_results(&self, results: &[QueryResult]) -> String {
        self.render(&serde_json::json!({ "results": results }))
    }

    fn format_delete(&self, report: &DeleteReport) -> String {
        self.render(report)
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        self.render(status)
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
    }
}
