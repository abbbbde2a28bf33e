use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use std::path::{Path, PathBuf};

use crate::cli::output::get_formatter;
use crate::models::{Config, Document, DocumentMetadata, OutputFormat, Source};
use crate::services::{HybridDataStore, estimate_tokens};
use crate::utils::{collect_files, is_text_file, object_name_for, read_file_content};

const MAX_TEXT_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Args)]
pub struct UpsertArgs {
    /// File or directory to store and index
    #[arg(required = true)]
    pub path: PathBuf,

    /// Document id (single file only; defaults to the path relative to the argument)
    #[arg(long)]
    pub id: Option<String>,

    /// Chunk size in tokens
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Source kind recorded in the metadata
    #[arg(long, default_value = "file")]
    pub source: Source,

    #[arg(long)]
    pub author: Option<String>,
}

pub async fn handle_upsert(
    args: UpsertArgs,
    config: &Config,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let formatter = get_formatter(format);

    if !args.path.exists() {
        anyhow::bail!("path does not exist: {}", args.path.display());
    }
    if args.id.is_some() && !args.path.is_file() {
        anyhow::bail!("--id can only be used with a single file");
    }
    if args.chunk_size == Some(0) {
        anyhow::bail!("--chunk-size must be at least 1");
    }

    let files = collect_files(&args.path);
    if files.is_empty() {
        println!("{}", formatter.format_message("No files found."));
        return Ok(());
    }

    let documents = files
        .iter()
        .map(|file| build_document(&args, file))
        .collect::<Result<Vec<_>>>()?;

    if verbose {
        let tokens: usize = documents.iter().map(|d| estimate_tokens(&d.text)).sum();
        eprintln!("{} file(s), ~{} tokens of text", documents.len(), tokens);
    }

    let store = HybridDataStore::from_config(config)
        .await
        .context("failed to initialize stores")?;
    let report = store
        .upsert_with_report(&documents, args.chunk_size)
        .await
        .context("upsert failed")?;

    print!("{}", formatter.format_upsert(&report));
    Ok(())
}

fn build_document(args: &UpsertArgs, file: &Path) -> Result<Document> {
    let id = args
        .id
        .clone()
        .unwrap_or_else(|| object_name_for(&args.path, file));

    let file_meta = std::fs::metadata(file)
        .with_context(|| format!("failed to stat {}", file.display()))?;

    let text = if is_text_file(file) {
        match read_file_content(file, MAX_TEXT_BYTES) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(path = %file.display(), error = %e, "storing without indexed text");
                String::new()
            }
        }
    } else {
        String::new()
    };

    let created_at = file_meta
        .modified()
        .ok()
        .map(|time| DateTime::<Utc>::from(time).to_rfc3339());

    let metadata = DocumentMetadata {
        source: Some(args.source.clone()),
        source_id: Some(file.to_string_lossy().to_string()),
        created_at,
        author: args.author.clone(),
        path: Some(file.to_string_lossy().to_string()),
        object_name: Some(id.clone()),
        object_type: mime_guess::from_path(file)
            .first()
            .map(|mime| mime.essence_str().to_string()),
        size: Some(file_meta.len()),
        ..Default::default()
    };

    Ok(Document::new(id, text)
        .with_metadata(metadata)
        .with_file_path(file))
}
