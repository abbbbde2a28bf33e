use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};
use crate::services::HybridDataStore;

#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Document id (object name in the configured bucket)
    pub id: String,

    /// Destination file
    pub dest: PathBuf,
}

pub async fn handle_download(args: DownloadArgs, config: &Config, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let store = HybridDataStore::from_config(config)
        .await
        .context("failed to initialize stores")?;

    let bytes = store
        .download(&args.id, &args.dest)
        .await
        .with_context(|| format!("failed to download '{}'", args.id))?;

    println!(
        "{}",
        formatter.format_message(&format!(
            "Downloaded {} ({} bytes) to {}",
            args.id,
            bytes,
            args.dest.display()
        ))
    );
    Ok(())
}
