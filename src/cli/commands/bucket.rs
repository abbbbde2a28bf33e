use anyhow::{Context, Result};

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat, class_name_for_bucket};
use crate::services::HybridDataStore;

pub async fn handle_schema(bucket: &str, config: &Config, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let store = HybridDataStore::from_config(config)
        .await
        .context("failed to initialize stores")?;

    let created = store
        .create_schema_from_bucket(bucket)
        .await
        .with_context(|| format!("failed to create schema for bucket '{}'", bucket))?;

    let class = class_name_for_bucket(bucket);
    let message = if created {
        format!("Created class '{}' for bucket '{}'", class, bucket)
    } else {
        format!("Class '{}' already exists", class)
    };
    println!("{}", formatter.format_message(&message));
    Ok(())
}

pub async fn handle_ingest(bucket: &str, config: &Config, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let store = HybridDataStore::from_config(config)
        .await
        .context("failed to initialize stores")?;

    let ids = store
        .batch_ingest_from_bucket(bucket)
        .await
        .with_context(|| format!("failed to ingest bucket '{}'", bucket))?;

    let message = if ids.is_empty() {
        format!("No objects found in bucket '{}'", bucket)
    } else {
        format!("Ingested {} object(s) from bucket '{}'", ids.len(), bucket)
    };
    println!("{}", formatter.format_message(&message));
    Ok(())
}
