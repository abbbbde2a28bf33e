use anyhow::Result;

use crate::cli::output::{ComponentStatus, StatusInfo, get_formatter};
use crate::models::{BlobDriver, Config, IndexDriver, OutputFormat};
use crate::services::{Embedder, EmbeddingClient, create_backend, create_blob_store};

pub async fn handle_status(config: &Config, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);

    let blob_target = match config.blob_store.driver {
        BlobDriver::S3 => format!(
            "{} (bucket {})",
            config.blob_store.endpoint.as_deref().unwrap_or("<unset>"),
            config.blob_store.bucket
        ),
        BlobDriver::Local => format!(
            "{} (bucket {})",
            config.blob_store.local_base_path().display(),
            config.blob_store.bucket
        ),
        BlobDriver::Memory => format!("in-memory (bucket {})", config.blob_store.bucket),
    };
    let blob_store = ComponentStatus::new(config.blob_store.driver, blob_target);
    let blob_store = match create_blob_store(&config.blob_store).await {
        Ok(store) => blob_store.with_result(store.health_check().await),
        Err(e) => blob_store.with_result(Err(e)),
    };

    let index_target = format!("{} (class {})", config.index_store.url, config.index_store.class_name);
    let index_store = ComponentStatus::new(config.index_store.driver, index_target);
    let dimension = u64::from(config.embedding.dimension);
    let index_store = match create_backend(&config.index_store, dimension).await {
        Ok(store) => index_store.with_result(store.health_check().await),
        Err(e) => index_store.with_result(Err(e)),
    };

    let embedding = ComponentStatus::new(config.embedding.protocol, &config.embedding.url);
    let embedding = match EmbeddingClient::new(&config.embedding) {
        Ok(client) => embedding.with_result(client.health_check().await),
        Err(e) => embedding.with_result(Err(e)),
    };

    let status = StatusInfo {
        blob_store,
        index_store,
        embedding,
    };
    print!("{}", formatter.format_status(&status));

    if !status.index_store.connected {
        eprintln!();
        match config.index_store.driver {
            IndexDriver::Qdrant => {
                eprintln!("Warning: Qdrant not reachable. Start with: docker compose up -d qdrant");
            }
            IndexDriver::PostgreSQL => {
                eprintln!("Warning: PostgreSQL not accessible. Check index_store.url.");
            }
            IndexDriver::Memory => {}
        }
    }

    Ok(())
}
