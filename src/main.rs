use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use hybrid_store::cli::commands::{
    handle_config, handle_delete, handle_download, handle_ingest, handle_query, handle_schema,
    handle_status, handle_upsert,
};
use hybrid_store::cli::{Cli, Commands};
use hybrid_store::models::{Config, OutputFormat};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("hybrid_store={}", default_level))),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .ok();

    let config = Config::load()?;

    tokio::select! {
        result = run_command(cli.command, &config, cli.format, cli.verbose) => {
            result?;
        }
        _ = shutdown_signal() => {
            eprintln!("\nReceived shutdown signal, cancelling...");
        }
    }

    Ok(())
}

async fn run_command(
    command: Commands,
    config: &Config,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    match command {
        Commands::Status => handle_status(config, format).await,
        Commands::Upsert(args) => handle_upsert(args, config, format, verbose).await,
        Commands::Query(args) => handle_query(args, config, format, verbose).await,
        Commands::Delete(args) => handle_delete(args, config, format).await,
        Commands::Schema { bucket } => handle_schema(&bucket, config, format).await,
        Commands::Ingest { bucket } => handle_ingest(&bucket, config, format).await,
        Commands::Download(args) => handle_download(args, config, format).await,
        Commands::Config(cmd) => handle_config(cmd, config, format).await,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
