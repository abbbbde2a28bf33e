use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};

const MASK: &str = "********";

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Write a default configuration file")]
    Init {
        #[arg(long, help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show the effective configuration (file + environment)")]
    Show,
    #[command(about = "Show the configuration file path")]
    Path,
}

pub async fn handle_config(cmd: ConfigCommand, config: &Config, format: OutputFormat) -> Result<()> {
    match cmd {
        ConfigCommand::Init { force } => handle_init(force, format),
        ConfigCommand::Show => handle_show(config, format),
        ConfigCommand::Path => handle_path(),
    }
}

fn handle_init(force: bool, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let path = Config::config_path()
        .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;

    if path.exists() && !force {
        anyhow::bail!(
            "Config already exists at: {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let path = Config::default().save().context("failed to write config")?;
    println!(
        "{}",
        formatter.format_message(&format!("Created config at: {}", path.display()))
    );
    Ok(())
}

fn handle_show(config: &Config, format: OutputFormat) -> Result<()> {
    let masked = masked(config);
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&masked)?),
        OutputFormat::Text => print!("{}", toml::to_string_pretty(&masked)?),
    }
    Ok(())
}

fn handle_path() -> Result<()> {
    match Config::config_path() {
        Some(path) if path.exists() => println!("Config (active): {}", path.display()),
        Some(path) => println!("Config (would be): {}", path.display()),
        None => println!("Config: no config directory on this platform"),
    }

    if let Ok(cwd) = std::env::current_dir() {
        let env_path = cwd.join(".env");
        if env_path.exists() {
            println!(".env file (active): {}", env_path.display());
        }
    }
    Ok(())
}

/// Copy of the config with credentials replaced.
fn masked(config: &Config) -> Config {
    let mut config = config.clone();
    let mask = |value: &mut Option<String>| {
        if value.is_some() {
            *value = Some(MASK.to_string());
        }
    };
    mask(&mut config.blob_store.access_key);
    mask(&mut config.blob_store.secret_key);
    mask(&mut config.index_store.api_key);
    mask(&mut config.embedding.api_key);
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_hides_credentials() {
        let mut config = Config::default();
        config.blob_store.secret_key = Some("minio-secret".into());
        config.embedding.api_key = Some("sk-live".into());

        let masked = masked(&config);
        assert_eq!(masked.blob_store.secret_key.as_deref(), Some(MASK));
        assert_eq!(masked.embedding.api_key.as_deref(), Some(MASK));
        assert!(masked.blob_store.access_key.is_none());
        assert_eq!(masked.blob_store.bucket, config.blob_store.bucket);
    }
}
