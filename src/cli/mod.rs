//! Command-line interface for the hybrid document store.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Store documents in a bucket and search them through a vector index.
#[derive(Debug, Parser)]
#[command(name = "hybrid-store")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(long, short = 'f', global = true, default_value_t = OutputFormat::Text, help = "Output format: text or json")]
    pub format: OutputFormat,

    #[arg(long, short = 'v', global = true, help = "Enable verbose (debug) output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check blob store, index store and embedding provider connectivity
    Status,

    /// Upload files to the bucket and index their text
    Upsert(commands::UpsertArgs),

    /// Semantic search over indexed chunks
    Query(commands::QueryArgs),

    /// Delete documents by id, by metadata filter, or everything
    Delete(commands::DeleteArgs),

    /// Create an index class describing the objects of a bucket
    Schema {
        /// Bucket name
        bucket: String,
    },

    /// Index every object already stored in a bucket
    Ingest {
        /// Bucket name
        bucket: String,
    },

    /// Download a stored object to a local file
    Download(commands::DownloadArgs),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;

    #[test]
    fn test_parse_query_with_filters() {
        let cli = Cli::parse_from([
            "hybrid-store", "query", "hello", "-k", "5", "--source", "email", "--format", "json",
        ]);
        assert_eq!(cli.format, OutputFormat::Json);
        let Commands::Query(args) = cli.command else {
            panic!("expected query command");
        };
        assert_eq!(args.queries, ["hello"]);
        assert_eq!(args.top_k, 5);
        assert_eq!(args.filter.source, Some(Source::Email));
    }

    #[test]
    fn test_parse_delete_ids() {
        let cli = Cli::parse_from(["hybrid-store", "delete", "--id", "a", "--id", "b", "-y"]);
        let Commands::Delete(args) = cli.command else {
            panic!("expected delete command");
        };
        assert_eq!(args.ids, ["a", "b"]);
        assert!(args.force);
        assert!(!args.all);
    }

    #[test]
    fn test_parse_config_init_force_with_format() {
        let cli = Cli::parse_from(["hybrid-store", "-f", "json", "config", "init", "--force"]);
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(
            cli.command,
            Commands::Config(commands::ConfigCommand::Init { force: true })
        ));
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
