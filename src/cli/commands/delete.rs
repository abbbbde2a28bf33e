use anyhow::{Context, Result};
use clap::Args;

use super::FilterArgs;
use crate::cli::output::get_formatter;
use crate::models::{Config, DeleteRequest, OutputFormat};
use crate::services::HybridDataStore;

#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Document ids to delete from the index and the bucket
    #[arg(long = "id")]
    pub ids: Vec<String>,

    /// Delete every indexed chunk (blob objects are kept)
    #[arg(long)]
    pub all: bool,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Skip confirmation prompt
    #[arg(long, short = 'y')]
    pub force: bool,
}

impl DeleteArgs {
    fn to_request(&self) -> DeleteRequest {
        DeleteRequest {
            ids: (!self.ids.is_empty()).then(|| self.ids.clone()),
            filter: self.filter.to_filter(),
            delete_all: self.all,
        }
    }
}

pub async fn handle_delete(args: DeleteArgs, config: &Config, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let request = args.to_request();

    if request.selector().is_none() {
        anyhow::bail!("specify --id, --all, or at least one filter flag");
    }

    if (request.delete_all || request.filter.is_some()) && !args.force {
        let scope = if request.delete_all {
            "ALL indexed chunks"
        } else {
            "every indexed chunk matching the filter"
        };
        println!("This will delete {}. Continue? [y/N]", scope);
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("{}", formatter.format_message("Cancelled."));
            return Ok(());
        }
    }

    let store = HybridDataStore::from_config(config)
        .await
        .context("failed to initialize stores")?;
    let report = store
        .delete_with_report(&request)
        .await
        .context("delete failed")?;

    print!("{}", formatter.format_delete(&report));
    Ok(())
}
