use anyhow::{Context, Result};
use clap::Args;
use std::time::Instant;

use super::FilterArgs;
use crate::cli::output::get_formatter;
use crate::models::{Config, DEFAULT_TOP_K, OutputFormat, Query};
use crate::services::HybridDataStore;

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Query text (repeat to run several queries in one batch)
    #[arg(required = true)]
    pub queries: Vec<String>,

    /// Number of results per query
    #[arg(long, short = 'k', default_value_t = DEFAULT_TOP_K)]
    pub top_k: u32,

    #[command(flatten)]
    pub filter: FilterArgs,
}

pub async fn handle_query(
    args: QueryArgs,
    config: &Config,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    if args.queries.iter().any(|q| q.trim().is_empty()) {
        anyhow::bail!("query text cannot be empty");
    }
    if args.top_k == 0 {
        anyhow::bail!("top_k must be at least 1");
    }

    let formatter = get_formatter(format);
    let filter = args.filter.to_filter();

    let queries: Vec<Query> = args
        .queries
        .iter()
        .map(|text| {
            let query = Query::new(text.trim()).with_top_k(args.top_k);
            match &filter {
                Some(filter) => query.with_filter(filter.clone()),
                None => query,
            }
        })
        .collect();

    let store = HybridDataStore::from_config(config)
        .await
        .context("failed to initialize stores")?;

    let start = Instant::now();
    let results = store.query(queries).await.context("query failed")?;

    if verbose {
        eprintln!("Query took {}ms", start.elapsed().as_millis());
    }

    print!("{}", formatter.format_query_results(&results));
    Ok(())
}
