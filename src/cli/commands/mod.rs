mod bucket;
mod config;
mod delete;
mod download;
mod filter;
mod query;
mod status;
mod upsert;

pub use config::ConfigCommand;
pub use delete::DeleteArgs;
pub use download::DownloadArgs;
pub use filter::FilterArgs;
pub use query::QueryArgs;
pub use upsert::UpsertArgs;

pub use bucket::{handle_ingest, handle_schema};
pub use config::handle_config;
pub use delete::handle_delete;
pub use download::handle_download;
pub use query::handle_query;
pub use status::handle_status;
pub use upsert::handle_upsert;
