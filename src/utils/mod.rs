//! Utility modules.

pub mod file;
pub mod retry;

pub use file::{collect_files, is_text_file, object_name_for, read_file_content};
pub use retry::{RetryConfig, RetryResult, Retryable, with_retry};
