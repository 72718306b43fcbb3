//! Core domain types and shared logic for the Folio journal backend.
//!
//! This crate defines the data model used across all other crates:
//! - Article slugs and analytics counter metrics
//! - Submission status and co-author lists
//! - Storage keys and public references for attached files
//! - Bounded retry with exponential backoff
//! - Application configuration

pub mod config;
pub mod error;
pub mod files;
pub mod metric;
pub mod retry;
pub mod slug;
pub mod submission;

pub use error::{Error, Result};
pub use files::{ExternalFileRef, FileKind, build_storage_key, key_from_reference};
pub use metric::CounterMetric;
pub use retry::{RetryError, RetryPolicy, Sleeper, TokioSleeper, with_retry};
pub use slug::Slug;
pub use submission::{CoAuthor, SubmissionStatus};

/// Default maximum size of a single uploaded file: 10 MiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
