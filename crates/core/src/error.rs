//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid slug: {0}")]
    InvalidSlug(String),

    #[error("invalid counter metric: {0}")]
    InvalidMetric(String),

    #[error("invalid submission status: {0}")]
    InvalidStatus(String),

    #[error("invalid file reference: {0}")]
    InvalidFileRef(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
