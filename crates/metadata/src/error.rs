//! Metadata store error types.

use thiserror::Error;

/// Metadata store operation errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MetadataError {
    /// Map an INSERT failure, turning unique violations into `AlreadyExists`.
    pub(crate) fn on_insert(err: sqlx::Error, what: impl Into<String>) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                MetadataError::AlreadyExists(what.into())
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                MetadataError::Constraint(format!("{}: {}", what.into(), db.message()))
            }
            _ => MetadataError::Database(err),
        }
    }

    /// Whether the store itself is unavailable (as opposed to a bad request).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MetadataError::Database(
                sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::WorkerCrashed
            )
        )
    }
}

impl From<std::io::Error> for MetadataError {
    fn from(e: std::io::Error) -> Self {
        MetadataError::Config(e.to_string())
    }
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_transient() {
        assert!(MetadataError::Database(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!MetadataError::NotFound("x".to_string()).is_transient());
        assert!(!MetadataError::Database(sqlx::Error::RowNotFound).is_transient());
    }

    #[test]
    fn test_io_error_maps_to_config() {
        let err: MetadataError = std::io::Error::other("no such dir").into();
        assert!(matches!(err, MetadataError::Config(_)));
    }
}
