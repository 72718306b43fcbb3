//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Finer-grained cause, for authentication failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

/// Why a request could not be authenticated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthFailure {
    /// No bearer token was sent.
    NoToken,
    /// The token is not a decodable JWT.
    InvalidTokenFormat,
    /// The token is signed with something other than RS256.
    InvalidAlgorithm,
    /// The token header has no key id.
    MissingKid,
    /// The token has expired.
    TokenExpired,
    /// The identity provider rejected the token.
    InvalidToken,
}

impl AuthFailure {
    /// Machine-readable reason.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoToken => "no_token",
            Self::InvalidTokenFormat => "invalid_token_format",
            Self::InvalidAlgorithm => "invalid_algorithm",
            Self::MissingKid => "missing_kid",
            Self::TokenExpired => "token_expired",
            Self::InvalidToken => "invalid_token",
        }
    }

    fn message(self) -> &'static str {
        match self {
            Self::NoToken => "no token provided",
            Self::InvalidTokenFormat => "invalid token format, please log in again",
            Self::InvalidAlgorithm => "invalid token algorithm, expected RS256",
            Self::MissingKid => "token missing key id, please log in again",
            Self::TokenExpired => "token has expired, please log in again",
            Self::InvalidToken => "invalid token, please log in again",
        }
    }
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    /// The record exists but its stored file does not.
    #[error("file not found in storage: {0}")]
    FileNotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unauthorized: {0}")]
    Unauthorized(AuthFailure),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("file too large: the limit is {limit} bytes")]
    FileTooLarge { limit: u64 },

    #[error("upload failed after {attempts} attempts: {reason}")]
    UploadFailed { attempts: u32, reason: String },

    #[error("service temporarily unavailable: {0}")]
    Transient(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("storage error: {0}")]
    Storage(#[from] folio_storage::StorageError),

    #[error("metadata error: {0}")]
    Metadata(#[from] folio_metadata::MetadataError),

    #[error("{0}")]
    Core(#[from] folio_core::Error),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        use folio_metadata::MetadataError;
        match self {
            Self::NotFound(_) => "not_found",
            Self::FileNotFound(_) => "file_not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::Conflict(_) => "conflict",
            Self::FileTooLarge { .. } => "file_too_large",
            Self::UploadFailed { .. } => "upload_failed",
            Self::Transient(_) => "transient_store_error",
            Self::Internal(_) => "internal_error",
            Self::Storage(e) if e.is_not_found() => "file_not_found",
            Self::Storage(_) => "storage_error",
            Self::Metadata(e) => match e {
                MetadataError::NotFound(_) => "not_found",
                MetadataError::AlreadyExists(_) | MetadataError::Constraint(_) => "conflict",
                e if e.is_transient() => "transient_store_error",
                _ => "metadata_error",
            },
            Self::Core(_) => "invalid_input",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        use folio_metadata::MetadataError;
        match self {
            Self::NotFound(_) | Self::FileNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UploadFailed { .. } => StatusCode::BAD_GATEWAY,
            Self::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Storage(e) => match e {
                folio_storage::StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Metadata(e) => match e {
                MetadataError::NotFound(_) => StatusCode::NOT_FOUND,
                MetadataError::AlreadyExists(_) => StatusCode::CONFLICT,
                MetadataError::Constraint(_) => StatusCode::CONFLICT,
                e if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Core(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn reason(&self) -> Option<&'static str> {
        match self {
            Self::Unauthorized(failure) => Some(failure.as_str()),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        }
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
            reason: self.reason(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
