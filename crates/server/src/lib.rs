//! HTTP API server for the Folio journal backend.
//!
//! This crate provides the HTTP surface:
//! - Public catalogue of volumes, issues and articles
//! - Session-deduplicated read and download counters
//! - Manuscript submissions for signed-in authors
//! - Editorial administration of users, submissions and the catalogue
//! - File attach, detach and streaming over object storage

pub mod auth;
pub mod counter;
pub mod error;
pub mod files;
pub mod handlers;
pub mod identity;
pub mod metrics;
pub mod routes;
pub mod session;
pub mod state;

pub use auth::{AdminUser, AuthenticatedUser, TraceId};
pub use counter::bump;
pub use error::ApiError;
pub use files::{DeleteOutcome, FileStore};
pub use routes::create_router;
pub use session::{CounterLedger, MemoryLedger, SessionStore};
pub use state::AppState;
