//! Application state shared across handlers.

use crate::files::FileStore;
use crate::identity::IdentityProvider;
use crate::session::SessionStore;
use folio_core::config::AppConfig;
use folio_metadata::MetadataStore;
use folio_storage::ObjectStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Object storage backend.
    pub storage: Arc<dyn ObjectStore>,
    /// Metadata store.
    pub metadata: Arc<dyn MetadataStore>,
    /// Bearer token verification.
    pub identity: Arc<dyn IdentityProvider>,
    /// Client sessions and their counter ledgers.
    pub sessions: SessionStore,
    /// Record file lifecycle over `storage`.
    pub files: FileStore,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Logs a warning for every potentially dangerous configuration setting.
    /// Configuration errors are expected to have been rejected by the caller.
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        if let Ok(warnings) = config.validate() {
            for warning in warnings {
                tracing::warn!("Configuration warning: {}", warning);
            }
        }

        let sessions = SessionStore::new(config.session.ttl());
        let files = FileStore::new(storage.clone(), config.upload.retry_policy());

        Self {
            config: Arc::new(config),
            storage,
            metadata,
            identity,
            sessions,
            files,
        }
    }

    /// Replace the file store, e.g. to swap the retry timer.
    pub fn with_files(mut self, files: FileStore) -> Self {
        self.files = files;
        self
    }
}
