//! Server test utilities.

use super::storage::FaultyStore;
use async_trait::async_trait;
use folio_core::Sleeper;
use folio_core::config::{AppConfig, IdentityConfig, MetadataConfig, StaticIdentity, StorageConfig};
use folio_metadata::models::UserRow;
use folio_metadata::repos::UserRepo;
use folio_metadata::{MetadataStore, SqliteStore};
use folio_server::files::FileStore;
use folio_server::{AppState, create_router};
use folio_storage::{FilesystemBackend, ObjectStore};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use time::OffsetDateTime;
use uuid::Uuid;

/// Bearer token of a signed-up author.
pub const AUTHOR_TOKEN: &str = "author-token";
pub const AUTHOR_UID: &str = "author-uid";
pub const AUTHOR_EMAIL: &str = "ada@folio.test";

/// Bearer token of a second author.
pub const OTHER_AUTHOR_TOKEN: &str = "other-author-token";
pub const OTHER_AUTHOR_UID: &str = "other-author-uid";

/// Bearer token of the configured administrator.
pub const ADMIN_TOKEN: &str = "admin-token";
pub const ADMIN_UID: &str = "admin-uid";
pub const ADMIN_EMAIL: &str = "editor@folio.test";

/// Public base URL of test storage.
pub const PUBLIC_BASE_URL: &str = "http://files.folio.test";

/// Records backoff waits instead of sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    pub waits: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.waits
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(duration);
    }
}

fn static_users() -> Vec<StaticIdentity> {
    [
        (AUTHOR_TOKEN, AUTHOR_UID, AUTHOR_EMAIL),
        (OTHER_AUTHOR_TOKEN, OTHER_AUTHOR_UID, "grace@folio.test"),
        (ADMIN_TOKEN, ADMIN_UID, ADMIN_EMAIL),
    ]
    .into_iter()
    .map(|(token, uid, email)| StaticIdentity {
        token: token.to_string(),
        uid: uid.to_string(),
        email: email.to_string(),
    })
    .collect()
}

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub storage: Arc<FaultyStore>,
    pub sleeper: Arc<RecordingSleeper>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage and the static users.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let storage_path = temp_dir.path().join("storage");
        let backend: Arc<dyn ObjectStore> = Arc::new(
            FilesystemBackend::new(&storage_path, PUBLIC_BASE_URL)
                .await
                .expect("Failed to create storage backend"),
        );
        let storage = Arc::new(FaultyStore::new(backend));

        let db_path = temp_dir.path().join("metadata.db");
        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(&db_path)
                .await
                .expect("Failed to create metadata store"),
        );

        let mut config = AppConfig::for_testing();
        config.storage = StorageConfig::Filesystem {
            path: storage_path,
            public_base_url: PUBLIC_BASE_URL.to_string(),
        };
        config.metadata = MetadataConfig::Sqlite { path: db_path };
        config.identity = IdentityConfig::Static {
            users: static_users(),
        };
        modifier(&mut config);

        let identity = folio_server::identity::from_config(&config.identity)
            .expect("Failed to create identity provider");

        let sleeper = Arc::new(RecordingSleeper::default());
        let object_store: Arc<dyn ObjectStore> = storage.clone();
        let files = FileStore::new(object_store.clone(), config.upload.retry_policy())
            .with_sleeper(sleeper.clone());
        let state = AppState::new(config, object_store, metadata, identity).with_files(files);

        Self::create_user(&state, AUTHOR_UID, "ada", AUTHOR_EMAIL).await;
        Self::create_user(&state, OTHER_AUTHOR_UID, "grace", "grace@folio.test").await;
        Self::create_user(&state, ADMIN_UID, "editor", ADMIN_EMAIL).await;

        let router = create_router(state.clone());

        Self {
            router,
            state,
            storage,
            sleeper,
            _temp_dir: temp_dir,
        }
    }

    /// Insert a local user record.
    pub async fn create_user(state: &AppState, uid: &str, username: &str, email: &str) -> UserRow {
        let user = UserRow {
            user_id: Uuid::new_v4(),
            uid: uid.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        state
            .metadata
            .create_user(&user)
            .await
            .expect("Failed to create test user");
        user
    }

    /// Get access to the underlying metadata.
    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.state.metadata.clone()
    }
}
