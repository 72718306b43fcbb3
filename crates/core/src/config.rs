//! Configuration types shared across crates.

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Browser origins allowed by CORS. Requests without an Origin header are
    /// always accepted.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    /// Maximum size in bytes of a single uploaded file.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    /// SECURITY: When enabled, restrict this endpoint to the scraper at the
    /// network level.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

fn default_max_file_size() -> u64 {
    crate::DEFAULT_MAX_FILE_SIZE
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            allowed_origins: default_allowed_origins(),
            max_file_size: default_max_file_size(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl ServerConfig {
    /// Validate server configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_file_size == 0 {
            return Err("server.max_file_size must be greater than 0".to_string());
        }
        if let Some(origin) = self
            .allowed_origins
            .iter()
            .find(|o| !(o.starts_with("http://") || o.starts_with("https://")))
        {
            return Err(format!(
                "server.allowed_origins entry '{origin}' must start with http:// or https://"
            ));
        }
        Ok(())
    }

    /// Request body limit: one file plus room for the accompanying form fields.
    pub fn body_limit(&self) -> usize {
        let limit = self.max_file_size.saturating_mul(2).saturating_add(1024 * 1024);
        usize::try_from(limit).unwrap_or(usize::MAX)
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for storage.
        path: PathBuf,
        /// Base URL under which `path` is served. Public references are
        /// `{public_base_url}/{key}`.
        #[serde(default = "default_filesystem_public_base_url")]
        public_base_url: String,
    },
    /// S3-compatible storage.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Optional key prefix.
        prefix: Option<String>,
        /// AWS access key ID. Falls back to the ambient credential chain if not set.
        /// WARNING: Prefer env vars or IAM roles over storing secrets in config files.
        access_key_id: Option<String>,
        /// AWS secret access key. Falls back to the ambient credential chain if not set.
        /// WARNING: Prefer env vars or IAM roles over storing secrets in config files.
        secret_access_key: Option<String>,
        /// Force path-style URLs (`endpoint/bucket/key` instead of `bucket.endpoint/key`).
        /// Required for MinIO and some S3-compatible services.
        #[serde(default)]
        force_path_style: bool,
        /// Base URL for public references. Defaults to the bucket URL derived
        /// from endpoint, region and addressing style.
        public_base_url: Option<String>,
        /// Apply a `public-read` ACL after upload. Leave disabled for buckets
        /// that enforce object ownership and grant public reads by policy.
        #[serde(default)]
        public_acl: bool,
    },
}

fn default_filesystem_public_base_url() -> String {
    "http://127.0.0.1:5000/files".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/storage"),
            public_base_url: default_filesystem_public_base_url(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::S3 {
                bucket,
                access_key_id,
                secret_access_key,
                ..
            } => {
                if bucket.trim().is_empty() {
                    return Err("s3 config requires a non-empty bucket".to_string());
                }
                match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                    (Some(_), Some(_)) | (None, None) => Ok(()),
                    _ => Err(
                        "s3 config requires both access_key_id and secret_access_key when either is set"
                            .to_string(),
                    ),
                }
            }
            StorageConfig::Filesystem {
                public_base_url, ..
            } => {
                if public_base_url.trim().is_empty() {
                    return Err("filesystem config requires a public_base_url".to_string());
                }
                Ok(())
            }
        }
    }
}

/// PostgreSQL SSL mode configuration.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PgSslMode {
    /// Disable SSL/TLS entirely.
    Disable,
    /// Prefer SSL/TLS but allow unencrypted connections (default).
    #[default]
    Prefer,
    /// Require SSL/TLS for all connections.
    Require,
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database (recommended for development and small deployments).
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
    /// PostgreSQL database.
    Postgres {
        /// Connection URL (optional if using individual fields).
        /// Takes precedence over individual fields if both are provided.
        url: Option<String>,
        /// Database host.
        host: Option<String>,
        /// Database port (default: 5432).
        #[serde(default = "default_pg_port")]
        port: Option<u16>,
        /// Database username.
        username: Option<String>,
        /// Database password.
        /// WARNING: Prefer FOLIO_METADATA__PASSWORD over storing it in config.
        password: Option<String>,
        /// Database name.
        database: Option<String>,
        /// SSL mode for connections.
        ssl_mode: Option<PgSslMode>,
        /// Maximum connections in the pool.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Statement timeout in milliseconds.
        #[serde(default = "default_statement_timeout_ms")]
        statement_timeout_ms: Option<u64>,
    },
}

fn default_max_connections() -> u32 {
    10
}

fn default_pg_port() -> Option<u16> {
    Some(5432)
}

fn default_statement_timeout_ms() -> Option<u64> {
    Some(30_000)
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/folio.db"),
        }
    }
}

impl MetadataConfig {
    /// Validate metadata configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            MetadataConfig::Sqlite { .. } => Ok(()),
            MetadataConfig::Postgres {
                url,
                host,
                database,
                ..
            } => match (url.as_ref(), host.as_ref(), database.as_ref()) {
                (Some(_), _, _) => Ok(()),
                (None, Some(_), Some(_)) => Ok(()),
                (None, None, _) => {
                    Err("postgres config requires either 'url' or 'host' + 'database'".to_string())
                }
                (None, Some(_), None) => Err(
                    "postgres config requires 'database' when using individual fields".to_string(),
                ),
            },
        }
    }
}

/// A literal token accepted by the static identity provider.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StaticIdentity {
    /// Bearer token presented by the client.
    pub token: String,
    /// Subject identifier returned on verification.
    pub uid: String,
    /// Email returned on verification.
    pub email: String,
}

/// Identity provider configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IdentityConfig {
    /// Firebase Authentication (Identity Toolkit REST API).
    Firebase {
        /// Web API key of the Firebase project.
        api_key: String,
        /// Identity Toolkit base URL.
        #[serde(default = "default_firebase_endpoint")]
        endpoint: String,
        /// Timeout for a single verification request.
        #[serde(default = "default_identity_timeout_secs")]
        timeout_secs: u64,
    },
    /// Fixed token table. For development and tests only.
    Static {
        #[serde(default)]
        users: Vec<StaticIdentity>,
    },
}

fn default_firebase_endpoint() -> String {
    "https://identitytoolkit.googleapis.com".to_string()
}

fn default_identity_timeout_secs() -> u64 {
    10
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self::Static { users: Vec::new() }
    }
}

impl IdentityConfig {
    /// Validate identity configuration. Returns warnings for settings that are
    /// allowed but unsafe in production.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        match self {
            IdentityConfig::Firebase {
                api_key,
                timeout_secs,
                ..
            } => {
                if api_key.trim().is_empty() {
                    return Err("identity.api_key is required for the firebase provider".to_string());
                }
                if *timeout_secs == 0 {
                    return Err("identity.timeout_secs cannot be 0".to_string());
                }
                Ok(Vec::new())
            }
            IdentityConfig::Static { .. } => Ok(vec![
                "identity.type=static accepts literal bearer tokens. \
                 Use it for development and tests only."
                    .to_string(),
            ]),
        }
    }
}

/// Session cookie and counter ledger configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Name of the session cookie.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Idle time in seconds after which a session and its ledger are dropped.
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,
    /// Interval in seconds between sweeps of idle sessions.
    #[serde(default = "default_session_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
    /// Mark the cookie `Secure` (HTTPS only).
    #[serde(default)]
    pub secure: bool,
}

fn default_cookie_name() -> String {
    "folio_session".to_string()
}

fn default_session_ttl_secs() -> u64 {
    86_400 // 24 hours
}

fn default_session_cleanup_interval_secs() -> u64 {
    300
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            ttl_secs: default_session_ttl_secs(),
            cleanup_interval_secs: default_session_cleanup_interval_secs(),
            secure: false,
        }
    }
}

impl SessionConfig {
    /// Session idle timeout.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Interval between idle-session sweeps.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Validate session configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.cookie_name.is_empty()
            || !self
                .cookie_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(format!(
                "session.cookie_name '{}' must be non-empty and use only [A-Za-z0-9_-]",
                self.cookie_name
            ));
        }
        if self.ttl_secs == 0 {
            return Err("session.ttl_secs cannot be 0".to_string());
        }
        // tokio::time::interval panics on a zero period
        if self.cleanup_interval_secs == 0 {
            return Err("session.cleanup_interval_secs cannot be 0".to_string());
        }
        Ok(())
    }
}

/// Upload retry configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Retries after the first failed attempt.
    #[serde(default = "default_upload_max_retries")]
    pub max_retries: u32,
    /// Wait before the first retry, in milliseconds.
    #[serde(default = "default_upload_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Multiplier applied to the wait after each retry.
    #[serde(default = "default_upload_backoff_factor")]
    pub backoff_factor: u32,
    /// Upper bound for a single wait, in milliseconds.
    #[serde(default = "default_upload_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_upload_max_retries() -> u32 {
    3
}

fn default_upload_base_delay_ms() -> u64 {
    100
}

fn default_upload_backoff_factor() -> u32 {
    2
}

fn default_upload_max_delay_ms() -> u64 {
    1000
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_retries: default_upload_max_retries(),
            base_delay_ms: default_upload_base_delay_ms(),
            backoff_factor: default_upload_backoff_factor(),
            max_delay_ms: default_upload_max_delay_ms(),
        }
    }
}

impl UploadConfig {
    /// Retry policy for object uploads.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.saturating_add(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            backoff_factor: self.backoff_factor,
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    /// Validate upload configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.backoff_factor == 0 {
            return Err("upload.backoff_factor must be at least 1".to_string());
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(format!(
                "upload.base_delay_ms ({}) exceeds upload.max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            ));
        }
        Ok(())
    }
}

/// Administrator configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Verified emails granted administrator rights.
    #[serde(default)]
    pub emails: Vec<String>,
}

impl AdminConfig {
    /// Whether `email` belongs to an administrator (case-insensitive).
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.emails.iter().any(|e| e.eq_ignore_ascii_case(email))
    }

    /// Create a test configuration with a single administrator.
    ///
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self {
            emails: vec!["editor@folio.test".to_string()],
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Metadata store configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Identity provider configuration.
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Session configuration.
    #[serde(default)]
    pub session: SessionConfig,
    /// Upload retry configuration.
    #[serde(default)]
    pub upload: UploadConfig,
    /// Administrator configuration.
    #[serde(default)]
    pub admin: AdminConfig,
}

impl AppConfig {
    /// Validate every section. Returns warnings for settings that are allowed
    /// but unsafe, and an error for the first invalid section.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        self.server.validate()?;
        self.storage.validate()?;
        self.metadata.validate()?;
        self.session.validate()?;
        self.upload.validate()?;
        let mut warnings = self.identity.validate()?;
        if self.admin.emails.is_empty() {
            warnings.push(
                "admin.emails is empty. No account can use the administration endpoints."
                    .to_string(),
            );
        }
        Ok(warnings)
    }

    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses filesystem storage, SQLite metadata and the
    /// static identity provider with no users.
    pub fn for_testing() -> Self {
        Self {
            admin: AdminConfig::for_testing(),
            ..Self::default()
        }
    }
}
