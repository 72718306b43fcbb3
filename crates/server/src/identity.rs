//! Identity providers that turn a bearer token into a verified subject.

use async_trait::async_trait;
use dashmap::DashMap;
use folio_core::config::{IdentityConfig, StaticIdentity};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Subject vouched for by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedIdentity {
    /// Provider-scoped subject id.
    pub uid: String,
    /// Email address of the subject.
    pub email: String,
}

/// Identity verification errors.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("identity provider unavailable: {0}")]
    Unavailable(String),

    #[error("identity configuration error: {0}")]
    Config(String),
}

/// Verifies opaque bearer tokens.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify a token and return the subject it belongs to.
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityError>;

    /// Remove the account `uid` at the provider.
    async fn delete_account(&self, uid: &str) -> Result<(), IdentityError>;

    /// Whether tokens are JWTs whose header can be checked before `verify`.
    fn issues_jwts(&self) -> bool {
        true
    }

    /// Provider name for logs.
    fn name(&self) -> &'static str;
}

/// Build the identity provider described by the configuration.
pub fn from_config(config: &IdentityConfig) -> Result<Arc<dyn IdentityProvider>, IdentityError> {
    match config {
        IdentityConfig::Firebase {
            api_key,
            endpoint,
            timeout_secs,
        } => Ok(Arc::new(FirebaseIdentity::new(
            api_key,
            endpoint,
            Duration::from_secs(*timeout_secs),
        )?)),
        IdentityConfig::Static { users } => Ok(Arc::new(StaticIdentityProvider::new(users))),
    }
}

/// Firebase Authentication through the Identity Toolkit `accounts:lookup`
/// and `accounts:delete` APIs.
pub struct FirebaseIdentity {
    client: reqwest::Client,
    lookup_url: String,
    delete_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    email: Option<String>,
}

#[derive(Deserialize)]
struct ProviderErrorResponse {
    error: ProviderErrorBody,
}

#[derive(Deserialize)]
struct ProviderErrorBody {
    message: String,
}

impl FirebaseIdentity {
    /// Create a client for the Identity Toolkit at `endpoint`.
    pub fn new(api_key: &str, endpoint: &str, timeout: Duration) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            lookup_url: format!("{}/v1/accounts:lookup", endpoint.trim_end_matches('/')),
            delete_url: format!("{}/v1/accounts:delete", endpoint.trim_end_matches('/')),
            api_key: api_key.to_string(),
        })
    }

    async fn post(
        &self,
        url: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, IdentityError> {
        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(IdentityError::Unavailable(format!(
                "identity provider returned {status}"
            )));
        }
        if !status.is_success() {
            let message = response
                .json::<ProviderErrorResponse>()
                .await
                .map(|body| body.error.message)
                .unwrap_or_else(|_| status.to_string());
            if message.starts_with("TOKEN_EXPIRED") {
                return Err(IdentityError::Expired);
            }
            return Err(IdentityError::Invalid(message));
        }
        Ok(response)
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let response = self
            .post(&self.lookup_url, serde_json::json!({ "idToken": token }))
            .await?;

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Unavailable(format!("malformed lookup response: {e}")))?;
        let user = body
            .users
            .into_iter()
            .next()
            .ok_or_else(|| IdentityError::Invalid("no account for token".to_string()))?;
        let email = user
            .email
            .ok_or_else(|| IdentityError::Invalid("account has no email".to_string()))?;

        Ok(VerifiedIdentity {
            uid: user.local_id,
            email,
        })
    }

    async fn delete_account(&self, uid: &str) -> Result<(), IdentityError> {
        self.post(&self.delete_url, serde_json::json!({ "localId": uid }))
            .await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "firebase"
    }
}

/// Fixed table of literal tokens. For development and tests.
pub struct StaticIdentityProvider {
    users: DashMap<String, VerifiedIdentity>,
}

impl StaticIdentityProvider {
    pub fn new(users: &[StaticIdentity]) -> Self {
        let users = users
            .iter()
            .map(|u| {
                (
                    u.token.clone(),
                    VerifiedIdentity {
                        uid: u.uid.clone(),
                        email: u.email.clone(),
                    },
                )
            })
            .collect();
        Self { users }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        self.users
            .get(token)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| IdentityError::Invalid("unknown token".to_string()))
    }

    async fn delete_account(&self, uid: &str) -> Result<(), IdentityError> {
        let before = self.users.len();
        self.users.retain(|_, identity| identity.uid != uid);
        if self.users.len() == before {
            return Err(IdentityError::Invalid(format!("no account for uid '{uid}'")));
        }
        Ok(())
    }

    fn issues_jwts(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
