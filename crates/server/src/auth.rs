//! Authentication and authorization middleware.

use crate::error::{ApiError, ApiResult, AuthFailure};
use crate::identity::{IdentityError, VerifiedIdentity};
use crate::metrics;
use crate::state::AppState;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use folio_metadata::models::UserRow;
use folio_metadata::repos::UserRepo;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use tracing::Instrument;
use uuid::Uuid;

/// Maximum length for trace IDs.
/// Longer trace IDs are truncated to prevent log bloat and potential log injection.
const MAX_TRACE_ID_LEN: usize = 128;

/// Trace ID for request correlation.
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generate a new random trace ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a trace ID from a client-provided value.
    /// The value is truncated to MAX_TRACE_ID_LEN characters and non-printable characters removed.
    pub fn from_client(value: &str) -> Self {
        // Limit by character count, not byte count, to stay on UTF-8 boundaries.
        let sanitized: String = value
            .chars()
            .take(MAX_TRACE_ID_LEN)
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .collect();

        if sanitized.is_empty() {
            Self::new()
        } else {
            Self(sanitized)
        }
    }

    /// Get the trace ID as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller whose bearer token was verified by the identity provider.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    /// Identity-provider subject id.
    pub uid: String,
    /// Email vouched for by the provider.
    pub email: String,
}

impl From<VerifiedIdentity> for AuthenticatedUser {
    fn from(identity: VerifiedIdentity) -> Self {
        Self {
            uid: identity.uid,
            email: identity.email,
        }
    }
}

/// Why the bearer token on a request was not accepted.
///
/// Recorded by [`auth_middleware`] and surfaced only by handlers that need a
/// caller, so public routes still serve requests carrying a stale token.
#[derive(Clone, Debug)]
pub enum TokenRejection {
    Unauthorized(AuthFailure),
    Unavailable(String),
    Internal(String),
}

impl From<ApiError> for TokenRejection {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized(failure) => Self::Unauthorized(failure),
            ApiError::Transient(message) => Self::Unavailable(message),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<TokenRejection> for ApiError {
    fn from(rejection: TokenRejection) -> Self {
        match rejection {
            TokenRejection::Unauthorized(failure) => ApiError::Unauthorized(failure),
            TokenRejection::Unavailable(message) => ApiError::Transient(message),
            TokenRejection::Internal(message) => ApiError::Internal(message),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(user.clone());
        }
        Err(parts
            .extensions
            .get::<TokenRejection>()
            .cloned()
            .map(ApiError::from)
            .unwrap_or(ApiError::Unauthorized(AuthFailure::NoToken)))
    }
}

/// Authenticated caller with a local user record and an administrator email.
#[derive(Clone, Debug)]
pub struct AdminUser {
    pub user: UserRow,
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = AuthenticatedUser::from_request_parts(parts, state).await?;

        let user = state
            .metadata
            .get_user_by_uid(&auth.uid)
            .await?
            .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;

        if !state.config.admin.is_admin_email(&user.email) {
            tracing::warn!(uid = %auth.uid, "Non-admin user attempted admin access");
            return Err(ApiError::Forbidden("admin access required".to_string()));
        }

        Ok(AdminUser { user })
    }
}

#[derive(Deserialize)]
struct JwtHeader {
    alg: Option<String>,
    kid: Option<String>,
}

#[derive(Deserialize)]
struct JwtClaims {
    exp: Option<i64>,
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Option<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Check a JWT's header (and `exp` claim, if readable) without verifying it.
///
/// Rejects tokens the identity provider would refuse anyway, without a
/// round trip.
pub fn inspect_jwt(token: &str, now: OffsetDateTime) -> Result<(), AuthFailure> {
    let mut segments = token.split('.');
    let header: JwtHeader = segments
        .next()
        .and_then(decode_segment)
        .ok_or(AuthFailure::InvalidTokenFormat)?;

    if header.alg.as_deref() != Some("RS256") {
        return Err(AuthFailure::InvalidAlgorithm);
    }
    if header.kid.as_deref().is_none_or(str::is_empty) {
        return Err(AuthFailure::MissingKid);
    }

    let exp = segments
        .next()
        .and_then(decode_segment::<JwtClaims>)
        .and_then(|claims| claims.exp);
    if let Some(exp) = exp
        && exp <= now.unix_timestamp()
    {
        return Err(AuthFailure::TokenExpired);
    }

    Ok(())
}

/// Verify a bearer token with the configured identity provider.
pub async fn verify_token(state: &AppState, token: &str) -> ApiResult<VerifiedIdentity> {
    if state.identity.issues_jwts() {
        inspect_jwt(token, OffsetDateTime::now_utc()).map_err(|failure| {
            tracing::warn!(reason = failure.as_str(), "Rejected malformed token");
            metrics::record_auth_failure(failure);
            ApiError::Unauthorized(failure)
        })?;
    }

    match state.identity.verify(token).await {
        Ok(identity) => Ok(identity),
        Err(IdentityError::Expired) => {
            metrics::record_auth_failure(AuthFailure::TokenExpired);
            Err(ApiError::Unauthorized(AuthFailure::TokenExpired))
        }
        Err(IdentityError::Invalid(message)) => {
            tracing::warn!(
                provider = state.identity.name(),
                error = %message,
                "Identity provider rejected token"
            );
            metrics::record_auth_failure(AuthFailure::InvalidToken);
            Err(ApiError::Unauthorized(AuthFailure::InvalidToken))
        }
        Err(IdentityError::Unavailable(message)) => Err(ApiError::Transient(message)),
        Err(IdentityError::Config(message)) => Err(ApiError::Internal(message)),
    }
}

/// Extract bearer token from Authorization header.
/// Per RFC 6750, the "Bearer" scheme is case-insensitive.
fn extract_bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            if v.len() >= 7 && v[..7].eq_ignore_ascii_case("bearer ") {
                Some(v[7..].trim())
            } else {
                None
            }
        })
        .filter(|token| !token.is_empty())
}

/// Extract trace ID from X-Trace-Id header or generate a new one.
fn extract_or_generate_trace_id(req: &Request) -> TraceId {
    req.headers()
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(TraceId::from_client)
        .unwrap_or_else(TraceId::new)
}

/// Authentication middleware that verifies bearer tokens and sets up trace context.
///
/// Requests never fail here. A verified token attaches an [`AuthenticatedUser`],
/// a rejected one a [`TokenRejection`]; handlers that need a caller use the
/// [`AuthenticatedUser`] or [`AdminUser`] extractors.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let trace_id = extract_or_generate_trace_id(&req);
    let span = tracing::info_span!("request", trace_id = %trace_id);
    req.extensions_mut().insert(trace_id);

    async move {
        if let Some(token) = extract_bearer_token(&req) {
            match verify_token(&state, token).await {
                Ok(identity) => {
                    tracing::debug!(uid = %identity.uid, "Token verified");
                    req.extensions_mut()
                        .insert(AuthenticatedUser::from(identity));
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Token not accepted, continuing unauthenticated");
                    req.extensions_mut().insert(TokenRejection::from(e));
                }
            }
        }
        next.run(req).await
    }
    .instrument(span)
    .await
}
