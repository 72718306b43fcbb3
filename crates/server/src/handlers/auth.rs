//! Account signup and login.

use crate::auth::verify_token;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::format_timestamp;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use folio_metadata::models::UserRow;
use folio_metadata::repos::UserRepo;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Maximum username length.
const MAX_USERNAME_LEN: usize = 64;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(alias = "idToken")]
    pub id_token: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "idToken")]
    pub id_token: Option<String>,
}

/// Local user as returned to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: String,
}

pub fn user_to_response(user: UserRow) -> ApiResult<UserResponse> {
    Ok(UserResponse {
        id: user.user_id,
        created_at: format_timestamp(user.created_at, "created_at")?,
        username: user.username,
        email: user.email,
    })
}

/// The user plus the identity token the client should keep sending.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: UserResponse,
    pub token: String,
}

fn required(value: Option<String>, name: &str) -> ApiResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::InvalidInput(format!("missing required field: {name}")))
}

fn validate_username(username: &str) -> ApiResult<()> {
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ApiError::InvalidInput(format!(
            "username must be at most {MAX_USERNAME_LEN} characters"
        )));
    }
    if username.chars().any(char::is_control) {
        return Err(ApiError::InvalidInput(
            "username contains control characters".to_string(),
        ));
    }
    Ok(())
}

/// POST /api/auth/signup - Create the local user for a verified identity.
pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    let id_token = required(body.id_token, "idToken")?;
    let username = required(body.username, "username")?;
    validate_username(&username)?;

    let identity = verify_token(&state, &id_token).await?;

    if state.metadata.get_user_by_uid(&identity.uid).await?.is_some()
        || state
            .metadata
            .get_user_by_email(&identity.email)
            .await?
            .is_some()
        || state
            .metadata
            .get_user_by_username(&username)
            .await?
            .is_some()
    {
        return Err(ApiError::Conflict("user already exists".to_string()));
    }

    let user = UserRow {
        user_id: Uuid::new_v4(),
        uid: identity.uid,
        username,
        email: identity.email,
        created_at: OffsetDateTime::now_utc(),
    };
    // A concurrent signup can still hit the unique indexes; that surfaces as a conflict.
    state.metadata.create_user(&user).await?;
    tracing::info!(user_id = %user.user_id, uid = %user.uid, "User signed up");

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            user: user_to_response(user)?,
            token: id_token,
        }),
    ))
}

/// POST /api/auth/login - Resolve the local user for a verified identity.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let id_token = required(body.id_token, "idToken")?;
    let identity = verify_token(&state, &id_token).await?;

    let user = state
        .metadata
        .get_user_by_uid(&identity.uid)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;
    tracing::debug!(user_id = %user.user_id, "User logged in");

    Ok(Json(SessionResponse {
        user: user_to_response(user)?,
        token: id_token,
    }))
}
