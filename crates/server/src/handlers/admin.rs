//! Administrative endpoints for users and submissions.
//!
//! Every handler here takes an [`AdminUser`], so the caller has already been
//! verified and matched against the configured administrator emails.

use crate::auth::AdminUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::auth::{UserResponse, user_to_response};
use crate::handlers::common::{DownloadQuery, MessageResponse, parse_id};
use crate::handlers::submissions::{
    SubmissionResponse, remove_submission, show_or_stream, submission_to_response,
    submissions_to_response,
};
use crate::identity::IdentityError;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use folio_core::SubmissionStatus;
use folio_metadata::models::SubmissionRow;
use folio_metadata::repos::{SubmissionRepo, UserRepo};
use time::OffsetDateTime;

/// GET /api/admin/users - All local users.
pub async fn list_users(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<UserResponse>>> {
    let users = state.metadata.list_users().await?;
    let users = users
        .into_iter()
        .map(user_to_response)
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(users))
}

/// DELETE /api/admin/users/{id} - Remove a user at the identity provider, then locally.
///
/// The local record is kept when the provider refuses the deletion.
pub async fn delete_user(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let user_id = parse_id(&user_id, "user")?;
    if user_id == admin.user.user_id {
        return Err(ApiError::InvalidInput(
            "administrators cannot delete their own account".to_string(),
        ));
    }

    let user = state
        .metadata
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {user_id}")))?;

    state
        .identity
        .delete_account(&user.uid)
        .await
        .map_err(|e| {
            tracing::error!(
                uid = %user.uid,
                provider = state.identity.name(),
                error = %e,
                "Failed to delete account at identity provider"
            );
            match e {
                IdentityError::Unavailable(message) => ApiError::Transient(message),
                other => ApiError::Internal(format!(
                    "failed to delete account at identity provider: {other}"
                )),
            }
        })?;

    state.metadata.delete_user(user_id).await?;
    tracing::info!(user_id = %user_id, uid = %user.uid, admin = %admin.user.email, "User deleted");
    Ok(MessageResponse::new("user deleted"))
}

async fn load_submission(state: &AppState, raw_id: &str) -> ApiResult<SubmissionRow> {
    let submission_id = parse_id(raw_id, "submission")?;
    state
        .metadata
        .get_submission(submission_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("submission {submission_id}")))
}

/// GET /api/admin/submissions - Every submission, newest first.
pub async fn admin_list_submissions(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<SubmissionResponse>>> {
    let submissions = state.metadata.list_submissions().await?;
    Ok(Json(submissions_to_response(submissions)?))
}

/// GET /api/admin/submissions/{id} - One submission, or its manuscript with `?download=true`.
pub async fn admin_get_submission(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> ApiResult<Response> {
    let submission = load_submission(&state, &submission_id).await?;
    show_or_stream(&state, submission, &query).await
}

/// DELETE /api/admin/submissions/{id}
pub async fn admin_delete_submission(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let submission = load_submission(&state, &submission_id).await?;
    remove_submission(&state, &submission).await?;
    tracing::info!(
        submission_id = %submission.submission_id,
        admin = %admin.user.email,
        "Submission deleted by administrator"
    );
    Ok(MessageResponse::new("submission deleted"))
}

async fn decide(
    admin: &AdminUser,
    state: &AppState,
    raw_id: &str,
    status: SubmissionStatus,
) -> ApiResult<Json<SubmissionResponse>> {
    let submission_id = parse_id(raw_id, "submission")?;
    let submission = state
        .metadata
        .update_submission_status(submission_id, status, OffsetDateTime::now_utc())
        .await?;
    tracing::info!(
        submission_id = %submission_id,
        status = %status,
        admin = %admin.user.email,
        "Submission status updated"
    );
    Ok(Json(submission_to_response(submission)?))
}

/// PATCH /api/admin/submissions/{id}/approve
pub async fn approve_submission(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
) -> ApiResult<Json<SubmissionResponse>> {
    decide(&admin, &state, &submission_id, SubmissionStatus::Approved).await
}

/// PATCH /api/admin/submissions/{id}/reject
pub async fn reject_submission(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
) -> ApiResult<Json<SubmissionResponse>> {
    decide(&admin, &state, &submission_id, SubmissionStatus::Rejected).await
}
