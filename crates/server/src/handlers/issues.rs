//! Issue endpoints.

use crate::auth::AdminUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{Envelope, MessageResponse, created, format_timestamp, ok, parse_id};
use crate::handlers::volumes::{VolumeResponse, volume_to_response};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use folio_core::Slug;
use folio_metadata::models::IssueRow;
use folio_metadata::repos::{ArticleRepo, IssueRepo, VolumeRepo};
use folio_metadata::{PopulatedIssue, populate_issues};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Issue as returned to clients, with its volume populated.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub volume_id: Uuid,
    pub volume: Option<VolumeResponse>,
    pub created_at: String,
}

pub fn issue_to_response(populated: PopulatedIssue) -> ApiResult<IssueResponse> {
    let PopulatedIssue { issue, volume } = populated;
    Ok(IssueResponse {
        id: issue.issue_id,
        volume_id: issue.volume_id,
        volume: volume.map(volume_to_response).transpose()?,
        created_at: format_timestamp(issue.created_at, "created_at")?,
        name: issue.name,
        slug: issue.slug,
    })
}

async fn populated_issues(state: &AppState) -> ApiResult<Vec<IssueResponse>> {
    let issues = state.metadata.list_issues().await?;
    populate_issues(state.metadata.as_ref(), issues)
        .await?
        .into_iter()
        .map(issue_to_response)
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct CreateIssueRequest {
    pub name: String,
    pub slug: String,
    /// Id of the owning volume.
    pub volume: String,
}

/// GET /api/issues - List all issues.
pub async fn list_issues(
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<Vec<IssueResponse>>>> {
    Ok(ok(populated_issues(&state).await?))
}

/// GET /api/issues/{slug} - Get an issue by slug.
pub async fn get_issue(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Envelope<IssueResponse>>> {
    let issue = state
        .metadata
        .get_issue_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("issue '{slug}'")))?;
    let volume = state.metadata.get_volume(issue.volume_id).await?;
    Ok(ok(issue_to_response(PopulatedIssue { issue, volume })?))
}

/// GET /api/admin/issues - List all issues.
pub async fn admin_list_issues(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<Vec<IssueResponse>>>> {
    Ok(ok(populated_issues(&state).await?))
}

/// POST /api/admin/issues - Create an issue inside an existing volume.
pub async fn create_issue(
    admin: AdminUser,
    State(state): State<AppState>,
    Json(body): Json<CreateIssueRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<IssueResponse>>)> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::InvalidInput("issue name is required".to_string()));
    }
    let slug = Slug::new(body.slug)?;
    let volume_id = parse_id(&body.volume, "volume")?;
    let volume = state
        .metadata
        .get_volume(volume_id)
        .await?
        .ok_or_else(|| ApiError::InvalidInput(format!("volume {volume_id} does not exist")))?;

    let now = OffsetDateTime::now_utc();
    let issue = IssueRow {
        issue_id: Uuid::new_v4(),
        volume_id,
        name: name.to_string(),
        slug: slug.into(),
        created_at: now,
        updated_at: now,
    };
    state.metadata.create_issue(&issue).await?;
    tracing::info!(
        issue_id = %issue.issue_id,
        volume_id = %volume_id,
        admin = %admin.user.username,
        "Issue created"
    );

    Ok(created(issue_to_response(PopulatedIssue {
        issue,
        volume: Some(volume),
    })?))
}

/// DELETE /api/admin/issues/{id} - Delete an issue and every article in it.
///
/// The files of each article are detached first; failures there leave
/// orphaned objects but never stop the delete.
pub async fn delete_issue(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(issue_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let issue_id = parse_id(&issue_id, "issue")?;
    state
        .metadata
        .get_issue(issue_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("issue {issue_id}")))?;

    for article in state.metadata.list_articles_by_issue(issue_id).await? {
        state
            .files
            .detach_all(&format!("article {}", article.article_id), &article.files())
            .await;
    }

    let articles = state.metadata.delete_issue(issue_id).await?;
    tracing::info!(
        issue_id = %issue_id,
        articles,
        admin = %admin.user.username,
        "Issue deleted with its articles"
    );
    Ok(MessageResponse::new(
        "issue and associated articles deleted",
    ))
}
