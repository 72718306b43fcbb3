//! Manuscript submission endpoints for authenticated authors.

use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{
    DownloadQuery, FileResponse, MessageResponse, MultipartForm, format_timestamp, parse_id,
};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use folio_core::{CoAuthor, FileKind, SubmissionStatus};
use folio_metadata::models::{Json as DbJson, SubmissionRow};
use folio_metadata::repos::SubmissionRepo;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// Multipart field carrying the manuscript.
const MANUSCRIPT_FIELD: &str = "manuscriptFile";

/// Submission as returned to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    pub id: Uuid,
    pub user_id: String,
    pub corresponding_author: String,
    pub author_email: String,
    pub author_affiliation: String,
    pub author_country: String,
    pub co_authors: Vec<CoAuthor>,
    pub paper_title: String,
    pub paper_abstract: String,
    pub keywords: String,
    pub paper_type: String,
    pub subject_area: String,
    pub manuscript: FileResponse,
    pub copyright_agreement: bool,
    pub ethics_agreement: bool,
    pub status: SubmissionStatus,
    pub created_at: String,
    pub updated_at: String,
}

pub fn submission_to_response(submission: SubmissionRow) -> ApiResult<SubmissionResponse> {
    let manuscript = FileResponse::from(submission.manuscript());
    let status = submission.status();
    Ok(SubmissionResponse {
        id: submission.submission_id,
        created_at: format_timestamp(submission.created_at, "created_at")?,
        updated_at: format_timestamp(submission.updated_at, "updated_at")?,
        user_id: submission.user_id,
        corresponding_author: submission.author_name,
        author_email: submission.email,
        author_affiliation: submission.affiliation,
        author_country: submission.country,
        co_authors: submission.co_authors.0,
        paper_title: submission.paper_title,
        paper_abstract: submission.abstract_text,
        keywords: submission.keywords,
        paper_type: submission.paper_type,
        subject_area: submission.subject_area,
        manuscript,
        copyright_agreement: submission.copyright_agreement,
        ethics_agreement: submission.ethics_agreement,
        status,
    })
}

pub fn submissions_to_response(
    submissions: Vec<SubmissionRow>,
) -> ApiResult<Vec<SubmissionResponse>> {
    submissions.into_iter().map(submission_to_response).collect()
}

/// Show a submission, or stream its manuscript when `?download=true`.
pub async fn show_or_stream(
    state: &AppState,
    submission: SubmissionRow,
    query: &DownloadQuery,
) -> ApiResult<Response> {
    if query.requested() {
        return state
            .files
            .stream(FileKind::Manuscript, &submission.manuscript())
            .await;
    }
    Ok(Json(submission_to_response(submission)?).into_response())
}

/// Detach the manuscript, then remove the record.
pub async fn remove_submission(state: &AppState, submission: &SubmissionRow) -> ApiResult<()> {
    state
        .files
        .detach_all(
            &format!("submission {}", submission.submission_id),
            &[(FileKind::Manuscript, submission.manuscript())],
        )
        .await;
    state
        .metadata
        .delete_submission(submission.submission_id)
        .await?;
    Ok(())
}

/// Response to a new submission.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubmissionResponse {
    pub message: String,
    pub submission_id: Uuid,
    pub manuscript_url: String,
}

/// POST /api/submissions - Submit a manuscript.
pub async fn create_submission(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<CreateSubmissionResponse>)> {
    let mut form = MultipartForm::parse(
        multipart,
        &[MANUSCRIPT_FIELD],
        state.config.server.max_file_size,
    )
    .await?;

    let author_name = form.required("correspondingAuthor")?;
    let email = form.required("authorEmail")?;
    let affiliation = form.required("authorAffiliation")?;
    let country = form.required("authorCountry")?;
    let paper_title = form.required("paperTitle")?;
    let abstract_text = form.required("paperAbstract")?;
    let keywords = form.required("keywords")?;
    let paper_type = form.required("paperType")?;
    let subject_area = form.required("subjectArea")?;
    form.require_true("copyrightAgreement")?;
    form.require_true("ethicsAgreement")?;
    let co_authors = CoAuthor::parse_list(&form.optional("coAuthors").unwrap_or_default())?;

    let manuscript = form.take_file(MANUSCRIPT_FIELD).ok_or_else(|| {
        ApiError::InvalidInput(format!("field '{MANUSCRIPT_FIELD}' is required"))
    })?;
    manuscript.ensure_kind(FileKind::Manuscript, MANUSCRIPT_FIELD)?;

    let file = state
        .files
        .attach(
            FileKind::Manuscript,
            manuscript.data,
            &manuscript.file_name,
            &manuscript.content_type,
        )
        .await?;

    let now = OffsetDateTime::now_utc();
    let submission = SubmissionRow {
        submission_id: Uuid::new_v4(),
        user_id: user.uid,
        author_name,
        email,
        affiliation,
        country,
        co_authors: DbJson(co_authors),
        paper_title,
        abstract_text,
        keywords,
        paper_type,
        subject_area,
        manuscript_url: file.url.clone(),
        manuscript_file_name: file.file_name,
        manuscript_content_type: file.content_type,
        copyright_agreement: true,
        ethics_agreement: true,
        status: SubmissionStatus::Pending.as_str().to_string(),
        created_at: now,
        updated_at: now,
    };
    state.metadata.create_submission(&submission).await?;
    tracing::info!(
        submission_id = %submission.submission_id,
        uid = %submission.user_id,
        "Submission created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateSubmissionResponse {
            message: "submission created".to_string(),
            submission_id: submission.submission_id,
            manuscript_url: file.url,
        }),
    ))
}

/// Load a submission owned by `user`. Someone else's submission reads as missing.
async fn owned_submission(
    state: &AppState,
    user: &AuthenticatedUser,
    raw_id: &str,
) -> ApiResult<SubmissionRow> {
    let submission_id = parse_id(raw_id, "submission")?;
    state
        .metadata
        .get_submission(submission_id)
        .await?
        .filter(|s| s.user_id == user.uid)
        .ok_or_else(|| ApiError::NotFound(format!("submission {submission_id}")))
}

/// GET /api/submissions - The caller's submissions.
pub async fn list_my_submissions(
    user: AuthenticatedUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<SubmissionResponse>>> {
    let submissions = state.metadata.list_submissions_by_user(&user.uid).await?;
    Ok(Json(submissions_to_response(submissions)?))
}

/// GET /api/submissions/{id} - One of the caller's submissions, or its manuscript.
pub async fn get_my_submission(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> ApiResult<Response> {
    let submission = owned_submission(&state, &user, &submission_id).await?;
    show_or_stream(&state, submission, &query).await
}

/// DELETE /api/submissions/{id} - Withdraw one of the caller's submissions.
pub async fn delete_my_submission(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let submission = owned_submission(&state, &user, &submission_id).await?;
    remove_submission(&state, &submission).await?;
    tracing::info!(
        submission_id = %submission.submission_id,
        uid = %user.uid,
        "Submission withdrawn"
    );
    Ok(MessageResponse::new("submission deleted"))
}
