//! Article endpoints: public reads, session counters and administration.

use crate::auth::AdminUser;
use crate::counter::bump;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{
    DownloadQuery, Envelope, FileResponse, MessageResponse, MultipartForm, UploadedFile, created,
    format_timestamp, ok, parse_id,
};
use crate::handlers::issues::{IssueResponse, issue_to_response};
use crate::handlers::volumes::{VolumeResponse, volume_to_response};
use crate::session::Session;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use folio_core::{CounterMetric, ExternalFileRef, FileKind, Slug};
use folio_metadata::models::ArticleRow;
use folio_metadata::repos::{ArticleRepo, IssueRepo};
use folio_metadata::{PopulatedArticle, PopulatedIssue, populate_articles};
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// Multipart fields carrying article files.
const FILE_FIELDS: [&str; 2] = ["image", "pdf"];

/// Article as returned to clients, with volume and issue populated.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleResponse {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub slug: String,
    pub issn: Option<String>,
    pub doi: Option<String>,
    pub image: Option<FileResponse>,
    pub pdf: Option<FileResponse>,
    pub featured: bool,
    pub read_count: i64,
    pub download_count: i64,
    pub volume_id: Uuid,
    pub issue_id: Uuid,
    pub volume: Option<VolumeResponse>,
    pub issue: Option<IssueResponse>,
    pub created_at: String,
    pub updated_at: String,
}

pub fn article_to_response(populated: PopulatedArticle) -> ApiResult<ArticleResponse> {
    let PopulatedArticle {
        article,
        volume,
        issue,
    } = populated;
    let image = article.image().map(FileResponse::from);
    let pdf = article.pdf().map(FileResponse::from);
    let issue = issue
        .map(|issue| {
            issue_to_response(PopulatedIssue {
                issue,
                volume: None,
            })
        })
        .transpose()?;

    Ok(ArticleResponse {
        id: article.article_id,
        created_at: format_timestamp(article.created_at, "created_at")?,
        updated_at: format_timestamp(article.updated_at, "updated_at")?,
        title: article.title,
        author: article.author,
        abstract_text: article.abstract_text,
        slug: article.slug,
        issn: article.issn,
        doi: article.doi,
        image,
        pdf,
        featured: article.featured,
        read_count: article.read_count,
        download_count: article.download_count,
        volume_id: article.volume_id,
        issue_id: article.issue_id,
        volume: volume.map(volume_to_response).transpose()?,
        issue,
    })
}

async fn populate_one(state: &AppState, article: ArticleRow) -> ApiResult<ArticleResponse> {
    let populated = populate_articles(state.metadata.as_ref(), vec![article])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Internal("populate returned no article".to_string()))?;
    article_to_response(populated)
}

async fn populated_articles(state: &AppState) -> ApiResult<Vec<ArticleResponse>> {
    let articles = state.metadata.list_articles().await?;
    populate_articles(state.metadata.as_ref(), articles)
        .await?
        .into_iter()
        .map(article_to_response)
        .collect()
}

async fn article_by_slug(state: &AppState, slug: &str) -> ApiResult<ArticleRow> {
    state
        .metadata
        .get_article_by_slug(slug)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("article '{slug}'")))
}

async fn article_by_id(state: &AppState, raw_id: &str) -> ApiResult<ArticleRow> {
    let article_id = parse_id(raw_id, "article")?;
    state
        .metadata
        .get_article(article_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("article {article_id}")))
}

// =============================================================================
// Public
// =============================================================================

/// GET /api/articles - List all articles.
pub async fn list_articles(
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<Vec<ArticleResponse>>>> {
    Ok(ok(populated_articles(&state).await?))
}

/// GET /api/articles/{slug} - Get an article by slug.
pub async fn get_article(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Envelope<ArticleResponse>>> {
    let article = article_by_slug(&state, &slug).await?;
    Ok(ok(populate_one(&state, article).await?))
}

/// Counter value after a bump.
#[derive(Debug, Serialize)]
pub struct CounterResponse {
    pub slug: String,
    pub metric: CounterMetric,
    pub value: i64,
}

async fn bump_counter(
    state: &AppState,
    session: &Session,
    slug: String,
    metric: CounterMetric,
) -> ApiResult<Json<Envelope<CounterResponse>>> {
    let value = bump(state.metadata.as_ref(), session.ledger.as_ref(), &slug, metric).await?;
    tracing::debug!(session = %session.id, slug = %slug, metric = %metric, value, "Counter bumped");
    Ok(ok(CounterResponse {
        slug,
        metric,
        value,
    }))
}

/// POST /api/articles/{slug}/read - Count a read, once per session.
pub async fn record_read(
    State(state): State<AppState>,
    session: Session,
    Path(slug): Path<String>,
) -> ApiResult<Json<Envelope<CounterResponse>>> {
    bump_counter(&state, &session, slug, CounterMetric::ReadCount).await
}

/// POST /api/articles/{slug}/download - Count a download, once per session.
pub async fn record_download(
    State(state): State<AppState>,
    session: Session,
    Path(slug): Path<String>,
) -> ApiResult<Json<Envelope<CounterResponse>>> {
    bump_counter(&state, &session, slug, CounterMetric::DownloadCount).await
}

// =============================================================================
// Administration
// =============================================================================

/// GET /api/admin/articles - List all articles.
pub async fn admin_list_articles(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<Vec<ArticleResponse>>>> {
    Ok(ok(populated_articles(&state).await?))
}

/// GET /api/admin/articles/{slug} - Get an article by slug.
pub async fn admin_get_article(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Envelope<ArticleResponse>>> {
    let article = article_by_slug(&state, &slug).await?;
    Ok(ok(populate_one(&state, article).await?))
}

/// Attach `file` as `kind`, after checking its content type.
async fn attach_upload(
    state: &AppState,
    kind: FileKind,
    field: &str,
    file: UploadedFile,
) -> ApiResult<ExternalFileRef> {
    file.ensure_kind(kind, field)?;
    state
        .files
        .attach(kind, file.data, &file.file_name, &file.content_type)
        .await
}

/// POST /api/admin/articles - Create an article from a multipart form.
///
/// Text fields: `title`, `slug`, `volume`, `issue` (required), `author`,
/// `abstract`, `issn`, `doi`. Files: `image` and/or `pdf`, at least one.
pub async fn create_article(
    admin: AdminUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Envelope<ArticleResponse>>)> {
    let mut form =
        MultipartForm::parse(multipart, &FILE_FIELDS, state.config.server.max_file_size).await?;

    let image = form.take_file("image");
    let pdf = form.take_file("pdf");
    if image.is_none() && pdf.is_none() {
        return Err(ApiError::InvalidInput(
            "at least one file (image or pdf) is required".to_string(),
        ));
    }

    let title = form.required("title")?;
    let slug: String = Slug::new(form.required("slug")?)?.into();
    let volume_id = parse_id(&form.required("volume")?, "volume")?;
    let issue_id = parse_id(&form.required("issue")?, "issue")?;

    let issue = state
        .metadata
        .get_issue(issue_id)
        .await?
        .ok_or_else(|| ApiError::InvalidInput(format!("issue {issue_id} does not exist")))?;
    if issue.volume_id != volume_id {
        return Err(ApiError::InvalidInput(format!(
            "issue {issue_id} does not belong to volume {volume_id}"
        )));
    }
    if state.metadata.get_article_by_slug(&slug).await?.is_some() {
        return Err(ApiError::Conflict(format!("article '{slug}' already exists")));
    }

    let now = OffsetDateTime::now_utc();
    let mut article = ArticleRow {
        article_id: Uuid::new_v4(),
        volume_id,
        issue_id,
        title,
        author: form.optional("author").unwrap_or_default(),
        abstract_text: form.optional("abstract").unwrap_or_default(),
        slug,
        issn: form.optional("issn"),
        doi: form.optional("doi"),
        image_url: None,
        image_file_name: None,
        image_content_type: None,
        pdf_url: None,
        pdf_file_name: None,
        pdf_content_type: None,
        featured: false,
        read_count: 0,
        download_count: 0,
        created_at: now,
        updated_at: now,
    };

    if let Some(image) = image {
        let file = attach_upload(&state, FileKind::ArticleImage, "image", image).await?;
        article.set_image(&file);
    }
    if let Some(pdf) = pdf {
        match attach_upload(&state, FileKind::ArticlePdf, "pdf", pdf).await {
            Ok(file) => article.set_pdf(&file),
            Err(e) => {
                // Nothing will reference the image already uploaded for this article.
                state
                    .files
                    .detach_all(&format!("article {}", article.article_id), &article.files())
                    .await;
                return Err(e);
            }
        }
    }

    state.metadata.create_article(&article).await?;
    tracing::info!(
        article_id = %article.article_id,
        slug = %article.slug,
        admin = %admin.user.username,
        "Article created"
    );

    Ok(created(populate_one(&state, article).await?))
}

/// GET /api/admin/articles/{id}/download?download=true - Stream the article PDF.
pub async fn download_article_pdf(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(article_id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> ApiResult<Response> {
    let article = article_by_id(&state, &article_id).await?;
    let pdf = match (query.requested(), article.pdf()) {
        (true, Some(pdf)) => pdf,
        _ => {
            return Err(ApiError::InvalidInput(
                "no PDF available for download".to_string(),
            ));
        }
    };
    state.files.stream(FileKind::ArticlePdf, &pdf).await
}

/// DELETE /api/admin/articles/{id} - Delete an article and its files.
pub async fn delete_article(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(article_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let article = article_by_id(&state, &article_id).await?;

    state
        .files
        .detach_all(&format!("article {}", article.article_id), &article.files())
        .await;
    state.metadata.delete_article(article.article_id).await?;
    tracing::info!(
        article_id = %article.article_id,
        admin = %admin.user.username,
        "Article deleted"
    );
    Ok(MessageResponse::new("article deleted"))
}

/// PUT /api/admin/articles/featured/{id} - Make this the only featured article.
pub async fn set_featured_article(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(article_id): Path<String>,
) -> ApiResult<Json<Envelope<ArticleResponse>>> {
    let article_id = parse_id(&article_id, "article")?;
    let article = state.metadata.set_featured(article_id).await?;
    tracing::info!(article_id = %article_id, admin = %admin.user.username, "Featured article set");
    Ok(ok(populate_one(&state, article).await?))
}
