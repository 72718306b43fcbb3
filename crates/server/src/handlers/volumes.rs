//! Volume endpoints.

use crate::auth::AdminUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{Envelope, MessageResponse, created, format_timestamp, ok, parse_id};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use folio_core::Slug;
use folio_metadata::models::VolumeRow;
use folio_metadata::repos::VolumeRepo;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Earliest accepted publication year.
const MIN_YEAR: i32 = 1900;

/// Volume as returned to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeResponse {
    pub id: Uuid,
    pub year: i32,
    pub name: String,
    pub slug: String,
    pub created_at: String,
}

pub fn volume_to_response(volume: VolumeRow) -> ApiResult<VolumeResponse> {
    Ok(VolumeResponse {
        id: volume.volume_id,
        year: volume.year,
        created_at: format_timestamp(volume.created_at, "created_at")?,
        name: volume.name,
        slug: volume.slug,
    })
}

fn volumes_to_response(volumes: Vec<VolumeRow>) -> ApiResult<Vec<VolumeResponse>> {
    volumes.into_iter().map(volume_to_response).collect()
}

#[derive(Debug, Deserialize)]
pub struct CreateVolumeRequest {
    pub year: i32,
    pub name: String,
    pub slug: String,
}

/// GET /api/volumes - List all volumes.
pub async fn list_volumes(
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<Vec<VolumeResponse>>>> {
    let volumes = state.metadata.list_volumes().await?;
    Ok(ok(volumes_to_response(volumes)?))
}

/// GET /api/volumes/{slug} - Get a volume by slug.
pub async fn get_volume(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Envelope<VolumeResponse>>> {
    let volume = state
        .metadata
        .get_volume_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("volume '{slug}'")))?;
    Ok(ok(volume_to_response(volume)?))
}

/// GET /api/admin/volumes - List all volumes.
pub async fn admin_list_volumes(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<Vec<VolumeResponse>>>> {
    let volumes = state.metadata.list_volumes().await?;
    Ok(ok(volumes_to_response(volumes)?))
}

/// POST /api/admin/volumes - Create a volume.
pub async fn create_volume(
    admin: AdminUser,
    State(state): State<AppState>,
    Json(body): Json<CreateVolumeRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<VolumeResponse>>)> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::InvalidInput("volume name is required".to_string()));
    }
    if body.year < MIN_YEAR {
        return Err(ApiError::InvalidInput(format!(
            "volume year must be {MIN_YEAR} or later"
        )));
    }
    let slug = Slug::new(body.slug)?;

    let now = OffsetDateTime::now_utc();
    let volume = VolumeRow {
        volume_id: Uuid::new_v4(),
        year: body.year,
        name: name.to_string(),
        slug: slug.into(),
        created_at: now,
        updated_at: now,
    };
    state.metadata.create_volume(&volume).await?;
    tracing::info!(
        volume_id = %volume.volume_id,
        year = volume.year,
        admin = %admin.user.username,
        "Volume created"
    );

    Ok(created(volume_to_response(volume)?))
}

/// DELETE /api/admin/volumes/{id} - Delete a volume without issues.
pub async fn delete_volume(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(volume_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let volume_id = parse_id(&volume_id, "volume")?;
    state.metadata.delete_volume(volume_id).await?;
    tracing::info!(volume_id = %volume_id, admin = %admin.user.username, "Volume deleted");
    Ok(MessageResponse::new("volume deleted"))
}
