//! Shared handler helpers.

use crate::error::{ApiError, ApiResult};
use axum::Json;
use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use bytes::{Bytes, BytesMut};
use folio_core::{ExternalFileRef, FileKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// Success envelope used by the journal API: `{ "status": 200, "data": ... }`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: u16,
    pub data: T,
}

/// `200 OK` with the data wrapped in an [`Envelope`].
pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        status: StatusCode::OK.as_u16(),
        data,
    })
}

/// `201 Created` with the data wrapped in an [`Envelope`].
pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<Envelope<T>>) {
    (
        StatusCode::CREATED,
        Json(Envelope {
            status: StatusCode::CREATED.as_u16(),
            data,
        }),
    )
}

/// Plain acknowledgement body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// `?download=true` switch on record lookups.
#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    #[serde(default)]
    pub download: Option<String>,
}

impl DownloadQuery {
    pub fn requested(&self) -> bool {
        self.download.as_deref() == Some("true")
    }
}

/// Reference to a stored file as returned to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResponse {
    pub url: String,
    pub file_name: String,
    pub content_type: String,
}

impl From<ExternalFileRef> for FileResponse {
    fn from(file: ExternalFileRef) -> Self {
        Self {
            url: file.url,
            file_name: file.file_name,
            content_type: file.content_type,
        }
    }
}

pub fn format_timestamp(ts: OffsetDateTime, field: &str) -> ApiResult<String> {
    ts.format(&Rfc3339)
        .map_err(|e| ApiError::Internal(format!("failed to format {field}: {e}")))
}

/// Parse a record id from a path segment.
pub fn parse_id(raw: &str, what: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| ApiError::InvalidInput(format!("invalid {what} ID: {e}")))
}

/// A file received in a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl UploadedFile {
    /// Reject files whose declared content type does not fit `kind`.
    pub fn ensure_kind(&self, kind: FileKind, field: &str) -> ApiResult<()> {
        if kind.accepts(&self.content_type) {
            Ok(())
        } else {
            Err(ApiError::InvalidInput(format!(
                "field '{field}' has unsupported content type '{}'",
                self.content_type
            )))
        }
    }
}

/// Text fields and files of a `multipart/form-data` body.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

fn multipart_error(e: MultipartError, max_file_size: u64) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::FileTooLarge {
            limit: max_file_size,
        }
    } else {
        ApiError::InvalidInput(format!("invalid multipart body: {e}"))
    }
}

impl MultipartForm {
    /// Read the whole form. Fields named in `file_fields` are kept as files
    /// and may not exceed `max_file_size`; everything else is read as text.
    pub async fn parse(
        mut multipart: Multipart,
        file_fields: &[&str],
        max_file_size: u64,
    ) -> ApiResult<Self> {
        let mut form = Self::default();
        while let Some(mut field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e, max_file_size))?
        {
            let Some(name) = field.name().map(str::to_owned) else {
                return Err(ApiError::InvalidInput(
                    "multipart field without a name".to_string(),
                ));
            };

            if !file_fields.contains(&name.as_str()) {
                let value = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, max_file_size))?;
                form.fields.insert(name, value);
                continue;
            }

            let file_name = field
                .file_name()
                .map(str::to_owned)
                .filter(|n| !n.trim().is_empty())
                .ok_or_else(|| {
                    ApiError::InvalidInput(format!("field '{name}' must be a file"))
                })?;
            let content_type = field
                .content_type()
                .map(str::to_owned)
                .unwrap_or_else(|| "application/octet-stream".to_string());

            let mut data = BytesMut::new();
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|e| multipart_error(e, max_file_size))?
            {
                if (data.len() + chunk.len()) as u64 > max_file_size {
                    return Err(ApiError::FileTooLarge {
                        limit: max_file_size,
                    });
                }
                data.extend_from_slice(&chunk);
            }

            form.files.insert(
                name,
                UploadedFile {
                    file_name,
                    content_type,
                    data: data.freeze(),
                },
            );
        }
        Ok(form)
    }

    /// Trimmed, non-empty text field.
    pub fn optional(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    }

    pub fn required(&self, name: &str) -> ApiResult<String> {
        self.optional(name)
            .ok_or_else(|| ApiError::InvalidInput(format!("field '{name}' is required")))
    }

    /// A field that must be the literal string `true`.
    pub fn require_true(&self, name: &str) -> ApiResult<()> {
        if self.optional(name).as_deref() == Some("true") {
            Ok(())
        } else {
            Err(ApiError::InvalidInput(format!("field '{name}' must be accepted")))
        }
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}
