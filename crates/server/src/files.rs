//! Files owned by journal records.
//!
//! A record and its file live in different stores with no transaction across
//! them. Uploads happen first, with bounded retry, and only then may the
//! caller write the record. Deleting removes the object best-effort and
//! always lets the caller remove the record, leaving an orphaned object
//! behind when storage refuses.

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use axum::body::Body;
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use folio_core::{
    ExternalFileRef, FileKind, RetryPolicy, Sleeper, TokioSleeper, build_storage_key,
    key_from_reference, with_retry,
};
use folio_storage::{ObjectStore, StorageError};
use futures::StreamExt;
use std::sync::Arc;

/// Result of removing a record's object from storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The object was already gone.
    NotFoundUpstream,
    /// The object may still exist; it is orphaned once the record is removed.
    Failed(String),
}

impl DeleteOutcome {
    /// Log the outcome for the record `owner`.
    pub fn log(&self, owner: &str, kind: FileKind, file: &ExternalFileRef) {
        match self {
            Self::Deleted => {
                tracing::debug!(owner, kind = %kind, url = %file.url, "Deleted stored file");
            }
            Self::NotFoundUpstream => {
                tracing::info!(owner, kind = %kind, url = %file.url, "Stored file was already gone");
            }
            Self::Failed(reason) => {
                metrics::record_delete_failure(kind);
                tracing::warn!(
                    owner,
                    kind = %kind,
                    url = %file.url,
                    error = %reason,
                    "Failed to delete stored file, object is orphaned"
                );
            }
        }
    }
}

/// Attaches, detaches and streams record files.
#[derive(Clone)]
pub struct FileStore {
    storage: Arc<dyn ObjectStore>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl FileStore {
    pub fn new(storage: Arc<dyn ObjectStore>, policy: RetryPolicy) -> Self {
        Self {
            storage,
            policy,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the timer used between upload attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Upload `data` under a fresh key for `kind` and make it public.
    ///
    /// The put and the publish step are retried together. When every attempt
    /// fails the caller must not write a record.
    pub async fn attach(
        &self,
        kind: FileKind,
        data: Bytes,
        original_name: &str,
        content_type: &str,
    ) -> ApiResult<ExternalFileRef> {
        let key = build_storage_key(kind, original_name);
        let size = data.len();
        let storage = self.storage.as_ref();
        let key_ref = key.as_str();

        let result = with_retry(
            &self.policy,
            self.sleeper.as_ref(),
            "attach_file",
            |attempt| {
                let data = data.clone();
                async move {
                    if attempt > 1 {
                        metrics::UPLOAD_RETRIES.inc();
                    }
                    storage.put(key_ref, data, content_type).await?;
                    storage.make_public(key_ref).await?;
                    Ok::<_, StorageError>(())
                }
            },
        )
        .await;

        match result {
            Ok(()) => {
                metrics::FILES_ATTACHED.with_label_values(&[kind.as_str()]).inc();
                tracing::info!(kind = %kind, key = %key, size, "Attached file");
                Ok(ExternalFileRef {
                    url: self.storage.public_url(&key),
                    file_name: original_name.to_string(),
                    content_type: content_type.to_string(),
                })
            }
            Err(err) => {
                metrics::UPLOAD_FAILURES.with_label_values(&[kind.as_str()]).inc();
                tracing::error!(
                    kind = %kind,
                    key = %key,
                    attempts = err.attempts,
                    error = %err.source,
                    "Giving up on file upload"
                );
                Err(ApiError::UploadFailed {
                    attempts: err.attempts,
                    reason: err.source.to_string(),
                })
            }
        }
    }

    /// Delete the object behind `file`. Never fails; the outcome says what happened.
    pub async fn detach(&self, kind: FileKind, file: &ExternalFileRef) -> DeleteOutcome {
        let key = match key_from_reference(kind, &file.url) {
            Ok(key) => key,
            Err(e) => return DeleteOutcome::Failed(e.to_string()),
        };
        match self.storage.delete(&key).await {
            Ok(()) => DeleteOutcome::Deleted,
            Err(e) if e.is_not_found() => DeleteOutcome::NotFoundUpstream,
            Err(e) => DeleteOutcome::Failed(e.to_string()),
        }
    }

    /// Detach every file of the record `owner`, logging each outcome.
    pub async fn detach_all(
        &self,
        owner: &str,
        files: &[(FileKind, ExternalFileRef)],
    ) -> Vec<DeleteOutcome> {
        let mut outcomes = Vec::with_capacity(files.len());
        for (kind, file) in files {
            let outcome = self.detach(*kind, file).await;
            outcome.log(owner, *kind, file);
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Stream the object behind `file` as a download.
    ///
    /// A missing object is [`ApiError::FileNotFound`], distinct from a missing
    /// record. Errors after the headers are sent abort the body.
    pub async fn stream(&self, kind: FileKind, file: &ExternalFileRef) -> ApiResult<Response> {
        let missing = || ApiError::FileNotFound(file.file_name.clone());
        let key = key_from_reference(kind, &file.url).map_err(|_| missing())?;

        let meta = self.storage.head(&key).await.map_err(|e| {
            if e.is_not_found() {
                missing()
            } else {
                ApiError::Storage(e)
            }
        })?;
        let stream = self.storage.get_stream(&key).await.map_err(|e| {
            if e.is_not_found() {
                missing()
            } else {
                ApiError::Storage(e)
            }
        })?;

        let stream_key = key.clone();
        let body = Body::from_stream(stream.map(move |chunk| {
            chunk.map_err(|e| {
                tracing::warn!(key = %stream_key, error = %e, "File stream aborted");
                std::io::Error::other(e.to_string())
            })
        }));

        Ok((
            StatusCode::OK,
            [
                (CONTENT_TYPE, file.content_type.clone()),
                (CONTENT_DISPOSITION, attachment_disposition(&file.file_name)),
                (CONTENT_LENGTH, meta.size.to_string()),
            ],
            body,
        )
            .into_response())
    }
}

/// `Content-Disposition` value naming the original file.
fn attachment_disposition(file_name: &str) -> String {
    let quoted: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("attachment; filename=\"{quoted}\"")
}
