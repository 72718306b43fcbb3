//! Submission repository trait.

use crate::error::MetadataResult;
use crate::models::SubmissionRow;
use async_trait::async_trait;
use folio_core::SubmissionStatus;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for manuscript submissions.
#[async_trait]
pub trait SubmissionRepo: Send + Sync {
    /// Create a submission.
    async fn create_submission(&self, submission: &SubmissionRow) -> MetadataResult<()>;

    /// Get a submission by ID.
    async fn get_submission(&self, submission_id: Uuid) -> MetadataResult<Option<SubmissionRow>>;

    /// List every submission, newest first.
    async fn list_submissions(&self) -> MetadataResult<Vec<SubmissionRow>>;

    /// List the submissions of one author, newest first.
    async fn list_submissions_by_user(&self, user_id: &str) -> MetadataResult<Vec<SubmissionRow>>;

    /// Set the editorial status and return the updated record.
    async fn update_submission_status(
        &self,
        submission_id: Uuid,
        status: SubmissionStatus,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<SubmissionRow>;

    /// Delete a submission.
    async fn delete_submission(&self, submission_id: Uuid) -> MetadataResult<()>;
}
