//! Issue repository trait.

use crate::error::MetadataResult;
use crate::models::IssueRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for issues.
#[async_trait]
pub trait IssueRepo: Send + Sync {
    /// Create an issue. The referenced volume must exist.
    async fn create_issue(&self, issue: &IssueRow) -> MetadataResult<()>;

    /// Get an issue by ID.
    async fn get_issue(&self, issue_id: Uuid) -> MetadataResult<Option<IssueRow>>;

    /// Get an issue by slug.
    async fn get_issue_by_slug(&self, slug: &str) -> MetadataResult<Option<IssueRow>>;

    /// List all issues, newest first.
    async fn list_issues(&self) -> MetadataResult<Vec<IssueRow>>;

    /// Delete an issue together with its articles in one transaction.
    /// Returns the number of articles removed.
    async fn delete_issue(&self, issue_id: Uuid) -> MetadataResult<u64>;
}
