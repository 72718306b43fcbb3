//! User repository trait.

use crate::error::MetadataResult;
use crate::models::UserRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for local user records.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Create a user. Fails with `AlreadyExists` on a duplicate uid, username or email.
    async fn create_user(&self, user: &UserRow) -> MetadataResult<()>;

    /// Get a user by ID.
    async fn get_user(&self, user_id: Uuid) -> MetadataResult<Option<UserRow>>;

    /// Get a user by identity-provider subject.
    async fn get_user_by_uid(&self, uid: &str) -> MetadataResult<Option<UserRow>>;

    /// Get a user by email (case-insensitive).
    async fn get_user_by_email(&self, email: &str) -> MetadataResult<Option<UserRow>>;

    /// Get a user by username.
    async fn get_user_by_username(&self, username: &str) -> MetadataResult<Option<UserRow>>;

    /// List all users, oldest first.
    async fn list_users(&self) -> MetadataResult<Vec<UserRow>>;

    /// Delete a user.
    async fn delete_user(&self, user_id: Uuid) -> MetadataResult<()>;
}
