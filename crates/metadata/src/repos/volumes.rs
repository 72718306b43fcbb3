//! Volume repository trait.

use crate::error::MetadataResult;
use crate::models::VolumeRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for volumes.
#[async_trait]
pub trait VolumeRepo: Send + Sync {
    /// Create a volume. Fails with `AlreadyExists` on a duplicate year or slug.
    async fn create_volume(&self, volume: &VolumeRow) -> MetadataResult<()>;

    /// Get a volume by ID.
    async fn get_volume(&self, volume_id: Uuid) -> MetadataResult<Option<VolumeRow>>;

    /// Get a volume by slug.
    async fn get_volume_by_slug(&self, slug: &str) -> MetadataResult<Option<VolumeRow>>;

    /// List all volumes, newest year first.
    async fn list_volumes(&self) -> MetadataResult<Vec<VolumeRow>>;

    /// Delete a volume. Fails with `Constraint` while issues still reference it.
    async fn delete_volume(&self, volume_id: Uuid) -> MetadataResult<()>;
}
