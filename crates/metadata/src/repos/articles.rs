//! Article repository trait.

use crate::error::MetadataResult;
use crate::models::ArticleRow;
use async_trait::async_trait;
use folio_core::CounterMetric;
use uuid::Uuid;

/// Repository for articles and their analytics counters.
#[async_trait]
pub trait ArticleRepo: Send + Sync {
    /// Create an article. Issue and volume must exist.
    async fn create_article(&self, article: &ArticleRow) -> MetadataResult<()>;

    /// Get an article by ID.
    async fn get_article(&self, article_id: Uuid) -> MetadataResult<Option<ArticleRow>>;

    /// Get an article by slug.
    async fn get_article_by_slug(&self, slug: &str) -> MetadataResult<Option<ArticleRow>>;

    /// List all articles, newest first.
    async fn list_articles(&self) -> MetadataResult<Vec<ArticleRow>>;

    /// List the articles of an issue.
    async fn list_articles_by_issue(&self, issue_id: Uuid) -> MetadataResult<Vec<ArticleRow>>;

    /// Delete an article.
    async fn delete_article(&self, article_id: Uuid) -> MetadataResult<()>;

    /// Atomically add 1 to a counter and return the new value.
    ///
    /// Runs as a single `UPDATE ... RETURNING` statement. Returns `None` if no
    /// article has this slug.
    async fn increment_counter(
        &self,
        slug: &str,
        metric: CounterMetric,
    ) -> MetadataResult<Option<i64>>;

    /// Read a counter without changing it. Returns `None` for an unknown slug.
    async fn get_counter(&self, slug: &str, metric: CounterMetric) -> MetadataResult<Option<i64>>;

    /// Mark one article as featured and clear the flag on every other article.
    async fn set_featured(&self, article_id: Uuid) -> MetadataResult<ArticleRow>;
}
