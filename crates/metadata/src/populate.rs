//! Resolve the volume and issue references of catalogue rows.

use crate::error::MetadataResult;
use crate::models::{ArticleRow, IssueRow, VolumeRow};
use crate::repos::{IssueRepo, VolumeRepo};
use crate::store::MetadataStore;
use std::collections::HashMap;
use uuid::Uuid;

/// An issue with its volume resolved.
#[derive(Debug, Clone)]
pub struct PopulatedIssue {
    pub issue: IssueRow,
    /// `None` if the referenced volume no longer exists.
    pub volume: Option<VolumeRow>,
}

/// An article with its volume and issue resolved.
#[derive(Debug, Clone)]
pub struct PopulatedArticle {
    pub article: ArticleRow,
    pub volume: Option<VolumeRow>,
    pub issue: Option<IssueRow>,
}

async fn volumes_by_id(store: &dyn MetadataStore) -> MetadataResult<HashMap<Uuid, VolumeRow>> {
    Ok(store
        .list_volumes()
        .await?
        .into_iter()
        .map(|v| (v.volume_id, v))
        .collect())
}

/// Attach the referenced volume to each issue.
pub async fn populate_issues(
    store: &dyn MetadataStore,
    issues: Vec<IssueRow>,
) -> MetadataResult<Vec<PopulatedIssue>> {
    if issues.is_empty() {
        return Ok(Vec::new());
    }
    let volumes = volumes_by_id(store).await?;
    Ok(issues
        .into_iter()
        .map(|issue| PopulatedIssue {
            volume: volumes.get(&issue.volume_id).cloned(),
            issue,
        })
        .collect())
}

/// Attach the referenced volume and issue to each article.
pub async fn populate_articles(
    store: &dyn MetadataStore,
    articles: Vec<ArticleRow>,
) -> MetadataResult<Vec<PopulatedArticle>> {
    if articles.is_empty() {
        return Ok(Vec::new());
    }
    let volumes = volumes_by_id(store).await?;
    let issues: HashMap<Uuid, IssueRow> = store
        .list_issues()
        .await?
        .into_iter()
        .map(|i| (i.issue_id, i))
        .collect();

    Ok(articles
        .into_iter()
        .map(|article| PopulatedArticle {
            volume: volumes.get(&article.volume_id).cloned(),
            issue: issues.get(&article.issue_id).cloned(),
            article,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SqliteStore;
    use crate::repos::ArticleRepo;
    use time::OffsetDateTime;

    #[tokio::test]
    async fn test_populate_articles_resolves_references() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("folio.db")).await.unwrap();
        let now = OffsetDateTime::now_utc();

        let volume = VolumeRow {
            volume_id: Uuid::new_v4(),
            year: 2024,
            name: "Volume 7".to_string(),
            slug: "volume-7".to_string(),
            created_at: now,
            updated_at: now,
        };
        store.create_volume(&volume).await.unwrap();
        let issue = IssueRow {
            issue_id: Uuid::new_v4(),
            volume_id: volume.volume_id,
            name: "Issue 1".to_string(),
            slug: "volume-7-issue-1".to_string(),
            created_at: now,
            updated_at: now,
        };
        store.create_issue(&issue).await.unwrap();

        let populated = populate_issues(&store, store.list_issues().await.unwrap())
            .await
            .unwrap();
        assert_eq!(populated.len(), 1);
        assert_eq!(populated[0].volume.as_ref().unwrap().year, 2024);

        let article = ArticleRow {
            article_id: Uuid::new_v4(),
            volume_id: volume.volume_id,
            issue_id: issue.issue_id,
            title: "Entropy".to_string(),
            author: "Q. Author".to_string(),
            abstract_text: "...".to_string(),
            slug: "quantum-entropy-2024".to_string(),
            issn: None,
            doi: None,
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
        store.create_article(&article).await.unwrap();

        let populated = populate_articles(&store, store.list_articles().await.unwrap())
            .await
            .unwrap();
        assert_eq!(populated[0].issue.as_ref().unwrap().slug, "volume-7-issue-1");
        assert_eq!(populated[0].volume.as_ref().unwrap().slug, "volume-7");
    }

    #[tokio::test]
    async fn test_populate_empty_skips_queries() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("folio.db")).await.unwrap();
        assert!(populate_articles(&store, Vec::new()).await.unwrap().is_empty());
    }
}
