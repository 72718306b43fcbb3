//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{ArticleRepo, IssueRepo, SubmissionRepo, UserRepo, VolumeRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore:
    VolumeRepo + IssueRepo + ArticleRepo + SubmissionRepo + UserRepo + Send + Sync
{
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and apply the schema.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        // A single connection serializes writers and avoids "database is locked"
        // under concurrent requests.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        tracing::info!(path = %path.display(), "Opened SQLite metadata store");
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// Implement all the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use folio_core::{CounterMetric, SubmissionStatus};
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[async_trait]
    impl VolumeRepo for SqliteStore {
        async fn create_volume(&self, volume: &VolumeRow) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO volumes (volume_id, year, name, slug, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(volume.volume_id)
            .bind(volume.year)
            .bind(&volume.name)
            .bind(&volume.slug)
            .bind(volume.created_at)
            .bind(volume.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                MetadataError::on_insert(
                    e,
                    format!("volume for year {} or slug '{}'", volume.year, volume.slug),
                )
            })?;
            Ok(())
        }

        async fn get_volume(&self, volume_id: Uuid) -> MetadataResult<Option<VolumeRow>> {
            let row = sqlx::query_as::<_, VolumeRow>("SELECT * FROM volumes WHERE volume_id = ?")
                .bind(volume_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_volume_by_slug(&self, slug: &str) -> MetadataResult<Option<VolumeRow>> {
            let row = sqlx::query_as::<_, VolumeRow>("SELECT * FROM volumes WHERE slug = ?")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn list_volumes(&self) -> MetadataResult<Vec<VolumeRow>> {
            let rows = sqlx::query_as::<_, VolumeRow>("SELECT * FROM volumes ORDER BY year DESC")
                .fetch_all(&self.pool)
                .await?;
            Ok(rows)
        }

        async fn delete_volume(&self, volume_id: Uuid) -> MetadataResult<()> {
            let issues: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM issues WHERE volume_id = ?")
                .bind(volume_id)
                .fetch_one(&self.pool)
                .await?;
            if issues > 0 {
                return Err(MetadataError::Constraint(format!(
                    "volume {volume_id} still has {issues} issue(s)"
                )));
            }

            let result = sqlx::query("DELETE FROM volumes WHERE volume_id = ?")
                .bind(volume_id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "volume {volume_id} not found"
                )));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl IssueRepo for SqliteStore {
        async fn create_issue(&self, issue: &IssueRow) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO issues (issue_id, volume_id, name, slug, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(issue.issue_id)
            .bind(issue.volume_id)
            .bind(&issue.name)
            .bind(&issue.slug)
            .bind(issue.created_at)
            .bind(issue.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| MetadataError::on_insert(e, format!("issue '{}'", issue.slug)))?;
            Ok(())
        }

        async fn get_issue(&self, issue_id: Uuid) -> MetadataResult<Option<IssueRow>> {
            let row = sqlx::query_as::<_, IssueRow>("SELECT * FROM issues WHERE issue_id = ?")
                .bind(issue_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_issue_by_slug(&self, slug: &str) -> MetadataResult<Option<IssueRow>> {
            let row = sqlx::query_as::<_, IssueRow>("SELECT * FROM issues WHERE slug = ?")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn list_issues(&self) -> MetadataResult<Vec<IssueRow>> {
            let rows =
                sqlx::query_as::<_, IssueRow>("SELECT * FROM issues ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await?;
            Ok(rows)
        }

        async fn delete_issue(&self, issue_id: Uuid) -> MetadataResult<u64> {
            let mut tx = self.pool.begin().await?;

            let articles = sqlx::query("DELETE FROM articles WHERE issue_id = ?")
                .bind(issue_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            let result = sqlx::query("DELETE FROM issues WHERE issue_id = ?")
                .bind(issue_id)
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() == 0 {
                tx.rollback().await?;
                return Err(MetadataError::NotFound(format!("issue {issue_id} not found")));
            }

            tx.commit().await?;
            Ok(articles)
        }
    }

    #[async_trait]
    impl ArticleRepo for SqliteStore {
        async fn create_article(&self, article: &ArticleRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO articles (
                    article_id, volume_id, issue_id, title, author, abstract_text, slug,
                    issn, doi, image_url, image_file_name, image_content_type,
                    pdf_url, pdf_file_name, pdf_content_type, featured,
                    read_count, download_count, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(article.article_id)
            .bind(article.volume_id)
            .bind(article.issue_id)
            .bind(&article.title)
            .bind(&article.author)
            .bind(&article.abstract_text)
            .bind(&article.slug)
            .bind(&article.issn)
            .bind(&article.doi)
            .bind(&article.image_url)
            .bind(&article.image_file_name)
            .bind(&article.image_content_type)
            .bind(&article.pdf_url)
            .bind(&article.pdf_file_name)
            .bind(&article.pdf_content_type)
            .bind(article.featured)
            .bind(article.read_count)
            .bind(article.download_count)
            .bind(article.created_at)
            .bind(article.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| MetadataError::on_insert(e, format!("article '{}'", article.slug)))?;
            Ok(())
        }

        async fn get_article(&self, article_id: Uuid) -> MetadataResult<Option<ArticleRow>> {
            let row =
                sqlx::query_as::<_, ArticleRow>("SELECT * FROM articles WHERE article_id = ?")
                    .bind(article_id)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(row)
        }

        async fn get_article_by_slug(&self, slug: &str) -> MetadataResult<Option<ArticleRow>> {
            let row = sqlx::query_as::<_, ArticleRow>("SELECT * FROM articles WHERE slug = ?")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn list_articles(&self) -> MetadataResult<Vec<ArticleRow>> {
            let rows =
                sqlx::query_as::<_, ArticleRow>("SELECT * FROM articles ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await?;
            Ok(rows)
        }

        async fn list_articles_by_issue(&self, issue_id: Uuid) -> MetadataResult<Vec<ArticleRow>> {
            let rows = sqlx::query_as::<_, ArticleRow>(
                "SELECT * FROM articles WHERE issue_id = ? ORDER BY created_at DESC",
            )
            .bind(issue_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn delete_article(&self, article_id: Uuid) -> MetadataResult<()> {
            let result = sqlx::query("DELETE FROM articles WHERE article_id = ?")
                .bind(article_id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "article {article_id} not found"
                )));
            }
            Ok(())
        }

        async fn increment_counter(
            &self,
            slug: &str,
            metric: CounterMetric,
        ) -> MetadataResult<Option<i64>> {
            let column = counter_column(metric);
            let sql = format!(
                "UPDATE articles SET {column} = {column} + 1, updated_at = ? WHERE slug = ? RETURNING {column}"
            );
            let value: Option<i64> = sqlx::query_scalar(&sql)
                .bind(OffsetDateTime::now_utc())
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;
            Ok(value)
        }

        async fn get_counter(
            &self,
            slug: &str,
            metric: CounterMetric,
        ) -> MetadataResult<Option<i64>> {
            let sql = format!(
                "SELECT {} FROM articles WHERE slug = ?",
                counter_column(metric)
            );
            let value: Option<i64> = sqlx::query_scalar(&sql)
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;
            Ok(value)
        }

        async fn set_featured(&self, article_id: Uuid) -> MetadataResult<ArticleRow> {
            let now = OffsetDateTime::now_utc();
            let mut tx = self.pool.begin().await?;

            // Clear first; the partial unique index allows one featured row.
            sqlx::query("UPDATE articles SET featured = ?, updated_at = ? WHERE featured = ?")
                .bind(false)
                .bind(now)
                .bind(true)
                .execute(&mut *tx)
                .await?;

            let result = sqlx::query(
                "UPDATE articles SET featured = ?, updated_at = ? WHERE article_id = ?",
            )
            .bind(true)
            .bind(now)
            .bind(article_id)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 0 {
                tx.rollback().await?;
                return Err(MetadataError::NotFound(format!(
                    "article {article_id} not found"
                )));
            }

            let row =
                sqlx::query_as::<_, ArticleRow>("SELECT * FROM articles WHERE article_id = ?")
                    .bind(article_id)
                    .fetch_one(&mut *tx)
                    .await?;

            tx.commit().await?;
            Ok(row)
        }
    }

    #[async_trait]
    impl SubmissionRepo for SqliteStore {
        async fn create_submission(&self, submission: &SubmissionRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO submissions (
                    submission_id, user_id, author_name, email, affiliation, country,
                    co_authors, paper_title, abstract_text, keywords, paper_type,
                    subject_area, manuscript_url, manuscript_file_name,
                    manuscript_content_type, copyright_agreement, ethics_agreement,
                    status, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(submission.submission_id)
            .bind(&submission.user_id)
            .bind(&submission.author_name)
            .bind(&submission.email)
            .bind(&submission.affiliation)
            .bind(&submission.country)
            .bind(&submission.co_authors)
            .bind(&submission.paper_title)
            .bind(&submission.abstract_text)
            .bind(&submission.keywords)
            .bind(&submission.paper_type)
            .bind(&submission.subject_area)
            .bind(&submission.manuscript_url)
            .bind(&submission.manuscript_file_name)
            .bind(&submission.manuscript_content_type)
            .bind(submission.copyright_agreement)
            .bind(submission.ethics_agreement)
            .bind(&submission.status)
            .bind(submission.created_at)
            .bind(submission.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                MetadataError::on_insert(e, format!("submission {}", submission.submission_id))
            })?;
            Ok(())
        }

        async fn get_submission(
            &self,
            submission_id: Uuid,
        ) -> MetadataResult<Option<SubmissionRow>> {
            let row = sqlx::query_as::<_, SubmissionRow>(
                "SELECT * FROM submissions WHERE submission_id = ?",
            )
            .bind(submission_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn list_submissions(&self) -> MetadataResult<Vec<SubmissionRow>> {
            let rows = sqlx::query_as::<_, SubmissionRow>(
                "SELECT * FROM submissions ORDER BY created_at DESC",
            )
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn list_submissions_by_user(
            &self,
            user_id: &str,
        ) -> MetadataResult<Vec<SubmissionRow>> {
            let rows = sqlx::query_as::<_, SubmissionRow>(
                "SELECT * FROM submissions WHERE user_id = ? ORDER BY created_at DESC",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn update_submission_status(
            &self,
            submission_id: Uuid,
            status: SubmissionStatus,
            updated_at: OffsetDateTime,
        ) -> MetadataResult<SubmissionRow> {
            let row = sqlx::query_as::<_, SubmissionRow>(
                "UPDATE submissions SET status = ?, updated_at = ? WHERE submission_id = ? RETURNING *",
            )
            .bind(status.as_str())
            .bind(updated_at)
            .bind(submission_id)
            .fetch_optional(&self.pool)
            .await?;
            row.ok_or_else(|| {
                MetadataError::NotFound(format!("submission {submission_id} not found"))
            })
        }

        async fn delete_submission(&self, submission_id: Uuid) -> MetadataResult<()> {
            let result = sqlx::query("DELETE FROM submissions WHERE submission_id = ?")
                .bind(submission_id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "submission {submission_id} not found"
                )));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl UserRepo for SqliteStore {
        async fn create_user(&self, user: &UserRow) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO users (user_id, uid, username, email, created_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(user.user_id)
            .bind(&user.uid)
            .bind(&user.username)
            .bind(user.email.to_lowercase())
            .bind(user.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| MetadataError::on_insert(e, format!("user '{}'", user.username)))?;
            Ok(())
        }

        async fn get_user(&self, user_id: Uuid) -> MetadataResult<Option<UserRow>> {
            let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_user_by_uid(&self, uid: &str) -> MetadataResult<Option<UserRow>> {
            let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE uid = ?")
                .bind(uid)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_user_by_email(&self, email: &str) -> MetadataResult<Option<UserRow>> {
            let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = ?")
                .bind(email.to_lowercase())
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_user_by_username(&self, username: &str) -> MetadataResult<Option<UserRow>> {
            let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = ?")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn list_users(&self) -> MetadataResult<Vec<UserRow>> {
            let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?;
            Ok(rows)
        }

        async fn delete_user(&self, user_id: Uuid) -> MetadataResult<()> {
            let result = sqlx::query("DELETE FROM users WHERE user_id = ?")
                .bind(user_id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("user {user_id} not found")));
            }
            Ok(())
        }
    }
}

/// SQL schema for SQLite.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS volumes (
    volume_id BLOB PRIMARY KEY,
    year INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS issues (
    issue_id BLOB PRIMARY KEY,
    volume_id BLOB NOT NULL REFERENCES volumes(volume_id),
    name TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_issues_volume ON issues(volume_id);

CREATE TABLE IF NOT EXISTS articles (
    article_id BLOB PRIMARY KEY,
    volume_id BLOB NOT NULL REFERENCES volumes(volume_id),
    issue_id BLOB NOT NULL REFERENCES issues(issue_id),
    title TEXT NOT NULL,
    author TEXT NOT NULL,
    abstract_text TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,
    issn TEXT,
    doi TEXT,
    image_url TEXT,
    image_file_name TEXT,
    image_content_type TEXT,
    pdf_url TEXT,
    pdf_file_name TEXT,
    pdf_content_type TEXT,
    featured INTEGER NOT NULL DEFAULT 0,
    read_count INTEGER NOT NULL DEFAULT 0 CHECK (read_count >= 0),
    download_count INTEGER NOT NULL DEFAULT 0 CHECK (download_count >= 0),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_articles_issue ON articles(issue_id);
CREATE INDEX IF NOT EXISTS idx_articles_volume ON articles(volume_id);
-- At most one featured article
CREATE UNIQUE INDEX IF NOT EXISTS idx_articles_featured ON articles(featured) WHERE featured = 1;

CREATE TABLE IF NOT EXISTS submissions (
    submission_id BLOB PRIMARY KEY,
    user_id TEXT NOT NULL,
    author_name TEXT NOT NULL,
    email TEXT NOT NULL,
    affiliation TEXT NOT NULL,
    country TEXT NOT NULL,
    co_authors TEXT NOT NULL DEFAULT '[]',
    paper_title TEXT NOT NULL,
    abstract_text TEXT NOT NULL,
    keywords TEXT NOT NULL,
    paper_type TEXT NOT NULL,
    subject_area TEXT NOT NULL,
    manuscript_url TEXT NOT NULL,
    manuscript_file_name TEXT NOT NULL,
    manuscript_content_type TEXT NOT NULL,
    copyright_agreement INTEGER NOT NULL,
    ethics_agreement INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'Pending',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_submissions_user ON submissions(user_id, created_at);

CREATE TABLE IF NOT EXISTS users (
    user_id BLOB PRIMARY KEY,
    uid TEXT NOT NULL UNIQUE,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);
"#;
