//! PostgreSQL-based metadata store implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::*;
use crate::repos::{ArticleRepo, IssueRepo, SubmissionRepo, UserRepo, VolumeRepo};
use crate::store::MetadataStore;
use async_trait::async_trait;
use folio_core::config::PgSslMode;
use folio_core::{CounterMetric, SubmissionStatus};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode as SqlxPgSslMode};
use sqlx::{Pool, Postgres};
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

fn postgres_schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// PostgreSQL-based metadata store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from a connection URL.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    /// Create a new PostgreSQL store from individual connection parameters.
    ///
    /// Lets the password come from its own environment variable instead of
    /// being embedded in a URL.
    #[allow(clippy::too_many_arguments)]
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        ssl_mode: Option<PgSslMode>,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }

        if let Some(pass) = password {
            opts = opts.password(pass);
        }

        if let Some(mode) = ssl_mode {
            let sqlx_mode = match mode {
                PgSslMode::Disable => SqlxPgSslMode::Disable,
                PgSslMode::Prefer => SqlxPgSslMode::Prefer,
                PgSslMode::Require => SqlxPgSslMode::Require,
            };
            opts = opts.ssl_mode(sqlx_mode);
        }

        // Log connection info without password
        tracing::info!(
            host = host,
            port = port,
            database = database,
            username = username.unwrap_or("<none>"),
            ssl_mode = ?ssl_mode,
            "Connecting to PostgreSQL with individual parameters"
        );

        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    async fn connect(
        mut opts: PgConnectOptions,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{}ms", timeout_ms))]);
            tracing::info!("PostgreSQL statement_timeout set to {}ms", timeout_ms);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    async fn migrate(&self) -> MetadataResult<()> {
        // PostgreSQL doesn't allow multiple statements in a single prepared statement,
        // so we split the schema and execute each statement separately.
        for statement in postgres_schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl VolumeRepo for PostgresStore {
    async fn create_volume(&self, volume: &VolumeRow) -> MetadataResult<()> {
        sqlx::query(
            "INSERT INTO volumes (volume_id, year, name, slug, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6)",
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
        let row = sqlx::query_as::<_, VolumeRow>("SELECT * FROM volumes WHERE volume_id = $1")
            .bind(volume_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get_volume_by_slug(&self, slug: &str) -> MetadataResult<Option<VolumeRow>> {
        let row = sqlx::query_as::<_, VolumeRow>("SELECT * FROM volumes WHERE slug = $1")
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
        let issues: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM issues WHERE volume_id = $1")
            .bind(volume_id)
            .fetch_one(&self.pool)
            .await?;
        if issues > 0 {
            return Err(MetadataError::Constraint(format!(
                "volume {volume_id} still has {issues} issue(s)"
            )));
        }

        let result = sqlx::query("DELETE FROM volumes WHERE volume_id = $1")
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
impl IssueRepo for PostgresStore {
    async fn create_issue(&self, issue: &IssueRow) -> MetadataResult<()> {
        sqlx::query(
            "INSERT INTO issues (issue_id, volume_id, name, slug, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6)",
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
        let row = sqlx::query_as::<_, IssueRow>("SELECT * FROM issues WHERE issue_id = $1")
            .bind(issue_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get_issue_by_slug(&self, slug: &str) -> MetadataResult<Option<IssueRow>> {
        let row = sqlx::query_as::<_, IssueRow>("SELECT * FROM issues WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_issues(&self) -> MetadataResult<Vec<IssueRow>> {
        let rows = sqlx::query_as::<_, IssueRow>("SELECT * FROM issues ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn delete_issue(&self, issue_id: Uuid) -> MetadataResult<u64> {
        let mut tx = self.pool.begin().await?;

        let articles = sqlx::query("DELETE FROM articles WHERE issue_id = $1")
            .bind(issue_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let result = sqlx::query("DELETE FROM issues WHERE issue_id = $1")
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
impl ArticleRepo for PostgresStore {
    async fn create_article(&self, article: &ArticleRow) -> MetadataResult<()> {
        sqlx::query(
            r#"
            INSERT INTO articles (
                article_id, volume_id, issue_id, title, author, abstract_text, slug,
                issn, doi, image_url, image_file_name, image_content_type,
                pdf_url, pdf_file_name, pdf_content_type, featured,
                read_count, download_count, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
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
        let row = sqlx::query_as::<_, ArticleRow>("SELECT * FROM articles WHERE article_id = $1")
            .bind(article_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get_article_by_slug(&self, slug: &str) -> MetadataResult<Option<ArticleRow>> {
        let row = sqlx::query_as::<_, ArticleRow>("SELECT * FROM articles WHERE slug = $1")
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
            "SELECT * FROM articles WHERE issue_id = $1 ORDER BY created_at DESC",
        )
        .bind(issue_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn delete_article(&self, article_id: Uuid) -> MetadataResult<()> {
        let result = sqlx::query("DELETE FROM articles WHERE article_id = $1")
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
            "UPDATE articles SET {column} = {column} + 1, updated_at = $1 WHERE slug = $2 RETURNING {column}"
        );
        let value: Option<i64> = sqlx::query_scalar(&sql)
            .bind(OffsetDateTime::now_utc())
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn get_counter(&self, slug: &str, metric: CounterMetric) -> MetadataResult<Option<i64>> {
        let sql = format!(
            "SELECT {} FROM articles WHERE slug = $1",
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

        sqlx::query("UPDATE articles SET featured = FALSE, updated_at = $1 WHERE featured")
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query_as::<_, ArticleRow>(
            "UPDATE articles SET featured = TRUE, updated_at = $1 WHERE article_id = $2 RETURNING *",
        )
        .bind(now)
        .bind(article_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Err(MetadataError::NotFound(format!(
                "article {article_id} not found"
            )));
        };

        tx.commit().await?;
        Ok(row)
    }
}

#[async_trait]
impl SubmissionRepo for PostgresStore {
    async fn create_submission(&self, submission: &SubmissionRow) -> MetadataResult<()> {
        sqlx::query(
            r#"
            INSERT INTO submissions (
                submission_id, user_id, author_name, email, affiliation, country,
                co_authors, paper_title, abstract_text, keywords, paper_type,
                subject_area, manuscript_url, manuscript_file_name,
                manuscript_content_type, copyright_agreement, ethics_agreement,
                status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
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

    async fn get_submission(&self, submission_id: Uuid) -> MetadataResult<Option<SubmissionRow>> {
        let row = sqlx::query_as::<_, SubmissionRow>(
            "SELECT * FROM submissions WHERE submission_id = $1",
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

    async fn list_submissions_by_user(&self, user_id: &str) -> MetadataResult<Vec<SubmissionRow>> {
        let rows = sqlx::query_as::<_, SubmissionRow>(
            "SELECT * FROM submissions WHERE user_id = $1 ORDER BY created_at DESC",
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
            "UPDATE submissions SET status = $1, updated_at = $2 WHERE submission_id = $3 RETURNING *",
        )
        .bind(status.as_str())
        .bind(updated_at)
        .bind(submission_id)
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or_else(|| MetadataError::NotFound(format!("submission {submission_id} not found")))
    }

    async fn delete_submission(&self, submission_id: Uuid) -> MetadataResult<()> {
        let result = sqlx::query("DELETE FROM submissions WHERE submission_id = $1")
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
impl UserRepo for PostgresStore {
    async fn create_user(&self, user: &UserRow) -> MetadataResult<()> {
        sqlx::query(
            "INSERT INTO users (user_id, uid, username, email, created_at) VALUES ($1, $2, $3, $4, $5)",
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
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get_user_by_uid(&self, uid: &str) -> MetadataResult<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE uid = $1")
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get_user_by_email(&self, email: &str) -> MetadataResult<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1")
            .bind(email.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get_user_by_username(&self, username: &str) -> MetadataResult<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = $1")
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
        let result = sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(MetadataError::NotFound(format!("user {user_id} not found")));
        }
        Ok(())
    }
}
