//! Database models mapping to the metadata schema.

use folio_core::{CoAuthor, CounterMetric, ExternalFileRef, FileKind, SubmissionStatus};
use sqlx::FromRow;
pub use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Catalogue
// =============================================================================

/// Volume record. One volume per publication year.
#[derive(Debug, Clone, FromRow)]
pub struct VolumeRow {
    pub volume_id: Uuid,
    pub year: i32,
    pub name: String,
    pub slug: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Issue record.
#[derive(Debug, Clone, FromRow)]
pub struct IssueRow {
    pub issue_id: Uuid,
    pub volume_id: Uuid,
    pub name: String,
    pub slug: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Article record.
///
/// Each attached file is stored as three nullable columns (public URL,
/// original filename, content type) which are either all set or all NULL.
#[derive(Debug, Clone, FromRow)]
pub struct ArticleRow {
    pub article_id: Uuid,
    pub volume_id: Uuid,
    pub issue_id: Uuid,
    pub title: String,
    pub author: String,
    pub abstract_text: String,
    pub slug: String,
    pub issn: Option<String>,
    pub doi: Option<String>,
    pub image_url: Option<String>,
    pub image_file_name: Option<String>,
    pub image_content_type: Option<String>,
    pub pdf_url: Option<String>,
    pub pdf_file_name: Option<String>,
    pub pdf_content_type: Option<String>,
    pub featured: bool,
    pub read_count: i64,
    pub download_count: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

fn file_ref(
    kind: FileKind,
    url: &Option<String>,
    file_name: &Option<String>,
    content_type: &Option<String>,
) -> Option<ExternalFileRef> {
    url.as_ref().map(|url| ExternalFileRef {
        url: url.clone(),
        file_name: file_name.clone().unwrap_or_else(|| "file".to_string()),
        content_type: content_type
            .clone()
            .unwrap_or_else(|| kind.fallback_content_type().to_string()),
    })
}

impl ArticleRow {
    /// Cover image reference, if one is attached.
    pub fn image(&self) -> Option<ExternalFileRef> {
        file_ref(
            FileKind::ArticleImage,
            &self.image_url,
            &self.image_file_name,
            &self.image_content_type,
        )
    }

    /// Full-text PDF reference, if one is attached.
    pub fn pdf(&self) -> Option<ExternalFileRef> {
        file_ref(
            FileKind::ArticlePdf,
            &self.pdf_url,
            &self.pdf_file_name,
            &self.pdf_content_type,
        )
    }

    /// Record the cover image reference.
    pub fn set_image(&mut self, file: &ExternalFileRef) {
        self.image_url = Some(file.url.clone());
        self.image_file_name = Some(file.file_name.clone());
        self.image_content_type = Some(file.content_type.clone());
    }

    /// Record the full-text PDF reference.
    pub fn set_pdf(&mut self, file: &ExternalFileRef) {
        self.pdf_url = Some(file.url.clone());
        self.pdf_file_name = Some(file.file_name.clone());
        self.pdf_content_type = Some(file.content_type.clone());
    }

    /// Every attached file with its kind.
    pub fn files(&self) -> Vec<(FileKind, ExternalFileRef)> {
        [
            (FileKind::ArticleImage, self.image()),
            (FileKind::ArticlePdf, self.pdf()),
        ]
        .into_iter()
        .filter_map(|(kind, file)| file.map(|f| (kind, f)))
        .collect()
    }

    /// Current value of a counter.
    pub fn counter(&self, metric: CounterMetric) -> i64 {
        match metric {
            CounterMetric::ReadCount => self.read_count,
            CounterMetric::DownloadCount => self.download_count,
        }
    }
}

/// Column holding a counter. Never built from user input.
pub(crate) fn counter_column(metric: CounterMetric) -> &'static str {
    match metric {
        CounterMetric::ReadCount => "read_count",
        CounterMetric::DownloadCount => "download_count",
    }
}

// =============================================================================
// Submissions
// =============================================================================

/// Manuscript submission record.
#[derive(Debug, Clone, FromRow)]
pub struct SubmissionRow {
    pub submission_id: Uuid,
    /// Identity-provider subject of the submitting author.
    pub user_id: String,
    pub author_name: String,
    pub email: String,
    pub affiliation: String,
    pub country: String,
    pub co_authors: Json<Vec<CoAuthor>>,
    pub paper_title: String,
    pub abstract_text: String,
    pub keywords: String,
    pub paper_type: String,
    pub subject_area: String,
    pub manuscript_url: String,
    pub manuscript_file_name: String,
    pub manuscript_content_type: String,
    pub copyright_agreement: bool,
    pub ethics_agreement: bool,
    pub status: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl SubmissionRow {
    /// Manuscript reference.
    pub fn manuscript(&self) -> ExternalFileRef {
        ExternalFileRef {
            url: self.manuscript_url.clone(),
            file_name: self.manuscript_file_name.clone(),
            content_type: self.manuscript_content_type.clone(),
        }
    }

    /// Parsed status. Unknown values read as `Pending`.
    pub fn status(&self) -> SubmissionStatus {
        SubmissionStatus::parse(&self.status).unwrap_or_else(|_| {
            tracing::warn!(
                submission_id = %self.submission_id,
                status = %self.status,
                "Unknown submission status in database"
            );
            SubmissionStatus::Pending
        })
    }
}

// =============================================================================
// Users
// =============================================================================

/// Local user record linked to an identity-provider subject.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    /// Identity-provider subject.
    pub uid: String,
    pub username: String,
    pub email: String,
    pub created_at: OffsetDateTime,
}
