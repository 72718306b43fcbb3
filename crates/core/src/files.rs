//! Storage keys and public references for files owned by journal records.
//!
//! Every uploaded file lives under a fixed prefix chosen by its [`FileKind`].
//! Keys are `prefix/{unix_millis}-{nonce}-{sanitized_name}`; the timestamp and
//! nonce only keep concurrent uploads of the same filename apart. A record
//! stores the public URL of its file, and the storage key is recovered from
//! the last URL segment plus the same prefix.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Maximum length of the sanitized filename part of a key.
pub const MAX_FILE_NAME_LEN: usize = 128;

/// Upper bound (exclusive) of the random key nonce.
const KEY_NONCE_BOUND: u32 = 1_000_000_000;

/// Content types accepted for manuscripts.
pub const MANUSCRIPT_CONTENT_TYPES: [&str; 3] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// The role a file plays for its owning record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Cover image of an article.
    ArticleImage,
    /// Full-text PDF of an article.
    ArticlePdf,
    /// Manuscript attached to a submission.
    Manuscript,
}

impl FileKind {
    /// Storage prefix for files of this kind.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::ArticleImage => "articles/images",
            Self::ArticlePdf => "articles/pdfs",
            Self::Manuscript => "submissions",
        }
    }

    /// Short name used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ArticleImage => "article_image",
            Self::ArticlePdf => "article_pdf",
            Self::Manuscript => "manuscript",
        }
    }

    /// Whether an upload with this content type may be attached.
    pub fn accepts(self, content_type: &str) -> bool {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match self {
            Self::ArticleImage => essence.starts_with("image/"),
            Self::ArticlePdf => essence == "application/pdf",
            Self::Manuscript => MANUSCRIPT_CONTENT_TYPES.contains(&essence.as_str()),
        }
    }

    /// Content type served when a record did not keep one.
    pub fn fallback_content_type(self) -> &'static str {
        match self {
            Self::ArticleImage => "application/octet-stream",
            Self::ArticlePdf | Self::Manuscript => "application/pdf",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference from a record to a publicly readable object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalFileRef {
    /// Public URL of the object.
    pub url: String,
    /// Filename supplied by the uploader.
    pub file_name: String,
    /// MIME type supplied by the uploader.
    pub content_type: String,
}

/// Reduce an uploaded filename to characters that are safe in keys and URLs.
///
/// Directory components are dropped, anything outside `[A-Za-z0-9._-]`
/// becomes `_`, and leading dots are removed so a key never names a hidden
/// file.
pub fn sanitize_file_name(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let mut sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = sanitized.trim_start_matches('.').len();
    sanitized.drain(..sanitized.len() - trimmed);
    sanitized.truncate(MAX_FILE_NAME_LEN);
    if sanitized.is_empty() {
        "file".to_string()
    } else {
        sanitized
    }
}

/// Build a fresh, collision-resistant storage key for an upload.
pub fn build_storage_key(kind: FileKind, original_name: &str) -> String {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let nonce: u32 = rand::rng().random_range(0..KEY_NONCE_BOUND);
    format!(
        "{}/{}-{}-{}",
        kind.prefix(),
        millis,
        nonce,
        sanitize_file_name(original_name)
    )
}

/// Recover the storage key from a stored public reference.
///
/// Only the last path segment of the reference is used (query string and
/// fragment stripped), re-prefixed with the prefix of `kind`.
pub fn key_from_reference(kind: FileKind, reference: &str) -> crate::Result<String> {
    let path = reference
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let segment = path.rsplit('/').next().unwrap_or_default();
    if segment.is_empty() || segment == "." || segment == ".." {
        return Err(crate::Error::InvalidFileRef(format!(
            "reference has no file segment: {reference}"
        )));
    }
    Ok(format!("{}/{}", kind.prefix(), segment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_keeps_safe_names() {
        assert_eq!(sanitize_file_name("paper-v2.pdf"), "paper-v2.pdf");
    }

    #[test]
    fn test_sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_file_name("my paper (final).pdf"), "my_paper__final_.pdf");
        assert_eq!(sanitize_file_name("résumé.docx"), "r_sum_.docx");
    }

    #[test]
    fn test_sanitize_strips_directories_and_dots() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\cover.png"), "cover.png");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "file");
        assert_eq!(sanitize_file_name("dir/"), "file");
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = format!("{}.pdf", "a".repeat(300));
        assert_eq!(sanitize_file_name(&long).len(), MAX_FILE_NAME_LEN);
    }

    #[test]
    fn test_build_storage_key_format() {
        let key = build_storage_key(FileKind::Manuscript, "draft one.pdf");
        let rest = key.strip_prefix("submissions/").unwrap();
        let mut parts = rest.splitn(3, '-');
        let millis: i128 = parts.next().unwrap().parse().unwrap();
        let nonce: u32 = parts.next().unwrap().parse().unwrap();
        assert!(millis > 0);
        assert!(nonce < KEY_NONCE_BOUND);
        assert_eq!(parts.next().unwrap(), "draft_one.pdf");
    }

    #[test]
    fn test_build_storage_key_distinct_for_same_name() {
        let a = build_storage_key(FileKind::ArticlePdf, "paper.pdf");
        let b = build_storage_key(FileKind::ArticlePdf, "paper.pdf");
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_from_reference_strips_query() {
        let key = key_from_reference(
            FileKind::ArticleImage,
            "https://cdn.example.org/bucket/articles/images/1700-42-cover.png?alt=media&token=x",
        )
        .unwrap();
        assert_eq!(key, "articles/images/1700-42-cover.png");
    }

    #[test]
    fn test_key_from_reference_uses_kind_prefix() {
        let key = key_from_reference(FileKind::Manuscript, "http://host/x/y/1-2-a.pdf").unwrap();
        assert_eq!(key, "submissions/1-2-a.pdf");
    }

    #[test]
    fn test_key_from_reference_rejects_empty_segment() {
        assert!(key_from_reference(FileKind::ArticlePdf, "https://host/dir/").is_err());
        assert!(key_from_reference(FileKind::ArticlePdf, "").is_err());
        assert!(key_from_reference(FileKind::ArticlePdf, "https://host/..").is_err());
    }

    #[test]
    fn test_accepts_content_types() {
        assert!(FileKind::ArticleImage.accepts("image/png"));
        assert!(!FileKind::ArticleImage.accepts("application/pdf"));
        assert!(FileKind::ArticlePdf.accepts("application/pdf; charset=binary"));
        assert!(FileKind::Manuscript.accepts("application/msword"));
        assert!(FileKind::Manuscript.accepts(
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        ));
        assert!(!FileKind::Manuscript.accepts("text/plain"));
    }
}
