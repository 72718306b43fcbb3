//! Manuscript submission domain types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Editorial state of a manuscript submission.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubmissionStatus {
    /// Awaiting an editorial decision.
    #[default]
    Pending,
    /// Accepted by an administrator.
    Approved,
    /// Declined by an administrator.
    Rejected,
}

impl SubmissionStatus {
    /// Get the status as a string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }

    /// Parse a status string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Approved" => Ok(Self::Approved),
            "Rejected" => Ok(Self::Rejected),
            _ => Err(crate::Error::InvalidStatus(s.to_string())),
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A co-author listed on a submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoAuthor {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub affiliation: String,
}

impl CoAuthor {
    /// Parse the JSON array sent in the `coAuthors` form field.
    pub fn parse_list(raw: &str) -> crate::Result<Vec<Self>> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        let authors: Vec<Self> = serde_json::from_str(trimmed)
            .map_err(|e| crate::Error::Serialization(format!("invalid coAuthors: {e}")))?;
        if let Some(author) = authors.iter().find(|a| a.name.trim().is_empty()) {
            return Err(crate::Error::Serialization(format!(
                "co-author with email '{}' has no name",
                author.email
            )));
        }
        Ok(authors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip_strings() {
        for status in [
            SubmissionStatus::Pending,
            SubmissionStatus::Approved,
            SubmissionStatus::Rejected,
        ] {
            assert_eq!(SubmissionStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(SubmissionStatus::parse("pending").is_err());
    }

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(SubmissionStatus::default(), SubmissionStatus::Pending);
    }

    #[test]
    fn test_parse_co_authors() {
        let raw = r#"[{"name":"Ada","email":"ada@example.org","affiliation":"KTH"},
                      {"name":"Lin","email":"lin@example.org"}]"#;
        let authors = CoAuthor::parse_list(raw).unwrap();
        assert_eq!(authors.len(), 2);
        assert_eq!(authors[0].affiliation, "KTH");
        assert_eq!(authors[1].affiliation, "");
    }

    #[test]
    fn test_parse_co_authors_empty_and_invalid() {
        assert!(CoAuthor::parse_list("").unwrap().is_empty());
        assert!(CoAuthor::parse_list("not json").is_err());
        assert!(CoAuthor::parse_list(r#"[{"name":" ","email":"x@y.z"}]"#).is_err());
    }
}
