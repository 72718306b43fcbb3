//! URL slugs identifying volumes, issues and articles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum slug length in bytes.
pub const MAX_SLUG_LEN: usize = 200;

/// An immutable, URL-safe identifier (`quantum-entropy-2024`).
///
/// Slugs are lowercase ASCII letters, digits and single hyphens. They never
/// start or end with a hyphen.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Create from a string, validating format.
    pub fn new(slug: impl Into<String>) -> crate::Result<Self> {
        let slug = slug.into();
        if slug.is_empty() {
            return Err(crate::Error::InvalidSlug("slug cannot be empty".to_string()));
        }
        if slug.len() > MAX_SLUG_LEN {
            return Err(crate::Error::InvalidSlug(format!(
                "slug must be at most {MAX_SLUG_LEN} bytes, got {}",
                slug.len()
            )));
        }
        for c in slug.chars() {
            if !matches!(c, 'a'..='z' | '0'..='9' | '-') {
                return Err(crate::Error::InvalidSlug(format!(
                    "invalid character in slug: {c:?}"
                )));
            }
        }
        if slug.starts_with('-') || slug.ends_with('-') {
            return Err(crate::Error::InvalidSlug(
                "slug cannot start or end with '-'".to_string(),
            ));
        }
        if slug.contains("--") {
            return Err(crate::Error::InvalidSlug(
                "slug cannot contain consecutive hyphens".to_string(),
            ));
        }
        Ok(Self(slug))
    }

    /// Get the slug string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Slug {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::new(value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Slug({})", self.0)
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_slugs() {
        for slug in ["quantum-entropy-2024", "vol-1", "a", "2024"] {
            assert_eq!(Slug::new(slug).unwrap().as_str(), slug);
        }
    }

    #[test]
    fn test_rejects_uppercase_and_spaces() {
        assert!(Slug::new("Quantum").is_err());
        assert!(Slug::new("two words").is_err());
        assert!(Slug::new("slash/slug").is_err());
    }

    #[test]
    fn test_rejects_edge_hyphens() {
        assert!(Slug::new("-leading").is_err());
        assert!(Slug::new("trailing-").is_err());
        assert!(Slug::new("double--hyphen").is_err());
    }

    #[test]
    fn test_rejects_empty_and_oversized() {
        assert!(Slug::new("").is_err());
        assert!(Slug::new("a".repeat(MAX_SLUG_LEN + 1)).is_err());
        assert!(Slug::new("a".repeat(MAX_SLUG_LEN)).is_ok());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Slug = serde_json::from_str("\"issue-3\"").unwrap();
        assert_eq!(ok.as_str(), "issue-3");
        assert!(serde_json::from_str::<Slug>("\"Issue 3\"").is_err());
    }
}
