//! Per-article analytics counters.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A monotonically increasing counter carried by every article.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CounterMetric {
    /// Incremented when a reader opens the article page.
    #[serde(rename = "readCount")]
    ReadCount,
    /// Incremented when a reader downloads the article PDF.
    #[serde(rename = "downloadCount")]
    DownloadCount,
}

impl CounterMetric {
    /// Every metric, in a stable order.
    pub const ALL: [CounterMetric; 2] = [CounterMetric::ReadCount, CounterMetric::DownloadCount];

    /// Wire name of the metric.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadCount => "readCount",
            Self::DownloadCount => "downloadCount",
        }
    }

    /// Parse a wire name.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Self::ALL
            .into_iter()
            .find(|metric| metric.as_str() == s)
            .ok_or_else(|| crate::Error::InvalidMetric(s.to_string()))
    }
}

impl fmt::Display for CounterMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
