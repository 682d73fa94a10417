/// Crawl target definitions
///
/// A target is either a position in the identifier space or an opaque URL
/// that was handed to the engine explicitly.
use serde::Serialize;
use std::fmt;

/// A single unit of crawl work
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum CrawlTarget {
    /// A cursor value, resolved to an address by the extractor
    Id(i64),

    /// An explicit URL, usually fetched as-is
    Url(String),
}

impl CrawlTarget {
    /// Returns the cursor value if this target is an identifier
    pub fn as_id(&self) -> Option<i64> {
        match self {
            Self::Id(id) => Some(*id),
            Self::Url(_) => None,
        }
    }
}

impl From<i64> for CrawlTarget {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for CrawlTarget {
    fn from(url: &str) -> Self {
        Self::Url(url.to_string())
    }
}

impl From<String> for CrawlTarget {
    fn from(url: String) -> Self {
        Self::Url(url)
    }
}

impl fmt::Display for CrawlTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Url(url) => f.write_str(url),
        }
    }
}
