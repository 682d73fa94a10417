/// Crawl session state definitions
///
/// A session walks a single target through fetch, extraction, post-processing
/// and publishing. Any non-terminal step may fail, which absorbs the session.
use crate::crawler::FailureKind;
use std::fmt;

/// Represents the current step of a crawl session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    // ===== Active States =====
    /// Downloading and parsing the document
    Fetching,

    /// Turning the document into a record
    Extracting,

    /// Enriching the extracted record
    PostProcessing,

    /// Handing the record to the publisher
    Publishing,

    // ===== Terminal States =====
    /// The record was published (or handed to the local sink)
    Done,

    /// The session failed with the given kind
    Failed(FailureKind),
}

impl SessionState {
    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }

    /// Returns true if the session completed successfully
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns the failure kind for a failed session
    pub fn failure(&self) -> Option<FailureKind> {
        match self {
            Self::Failed(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Checks whether moving from `self` to `next` is a legal transition
    ///
    /// The happy path is strictly linear. `Failed` is reachable from every
    /// active state and nothing leaves a terminal state.
    pub fn can_transition_to(&self, next: &SessionState) -> bool {
        match (self, next) {
            (s, _) if s.is_terminal() => false,
            (_, Self::Failed(_)) => true,
            (Self::Fetching, Self::Extracting) => true,
            (Self::Extracting, Self::PostProcessing) => true,
            (Self::PostProcessing, Self::Publishing) => true,
            (Self::Publishing, Self::Done) => true,
            _ => false,
        }
    }

    /// Short label used in log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::PostProcessing => "post_processing",
            Self::Publishing => "publishing",
            Self::Done => "done",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(kind) => write!(f, "failed({})", kind),
            other => f.write_str(other.as_str()),
        }
    }
}
