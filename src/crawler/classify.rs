//! Failure classification and the action policy table
//!
//! Every failed crawl session carries a [`FailureKind`]. The engine never
//! decides what to do with a failure itself: it asks [`default_policy`] (or an
//! extractor override) for an [`Action`] and carries it out. Which failures
//! deserve a log line, and at which level, is answered separately by
//! [`log_level`].

use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::Level;

/// Cool-down after the remote site looks offline or returns a 5xx
pub const OUTAGE_SLEEP: Duration = Duration::from_secs(60 * 60);

/// Cool-down after a 503, before the target is retried from the explicit queue
pub const UNAVAILABLE_SLEEP: Duration = Duration::from_secs(5 * 60);

/// Cool-down after a connection-level transport error
pub const CONNECTION_SLEEP: Duration = Duration::from_secs(5 * 60);

/// Cool-down after a read timeout
pub const TIMEOUT_SLEEP: Duration = Duration::from_secs(60);

/// Status attached to a not-ok response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseStatus {
    /// No response was received at all
    NoResponse,

    /// A response was received but carries no usable status
    Unavailable,

    /// An HTTP status code
    Code(u16),
}

impl ResponseStatus {
    /// Returns the hundred-digit bucket of a status code (404 -> 400)
    pub fn bucket(&self) -> Option<u16> {
        match self {
            Self::Code(code) => Some(code / 100 * 100),
            _ => None,
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoResponse => f.write_str("-1"),
            Self::Unavailable => f.write_str("000"),
            Self::Code(code) => write!(f, "{}", code),
        }
    }
}

/// Every way a crawl session can fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The response could not be parsed at all
    Malformed,

    /// The remote site reports itself as offline
    Offline,

    /// The response was not ok
    ResponseNotOk(ResponseStatus),

    /// The response parsed but did not have the expected shape
    UnexpectedShape,

    /// Connection-level transport error
    Connection,

    /// TLS handshake or certificate error
    Tls,

    /// Timed out waiting for the response
    ReadTimeout,

    /// The document holds no extractable record
    NoContent,

    /// A record exists but cannot be indexed
    NonIndexable,

    /// Anything the table does not know about
    Unclassified,
}

impl FailureKind {
    /// Short label used in log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Malformed => "malformed_response",
            Self::Offline => "site_offline",
            Self::ResponseNotOk(_) => "response_not_ok",
            Self::UnexpectedShape => "unexpected_response_shape",
            Self::Connection => "connection_error",
            Self::Tls => "tls_error",
            Self::ReadTimeout => "read_timeout",
            Self::NoContent => "no_content",
            Self::NonIndexable => "non_indexable",
            Self::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResponseNotOk(status) => write!(f, "response_not_ok({})", status),
            other => f.write_str(other.as_str()),
        }
    }
}

/// A classified crawl failure
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct CrawlFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl CrawlFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn no_content() -> Self {
        Self::new(FailureKind::NoContent, "no extractable content")
    }

    pub fn non_indexable(message: impl Into<String>) -> Self {
        Self::new(FailureKind::NonIndexable, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Malformed, message)
    }

    pub fn response_not_ok(status: ResponseStatus, reason: impl Into<String>) -> Self {
        Self::new(FailureKind::ResponseNotOk(status), reason)
    }

    /// Wraps an arbitrary error that the policy table cannot classify
    pub fn unclassified(error: impl fmt::Display) -> Self {
        Self::new(FailureKind::Unclassified, error.to_string())
    }
}

/// What the engine does with a failed target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stop the run loop and shut down
    Fatal,

    /// Park the target in retry tier 0, then cool down
    RetryEscalate { sleep: Option<Duration> },

    /// Push the target back onto the explicit queue, then cool down
    RequeueImmediate { sleep: Option<Duration> },

    /// Hand the target to the idle/backoff controller
    Backoff,

    /// Consider the target consumed
    Suppressed,
}

impl Action {
    /// Cool-down attached to the action, if any
    pub fn sleep(&self) -> Option<Duration> {
        match self {
            Self::RetryEscalate { sleep } | Self::RequeueImmediate { sleep } => *sleep,
            _ => None,
        }
    }
}

/// The default policy table
///
/// | Kind | Action |
/// |------|--------|
/// | Malformed, Unclassified | Fatal |
/// | Offline, 5xx | escalate, sleep 60 min |
/// | 503 | re-queue, sleep 5 min |
/// | no response | re-queue |
/// | no status, 4xx, unknown bucket | escalate |
/// | Unexpected shape, TLS | escalate |
/// | Connection | escalate, sleep 5 min |
/// | Read timeout | escalate, sleep 1 min |
/// | No content | idle/backoff |
/// | Non-indexable | consumed |
pub fn default_policy(kind: &FailureKind) -> Action {
    match kind {
        FailureKind::Malformed | FailureKind::Unclassified => Action::Fatal,
        FailureKind::Offline => Action::RetryEscalate {
            sleep: Some(OUTAGE_SLEEP),
        },
        FailureKind::ResponseNotOk(status) => response_policy(status),
        FailureKind::UnexpectedShape | FailureKind::Tls => Action::RetryEscalate { sleep: None },
        FailureKind::Connection => Action::RetryEscalate {
            sleep: Some(CONNECTION_SLEEP),
        },
        FailureKind::ReadTimeout => Action::RetryEscalate {
            sleep: Some(TIMEOUT_SLEEP),
        },
        FailureKind::NoContent => Action::Backoff,
        FailureKind::NonIndexable => Action::Suppressed,
    }
}

fn response_policy(status: &ResponseStatus) -> Action {
    match status {
        ResponseStatus::NoResponse => Action::RequeueImmediate { sleep: None },
        ResponseStatus::Code(503) => Action::RequeueImmediate {
            sleep: Some(UNAVAILABLE_SLEEP),
        },
        _ => match status.bucket() {
            Some(500) => Action::RetryEscalate {
                sleep: Some(OUTAGE_SLEEP),
            },
            // 4xx, no status, and every bucket without its own rule
            _ => Action::RetryEscalate { sleep: None },
        },
    }
}

/// Level at which a failure of this kind is logged, `None` for silence
///
/// No-content outcomes are expected while crawling ahead of publication, and
/// not-ok responses are only worth a line for the buckets that may indicate a
/// crawler-side problem.
pub fn log_level(kind: &FailureKind) -> Option<Level> {
    match kind {
        FailureKind::NoContent => None,
        FailureKind::ResponseNotOk(status) => match status {
            ResponseStatus::NoResponse => None,
            _ => match status.bucket() {
                Some(500) => None,
                Some(400) => Some(Level::WARN),
                _ => Some(Level::ERROR),
            },
        },
        FailureKind::Unclassified => Some(Level::ERROR),
        _ => Some(Level::INFO),
    }
}
