//! Message sink traits and types
//!
//! The publisher only knows how to open a channel and push opaque payloads
//! through it. Everything broker-specific lives behind [`Connector`] and
//! [`Channel`].

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur while talking to the message sink
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to connect to message sink: {0}")]
    Connect(String),

    #[error("Connection to message sink lost: {0}")]
    Connection(String),

    #[error("Message rejected by sink: {0}")]
    Rejected(String),
}

impl PublishError {
    /// Returns true when the error means the connection must be re-established
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Connection(_))
    }
}

/// Result type for publish operations
pub type PublishResult<T> = Result<T, PublishError>;

/// Where the sink lives and how to authenticate against it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl ConnectionInfo {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user: None,
            password: None,
        }
    }
}

/// Where records go once connected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub subject: String,
}

impl Destination {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }
}

/// An open, destination-bound publishing channel
#[async_trait]
pub trait Channel: Send + Sync {
    /// Publishes one pre-serialized record
    async fn publish(&self, payload: Bytes) -> PublishResult<()>;
}

/// Opens channels to a message sink
///
/// Called once by `Publisher::configure` and again on every reconnect, so
/// implementations must declare the destination each time they connect.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        connection: &ConnectionInfo,
        destination: &Destination,
    ) -> PublishResult<Box<dyn Channel>>;
}
