//! Reliable publisher
//!
//! Delivery is best-effort: crawling must continue even when the sink is
//! gone. A publisher starts on the local log sink, switches to a remote sink
//! once `configure` manages to connect, and drops a message after
//! [`PUBLISH_ATTEMPTS`] failed attempts instead of raising.

use crate::publish::traits::{Channel, ConnectionInfo, Connector, Destination, PublishError};
use bytes::Bytes;

/// Attempts per publish call
pub const PUBLISH_ATTEMPTS: u32 = 3;

/// What happened to a published payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Accepted by the remote sink
    Delivered,

    /// Written to the local log sink
    Logged,

    /// Given up on; the crawl continues
    Dropped,
}

struct RemoteSink {
    connector: Box<dyn Connector>,
    connection: ConnectionInfo,
    destination: Destination,
    channel: Option<Box<dyn Channel>>,
}

enum Sink {
    Local,
    Remote(RemoteSink),
}

/// Publishes serialized records with bounded retry and reconnect
pub struct Publisher {
    name: String,
    sink: Sink,
    reconnects: u64,
}

impl Publisher {
    /// Creates a publisher writing to the local log sink
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sink: Sink::Local,
            reconnects: 0,
        }
    }

    /// Connects to a remote sink
    ///
    /// On failure the publisher keeps (or falls back to) the local log sink
    /// for the rest of the run; this is never fatal.
    pub async fn configure(
        &mut self,
        connector: Box<dyn Connector>,
        connection: ConnectionInfo,
        destination: Destination,
    ) {
        match connector.connect(&connection, &destination).await {
            Ok(channel) => {
                tracing::info!(
                    engine = %self.name,
                    "Publishing to {} on {}",
                    destination.subject,
                    connection.url
                );
                self.sink = Sink::Remote(RemoteSink {
                    connector,
                    connection,
                    destination,
                    channel: Some(channel),
                });
            }
            Err(e) => {
                tracing::warn!(
                    engine = %self.name,
                    "{} encountered {} and cannot write to the message sink. Messages will be logged locally.",
                    self.name,
                    e
                );
                self.sink = Sink::Local;
            }
        }
    }

    /// Returns true when a remote channel is open
    pub fn is_connected(&self) -> bool {
        matches!(&self.sink, Sink::Remote(remote) if remote.channel.is_some())
    }

    /// Returns true when publishing to the local log sink
    pub fn is_local(&self) -> bool {
        matches!(self.sink, Sink::Local)
    }

    /// Number of successful reconnects so far
    pub fn reconnects(&self) -> u64 {
        self.reconnects
    }

    /// Publishes one serialized record
    pub async fn publish(&mut self, payload: Bytes) -> PublishOutcome {
        let remote = match &mut self.sink {
            Sink::Local => {
                tracing::info!(
                    engine = %self.name,
                    "[{}] crawled > {}",
                    chrono::Local::now().format("%a %b %e %H:%M:%S %Y"),
                    String::from_utf8_lossy(&payload)
                );
                return PublishOutcome::Logged;
            }
            Sink::Remote(remote) => remote,
        };

        for attempt in 1..=PUBLISH_ATTEMPTS {
            let result = match &remote.channel {
                Some(channel) => channel.publish(payload.clone()).await,
                None => Err(PublishError::Connection("not connected".to_string())),
            };

            match result {
                Ok(()) => return PublishOutcome::Delivered,
                Err(e) if e.is_connection() => {
                    tracing::warn!(
                        engine = %self.name,
                        attempt,
                        "Publish failed ({}), reconnecting",
                        e
                    );
                    remote.channel = None;
                    match remote
                        .connector
                        .connect(&remote.connection, &remote.destination)
                        .await
                    {
                        Ok(channel) => {
                            remote.channel = Some(channel);
                            self.reconnects += 1;
                        }
                        Err(e) => {
                            tracing::warn!(engine = %self.name, attempt, "Reconnect failed: {}", e);
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(engine = %self.name, "Dropping message: {}", e);
                    return PublishOutcome::Dropped;
                }
            }
        }

        tracing::error!(
            engine = %self.name,
            "Dropping message after {} failed attempts",
            PUBLISH_ATTEMPTS
        );
        PublishOutcome::Dropped
    }
}
