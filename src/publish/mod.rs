//! Publish module for forwarding crawled records
//!
//! This module handles:
//! - The reliable publisher with bounded retry and reconnect
//! - The local log sink used when no message sink is reachable
//! - The NATS-backed message sink

mod nats;
mod publisher;
mod traits;

pub use nats::NatsConnector;
pub use publisher::{PublishOutcome, Publisher, PUBLISH_ATTEMPTS};
pub use traits::{
    Channel, ConnectionInfo, Connector, Destination, PublishError, PublishResult,
};
