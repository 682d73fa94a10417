//! NATS-backed message sink

use crate::publish::traits::{
    Channel, ConnectionInfo, Connector, Destination, PublishError, PublishResult,
};
use async_nats::client::PublishErrorKind;
use async_trait::async_trait;
use bytes::Bytes;

/// Connects to a NATS server
#[derive(Debug, Clone, Copy, Default)]
pub struct NatsConnector;

#[async_trait]
impl Connector for NatsConnector {
    async fn connect(
        &self,
        connection: &ConnectionInfo,
        destination: &Destination,
    ) -> PublishResult<Box<dyn Channel>> {
        let options = match (&connection.user, &connection.password) {
            (Some(user), Some(password)) => {
                async_nats::ConnectOptions::with_user_and_password(user.clone(), password.clone())
            }
            _ => async_nats::ConnectOptions::new(),
        };

        let client = options
            .connect(connection.url.as_str())
            .await
            .map_err(|e| PublishError::Connect(e.to_string()))?;

        // NATS subjects need no declaration; a flush proves the fresh connection works
        client
            .flush()
            .await
            .map_err(|e| PublishError::Connection(e.to_string()))?;

        tracing::debug!(
            "Connected to {} for subject {}",
            connection.url,
            destination.subject
        );

        Ok(Box::new(NatsChannel {
            client,
            subject: destination.subject.clone(),
        }))
    }
}

struct NatsChannel {
    client: async_nats::Client,
    subject: String,
}

#[async_trait]
impl Channel for NatsChannel {
    async fn publish(&self, payload: Bytes) -> PublishResult<()> {
        self.client
            .publish(self.subject.clone(), payload)
            .await
            .map_err(|e| match e.kind() {
                PublishErrorKind::MaxPayloadExceeded => PublishError::Rejected(e.to_string()),
                _ => PublishError::Connection(e.to_string()),
            })
    }
}
