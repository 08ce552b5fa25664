use super::{Broker, BrokerError};
use async_nats::{Client, Subscriber};
use async_trait::async_trait;
use bytes::Bytes;
use lendx_sdk::objects::BrokerMessage;
use std::time::Duration;
use tracing::info;

/// [`Broker`] over NATS core publish/subscribe.
#[derive(Clone)]
pub struct NatsBroker {
    client: Client,
    publish_timeout: Duration,
}

impl NatsBroker {
    pub async fn connect(url: &str, publish_timeout: Duration) -> Result<Self, BrokerError> {
        info!("Connecting to NATS at {}", url);
        let client = async_nats::connect(url).await?;
        Ok(Self {
            client,
            publish_timeout,
        })
    }

    /// Subscribe to a subject. Messages are pushed as they arrive.
    pub async fn subscribe(&self, subject: &str) -> Result<Subscriber, BrokerError> {
        info!("Subscribing to subject: {}", subject);
        Ok(self.client.subscribe(subject.to_string()).await?)
    }

    /// Flush buffered publishes. Used on shutdown.
    pub async fn flush(&self) {
        if let Err(e) = self.client.flush().await {
            tracing::warn!(error = %e, "Failed to flush NATS client");
        }
    }
}

#[async_trait]
impl Broker for NatsBroker {
    async fn publish(&self, subject: &str, message: &BrokerMessage) -> Result<(), BrokerError> {
        let payload = Bytes::from(message.to_vec()?);
        tokio::time::timeout(
            self.publish_timeout,
            self.client.publish(subject.to_string(), payload),
        )
        .await
        .map_err(|_| BrokerError::Timeout(self.publish_timeout))??;
        Ok(())
    }
}
