//! Message broker seam.
//!
//! The pipeline publishes through the [`Broker`] trait; consumers are run by
//! the server against the handlers in [`crate::processors`].

pub mod nats;

use async_trait::async_trait;
use lendx_sdk::objects::BrokerMessage;
use std::time::Duration;
use thiserror::Error;

pub use nats::NatsBroker;

/// Default subject for inbound order messages.
pub const DEFAULT_ORDER_SUBJECT: &str = "lending.orders";
/// Default subject for lifecycle responses.
pub const DEFAULT_RESPONSE_SUBJECT: &str = "lending.responses";
/// Default publish timeout.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to connect to broker: {0}")]
    Connect(#[from] async_nats::ConnectError),

    #[error("failed to publish: {0}")]
    Publish(#[from] async_nats::PublishError),

    #[error("failed to subscribe: {0}")]
    Subscribe(#[from] async_nats::SubscribeError),

    #[error("publish timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish(&self, subject: &str, message: &BrokerMessage) -> Result<(), BrokerError>;
}

/// Subjects the pipeline publishes on and consumes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerSubjects {
    /// `NEW_LENDING_ORDER` / `CANCEL_LENDING_ORDER` envelopes.
    pub orders: String,
    /// `LENDING_ORDER_RESPONSE` envelopes.
    pub responses: String,
}

impl Default for BrokerSubjects {
    fn default() -> Self {
        Self {
            orders: DEFAULT_ORDER_SUBJECT.to_string(),
            responses: DEFAULT_RESPONSE_SUBJECT.to_string(),
        }
    }
}
