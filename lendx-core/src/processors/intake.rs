//! LendingIntake processor.
//!
//! Both ends of the order subject:
//! - submission: validate a new or cancel request and publish it for the
//!   matching engine
//! - consumption: apply `NEW_LENDING_ORDER` / `CANCEL_LENDING_ORDER`
//!   messages to storage

use crate::broker::{Broker, BrokerError};
use crate::events::OrderMessageReceiver;
use crate::store::{LendingStore, StoreError};
use lendx_sdk::objects::broker::message_types;
use lendx_sdk::objects::{BrokerMessage, LendingOrder, ValidationError};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("invalid order: {0}")]
    Validation(#[from] ValidationError),

    #[error("failed to decode order: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),
}

pub struct LendingIntake {
    store: Arc<dyn LendingStore>,
    broker: Arc<dyn Broker>,
    order_subject: String,
}

impl LendingIntake {
    pub fn new(
        store: Arc<dyn LendingStore>,
        broker: Arc<dyn Broker>,
        order_subject: impl Into<String>,
    ) -> Self {
        Self {
            store,
            broker,
            order_subject: order_subject.into(),
        }
    }

    /// Validate a new order and publish it on the order subject.
    pub async fn new_lending_order(&self, order: &LendingOrder) -> Result<(), IntakeError> {
        order.validate_new()?;
        self.publish(message_types::NEW_LENDING_ORDER, order).await
    }

    /// Validate a cancellation and publish it on the order subject.
    pub async fn cancel_lending_order(&self, order: &LendingOrder) -> Result<(), IntakeError> {
        order.validate_cancel()?;
        self.publish(message_types::CANCEL_LENDING_ORDER, order)
            .await
    }

    async fn publish(&self, message_type: &str, order: &LendingOrder) -> Result<(), IntakeError> {
        let message = BrokerMessage::new(message_type, order)?;
        self.broker.publish(&self.order_subject, &message).await?;
        debug!(order_hash = %order.hash, message_type, "Published lending order message");
        Ok(())
    }

    /// Apply one inbound order message to storage.
    ///
    /// Unknown message types are logged and dropped.
    pub async fn handle_lending_orders_create_cancel(
        &self,
        message: &BrokerMessage,
    ) -> Result<(), IntakeError> {
        match message.message_type.as_str() {
            message_types::NEW_LENDING_ORDER => {
                let order: LendingOrder = message.decode()?;
                self.store.add_lending_order(&order).await?;
                debug!(order_hash = %order.hash, "Stored new lending order");
            }
            message_types::CANCEL_LENDING_ORDER => {
                let order: LendingOrder = message.decode()?;
                self.store.cancel_lending_order(&order).await?;
                debug!(order_hash = %order.hash, "Cancelled lending order");
            }
            other => {
                error!(message_type = other, "Unknown lending order message");
            }
        }
        Ok(())
    }

    /// Drain inbound order messages until shutdown.
    pub async fn run(
        self,
        mut message_rx: OrderMessageReceiver,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!("LendingIntake started");

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("LendingIntake received shutdown signal");
                        break;
                    }
                }

                Some(message) = message_rx.recv() => {
                    if let Err(e) = self.handle_lending_orders_create_cancel(&message).await {
                        error!(
                            message_type = %message.message_type,
                            error = %e,
                            "Failed to handle lending order message"
                        );
                    }
                }

                else => {
                    info!("Order message channel closed");
                    break;
                }
            }
        }

        info!("LendingIntake shutdown complete");
    }
}
