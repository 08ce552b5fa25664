//! Dispatcher processor.
//!
//! The Dispatcher is responsible for:
//! - Receiving `EngineResponse` events from the broker consumer
//! - Persisting a notification for the order's owner
//! - Sending addressed `lending_orders` and `notification` messages
//! - Feeding every response except `ERROR` into the `BulkAggregator`

use crate::events::EngineResponseReceiver;
use crate::processors::bulk_aggregator::BulkAggregator;
use crate::store::{LendingStore, NewNotification};
use crate::user_connections::UserMessenger;
use lendx_sdk::objects::{EngineResponse, EngineStatus, LendingOrder, LendingOrderPayload};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("no handler registered for {0}")]
    MissingHandler(EngineStatus),
}

/// What the dispatcher does for one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    /// Persist a notification and message the owner under `event`.
    /// With `attach_trade`, the `lending_orders` message carries the trade
    /// instead of the order.
    Notify {
        event: EngineStatus,
        attach_trade: bool,
    },
    /// Known status with nothing to do.
    Ignored,
    /// Status this build does not recognise. Logged only.
    Unrecognized,
}

/// Status-keyed handler table, checked for completeness when built.
#[derive(Debug, Clone)]
pub struct DispatchTable {
    handlers: HashMap<EngineStatus, Handler>,
}

impl DispatchTable {
    /// Build a table, failing if any status has no entry.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (EngineStatus, Handler)>,
    ) -> Result<Self, DispatchError> {
        let handlers: HashMap<_, _> = entries.into_iter().collect();
        if let Some(missing) = EngineStatus::ALL
            .iter()
            .find(|status| !handlers.contains_key(status))
        {
            return Err(DispatchError::MissingHandler(*missing));
        }
        Ok(Self { handlers })
    }

    pub fn standard() -> Result<Self, DispatchError> {
        let notify = |event| Handler::Notify {
            event,
            attach_trade: false,
        };
        let with_trade = |event| Handler::Notify {
            event,
            attach_trade: true,
        };
        Self::from_entries([
            (EngineStatus::Added, notify(EngineStatus::Added)),
            (EngineStatus::Cancelled, notify(EngineStatus::Cancelled)),
            (EngineStatus::Rejected, notify(EngineStatus::Rejected)),
            (EngineStatus::PartiallyFilled, Handler::Ignored),
            (EngineStatus::Filled, Handler::Ignored),
            (EngineStatus::Repayed, with_trade(EngineStatus::Repayed)),
            (EngineStatus::Topuped, with_trade(EngineStatus::Topuped)),
            (EngineStatus::Recalled, with_trade(EngineStatus::Recalled)),
            (EngineStatus::TopupRejected, notify(EngineStatus::TopupRejected)),
            (EngineStatus::RepayRejected, notify(EngineStatus::RepayRejected)),
            (EngineStatus::RecallRejected, notify(EngineStatus::RecallRejected)),
            (EngineStatus::Error, notify(EngineStatus::Rejected)),
            (EngineStatus::Unknown, Handler::Unrecognized),
        ])
    }

    pub fn handler(&self, status: EngineStatus) -> Handler {
        self.handlers
            .get(&status)
            .copied()
            .unwrap_or(Handler::Unrecognized)
    }
}

/// Whether a response's order belongs in the next order-book snapshot.
fn feeds_order_book(status: EngineStatus) -> bool {
    !matches!(status, EngineStatus::Error | EngineStatus::Unknown)
}

pub struct Dispatcher {
    table: DispatchTable,
    store: Arc<dyn LendingStore>,
    messenger: Arc<dyn UserMessenger>,
    aggregator: Arc<BulkAggregator>,
}

impl Dispatcher {
    /// Create a Dispatcher with the standard handler table.
    pub fn new(
        store: Arc<dyn LendingStore>,
        messenger: Arc<dyn UserMessenger>,
        aggregator: Arc<BulkAggregator>,
    ) -> Result<Self, DispatchError> {
        Ok(Self::with_table(
            DispatchTable::standard()?,
            store,
            messenger,
            aggregator,
        ))
    }

    pub fn with_table(
        table: DispatchTable,
        store: Arc<dyn LendingStore>,
        messenger: Arc<dyn UserMessenger>,
        aggregator: Arc<BulkAggregator>,
    ) -> Self {
        Self {
            table,
            store,
            messenger,
            aggregator,
        }
    }

    /// Handle one lifecycle response. Failures are logged, never returned.
    pub async fn handle_lending_order_response(&self, res: EngineResponse) {
        let status = res.status;
        match self.table.handler(status) {
            Handler::Notify {
                event,
                attach_trade,
            } => {
                self.notify(event, attach_trade, &res.lending_order).await;
            }
            Handler::Ignored => {
                debug!(order_hash = %res.lending_order.hash, status = %status, "No action");
            }
            Handler::Unrecognized => {
                warn!(
                    order_hash = %res.lending_order.hash,
                    status = %status,
                    "Unrecognized engine response"
                );
            }
        }

        if feeds_order_book(status) {
            self.aggregator.save(res.lending_order).await;
        }
    }

    async fn notify(&self, event: EngineStatus, attach_trade: bool, order: &LendingOrder) {
        let notification = match self
            .store
            .create_notification(NewNotification::order_event(event.as_str(), order))
            .await
        {
            Ok(n) => Some(n),
            Err(e) => {
                error!(order_hash = %order.hash, event = %event, error = %e, "Failed to create notification");
                None
            }
        };

        let payload = if attach_trade {
            self.trade_payload(order).await
        } else {
            LendingOrderPayload::Order(order.clone())
        };
        self.messenger
            .send_lending_order_message(event, &order.user_address, payload)
            .await;

        if let Some(notification) = notification {
            self.messenger
                .send_notification_message(event, &order.user_address, notification)
                .await;
        }
    }

    /// The trade an order's repay / top-up / recall acted on. Falls back to
    /// the order itself when the trade cannot be loaded.
    async fn trade_payload(&self, order: &LendingOrder) -> LendingOrderPayload {
        match self.store.get_lending_trade_by_hash(&order.hash).await {
            Ok(Some(trade)) => LendingOrderPayload::Trade(trade),
            Ok(None) => {
                warn!(order_hash = %order.hash, "No lending trade for order");
                LendingOrderPayload::Order(order.clone())
            }
            Err(e) => {
                error!(order_hash = %order.hash, error = %e, "Failed to load lending trade");
                LendingOrderPayload::Order(order.clone())
            }
        }
    }

    /// Drain engine responses until shutdown.
    pub async fn run(
        self,
        mut response_rx: EngineResponseReceiver,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!("Dispatcher started");

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Dispatcher received shutdown signal");
                        break;
                    }
                }

                Some(res) = response_rx.recv() => {
                    debug!(
                        order_hash = %res.lending_order.hash,
                        status = %res.status,
                        "Received EngineResponse"
                    );
                    self.handle_lending_order_response(res).await;
                }

                else => {
                    info!("EngineResponse channel closed");
                    break;
                }
            }
        }

        info!("Dispatcher shutdown complete");
    }
}
