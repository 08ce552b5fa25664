//! BulkAggregator processor.
//!
//! Order-book deltas arrive far more often than clients need them. The
//! aggregator keeps only the latest version of each order per order-book
//! channel and, once per tick, turns the buffered orders into one snapshot
//! per channel.

use crate::registry::SubscriptionRegistry;
use crate::store::LendingStore;
use crate::utils::ticker::Ticker;
use itertools::Itertools;
use lendx_sdk::objects::{LendingOrder, LendingOrderBook, LendingSide, OrderBookLevel, TokenAmount};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info};

/// channel id -> order hash -> latest order.
pub type PendingOrders = HashMap<String, HashMap<String, LendingOrder>>;

pub struct BulkAggregator {
    pending: Mutex<PendingOrders>,
    store: Arc<dyn LendingStore>,
    order_books: Arc<SubscriptionRegistry<LendingOrderBook>>,
}

impl BulkAggregator {
    pub fn new(
        store: Arc<dyn LendingStore>,
        order_books: Arc<SubscriptionRegistry<LendingOrderBook>>,
    ) -> Self {
        Self {
            pending: Mutex::new(PendingOrders::new()),
            store,
            order_books,
        }
    }

    /// Buffer an order for the next flush, replacing any earlier version.
    pub async fn save(&self, order: LendingOrder) {
        let channel_id = order.order_book_channel_id();
        let mut pending = self.pending.lock().await;
        pending
            .entry(channel_id)
            .or_default()
            .insert(order.hash.clone(), order);
    }

    /// Detach everything buffered so far, leaving an empty buffer behind.
    pub async fn take(&self) -> PendingOrders {
        std::mem::take(&mut *self.pending.lock().await)
    }

    /// Broadcast one snapshot per channel with buffered orders.
    ///
    /// Returns the number of snapshots broadcast.
    pub async fn flush(&self) -> usize {
        let pending = self.take().await;
        let mut flushed = 0;
        for (channel_id, orders) in pending {
            if orders.is_empty() {
                continue;
            }
            let snapshot = self
                .build_snapshot(channel_id, orders.into_values().collect())
                .await;
            let delivered = self
                .order_books
                .broadcast_message(&snapshot.name, &snapshot)
                .await;
            debug!(
                channel_id = %snapshot.name,
                borrow = snapshot.borrow.len(),
                lend = snapshot.lend.len(),
                delivered,
                "Broadcast lending order book"
            );
            flushed += 1;
        }
        flushed
    }

    /// Look up the current volume at every interest rate touched by
    /// `orders`, per side. Failed lookups are reported as zero.
    pub async fn build_snapshot(
        &self,
        channel_id: String,
        orders: Vec<LendingOrder>,
    ) -> LendingOrderBook {
        let (borrow, lend): (Vec<_>, Vec<_>) = orders
            .iter()
            .partition(|o| o.side == LendingSide::Borrow);

        LendingOrderBook {
            borrow: self.levels(LendingSide::Borrow, &borrow).await,
            lend: self.levels(LendingSide::Lend, &lend).await,
            name: channel_id,
        }
    }

    async fn levels(&self, side: LendingSide, orders: &[&LendingOrder]) -> Vec<OrderBookLevel> {
        let points = orders
            .iter()
            .map(|o| (o.interest, o.term, o.lending_token.as_str()))
            .sorted()
            .dedup_by(|a, b| a.0 == b.0);

        let mut levels = Vec::new();
        for (interest, term, lending_token) in points {
            let amount = match self
                .store
                .get_lending_order_book_interest(term, lending_token, interest, side)
                .await
            {
                Ok(amount) => amount,
                Err(e) => {
                    error!(
                        term,
                        lending_token,
                        interest,
                        side = %side,
                        error = %e,
                        "Failed to load order book volume"
                    );
                    TokenAmount::zero()
                }
            };
            levels.push(OrderBookLevel { interest, amount });
        }
        levels
    }

    /// Flush on every tick until shutdown.
    pub async fn run<T: Ticker>(
        self: Arc<Self>,
        mut ticker: T,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!("BulkAggregator started");

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("BulkAggregator received shutdown signal");
                        break;
                    }
                }

                ticked = ticker.tick() => {
                    if !ticked {
                        info!("BulkAggregator ticker stopped");
                        break;
                    }
                    self.flush().await;
                }
            }
        }

        info!("BulkAggregator shutdown complete");
    }
}
