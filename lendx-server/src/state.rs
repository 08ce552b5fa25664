//! Application state shared across all request handlers.

use lendx_core::registry::SubscriptionRegistry;
use lendx_core::store::LendingStore;
use lendx_core::user_connections::UserConnections;
use lendx_sdk::objects::LendingOrderBook;
use std::sync::Arc;
use tokio::sync::watch;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Storage, used for INIT replies.
    pub store: Arc<dyn LendingStore>,
    /// `lending_orderbook` subscriptions.
    pub order_books: Arc<SubscriptionRegistry<LendingOrderBook>>,
    /// `lending_orders` and `notification` subscriptions.
    pub users: Arc<UserConnections>,
    /// Outbound queue capacity for each new websocket.
    pub client_queue_capacity: usize,
    /// Flips to `true` when the process is shutting down.
    pub shutdown: watch::Receiver<bool>,
}
