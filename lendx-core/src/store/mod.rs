//! Storage collaborators used by the pipeline.
//!
//! The pipeline only sees the [`LendingStore`] and [`ChangeFeed`] traits.
//! Postgres implementations live in [`postgres`] and [`change_feed`].

pub mod change_feed;
pub mod postgres;

use async_trait::async_trait;
use lendx_sdk::objects::{
    AmountParseError, LendingOrder, LendingOrderBook, LendingSide, LendingTrade, Notification,
    NotificationMessage, NotificationType, ReadStatus, TokenAmount,
};
use thiserror::Error;

use crate::entities::normalize_hash;

pub use change_feed::{ChangeFeed, ChangeFeedError, ChangeStream, PgChangeFeed};
pub use postgres::PgLendingStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid stored amount: {0}")]
    Amount(#[from] AmountParseError),

    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: String },

    #[error("order {0} has a status that cannot be stored")]
    UnstorableStatus(String),

    #[error("order {0} not found or no longer cancellable")]
    NotCancellable(String),
}

/// A notification about to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub recipient: String,
    pub message: NotificationMessage,
    pub notification_type: NotificationType,
    pub status: ReadStatus,
    /// Identifies the lifecycle event the notification reports. Storing a
    /// second notification with the same key returns the first one.
    pub dedupe_key: Option<String>,
}

impl NewNotification {
    /// An unread log entry about one order.
    pub fn unread_log(recipient: &str, message_type: &str, order_hash: &str) -> Self {
        Self {
            recipient: recipient.to_string(),
            message: NotificationMessage {
                message_type: message_type.to_string(),
                description: order_hash.to_string(),
            },
            notification_type: NotificationType::Log,
            status: ReadStatus::Unread,
            dedupe_key: None,
        }
    }

    /// An unread log entry for `event` on `order`, keyed by the order's
    /// hash, the event and the order's last update time.
    ///
    /// Every replica observes the same storage change, so the same event
    /// reaches each dispatcher more than once.
    pub fn order_event(event: &str, order: &LendingOrder) -> Self {
        let mut notification = Self::unread_log(&order.user_address, event, &order.hash);
        notification.dedupe_key = order.updated_at.map(|at| {
            format!(
                "{}:{}:{}",
                normalize_hash(&order.hash),
                event,
                at.unix_timestamp_nanos()
            )
        });
        notification
    }
}

#[async_trait]
pub trait LendingStore: Send + Sync {
    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, StoreError>;

    async fn get_lending_trade_by_hash(&self, hash: &str)
    -> Result<Option<LendingTrade>, StoreError>;

    /// Aggregate open volume at one interest rate. Zero when nothing rests
    /// there.
    async fn get_lending_order_book_interest(
        &self,
        term: u64,
        lending_token: &str,
        interest: u64,
        side: LendingSide,
    ) -> Result<TokenAmount, StoreError>;

    async fn add_lending_order(&self, order: &LendingOrder) -> Result<(), StoreError>;

    async fn cancel_lending_order(&self, order: &LendingOrder) -> Result<(), StoreError>;

    async fn get_notifications_by_user(
        &self,
        address: &str,
        limit: i64,
    ) -> Result<Vec<Notification>, StoreError>;

    async fn get_lending_order_book(
        &self,
        term: u64,
        lending_token: &str,
    ) -> Result<LendingOrderBook, StoreError>;
}
