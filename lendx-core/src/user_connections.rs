//! Address-keyed delivery on the `lending_orders` and `notification`
//! channels.
//!
//! Both are [`SubscriptionRegistry`] instances whose channel id is the
//! lower-cased user address, so a user with several open sockets receives
//! every message on each of them.

use crate::registry::SubscriptionRegistry;
use async_trait::async_trait;
use lendx_sdk::objects::ws::channels;
use lendx_sdk::objects::{EngineStatus, LendingOrderPayload, Notification};

/// Addressed delivery of lifecycle messages to one user.
#[async_trait]
pub trait UserMessenger: Send + Sync {
    async fn send_lending_order_message(
        &self,
        event: EngineStatus,
        address: &str,
        payload: LendingOrderPayload,
    );

    async fn send_notification_message(
        &self,
        event: EngineStatus,
        address: &str,
        notification: Notification,
    );
}

pub struct UserConnections {
    pub lending_orders: SubscriptionRegistry<LendingOrderPayload>,
    pub notifications: SubscriptionRegistry<Notification>,
}

impl Default for UserConnections {
    fn default() -> Self {
        Self::new()
    }
}

impl UserConnections {
    pub fn new() -> Self {
        Self {
            lending_orders: SubscriptionRegistry::new(channels::LENDING_ORDERS),
            notifications: SubscriptionRegistry::new(channels::NOTIFICATION),
        }
    }
}

/// Channel id used for a user address.
pub fn user_channel_id(address: &str) -> String {
    address.to_lowercase()
}

#[async_trait]
impl UserMessenger for UserConnections {
    async fn send_lending_order_message(
        &self,
        event: EngineStatus,
        address: &str,
        payload: LendingOrderPayload,
    ) {
        self.lending_orders
            .send_message(&user_channel_id(address), event, &payload)
            .await;
    }

    async fn send_notification_message(
        &self,
        event: EngineStatus,
        address: &str,
        notification: Notification,
    ) {
        self.notifications
            .send_message(&user_channel_id(address), event, &notification)
            .await;
    }
}
