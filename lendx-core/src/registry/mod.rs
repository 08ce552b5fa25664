//! Generic channel subscription registry.
//!
//! One registry serves one websocket channel family (`lending_orderbook`,
//! `lending_orders`, `notification`) and maps channel ids within that family
//! to the connections subscribed to them. An inverse index from connection
//! to channel ids makes tearing a connection down proportional to the number
//! of channels it joined.
//!
//! Both indices sit behind a single lock. Broadcasts copy the subscriber list
//! under a read lock and deliver after releasing it, so a slow or full
//! connection never holds up subscription changes.

mod client;

pub use client::{Client, ClientId, ClientSendError, DEFAULT_CLIENT_QUEUE_CAPACITY};

use lendx_sdk::objects::{ControlEvent, EventType, WsErrorPayload, WsFrame};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("connection {0} is gone")]
    NoConnection(ClientId),
}

#[derive(Default)]
struct Subscriptions {
    channels: HashMap<String, HashMap<ClientId, Arc<Client>>>,
    client_channels: HashMap<ClientId, HashSet<String>>,
}

pub struct SubscriptionRegistry<P> {
    name: &'static str,
    subscriptions: RwLock<Subscriptions>,
    _payload: PhantomData<fn(&P)>,
}

impl<P: Serialize> SubscriptionRegistry<P> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            subscriptions: RwLock::new(Subscriptions::default()),
            _payload: PhantomData,
        }
    }

    /// The websocket channel family this registry serves.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Subscribe `client` to `channel_id`. Subscribing twice is a no-op.
    pub async fn subscribe(
        &self,
        channel_id: &str,
        client: &Arc<Client>,
    ) -> Result<(), RegistryError> {
        if client.is_closed() {
            return Err(RegistryError::NoConnection(client.id()));
        }
        let mut subs = self.subscriptions.write().await;
        subs.channels
            .entry(channel_id.to_string())
            .or_default()
            .insert(client.id(), client.clone());
        subs.client_channels
            .entry(client.id())
            .or_default()
            .insert(channel_id.to_string());
        debug!(registry = self.name, channel_id, client_id = %client.id(), "Subscribed");
        Ok(())
    }

    /// Remove `client` from one channel. No-op if it was not subscribed.
    pub async fn unsubscribe_channel(&self, channel_id: &str, client: &Client) {
        let mut subs = self.subscriptions.write().await;
        let id = client.id();
        if let Some(members) = subs.channels.get_mut(channel_id) {
            members.remove(&id);
            if members.is_empty() {
                subs.channels.remove(channel_id);
            }
        }
        if let Some(joined) = subs.client_channels.get_mut(&id) {
            joined.remove(channel_id);
            if joined.is_empty() {
                subs.client_channels.remove(&id);
            }
        }
    }

    /// Remove `client` from every channel it joined.
    pub async fn unsubscribe(&self, client: &Client) {
        let mut subs = self.subscriptions.write().await;
        let id = client.id();
        let Some(joined) = subs.client_channels.remove(&id) else {
            return;
        };
        for channel_id in joined {
            if let Some(members) = subs.channels.get_mut(&channel_id) {
                members.remove(&id);
                if members.is_empty() {
                    subs.channels.remove(&channel_id);
                }
            }
        }
        debug!(registry = self.name, client_id = %id, "Unsubscribed from all channels");
    }

    /// Send an `UPDATE` frame to every subscriber of `channel_id`.
    pub async fn broadcast_message(&self, channel_id: &str, payload: &P) -> usize {
        self.send_message(channel_id, ControlEvent::Update, payload)
            .await
    }

    /// Send a frame with any event type to every subscriber of `channel_id`.
    ///
    /// Returns how many connections accepted the frame. Closed or kicked
    /// connections are skipped.
    pub async fn send_message(
        &self,
        channel_id: &str,
        event_type: impl Into<EventType>,
        payload: &P,
    ) -> usize {
        let targets: Vec<Arc<Client>> = {
            let subs = self.subscriptions.read().await;
            match subs.channels.get(channel_id) {
                Some(members) => members.values().cloned().collect(),
                None => return 0,
            }
        };

        let frame = match serde_json::to_string(&WsFrame::new(self.name, event_type, payload)) {
            Ok(frame) => frame,
            Err(e) => {
                error!(registry = self.name, channel_id, error = %e, "Failed to encode frame");
                return 0;
            }
        };

        targets
            .iter()
            .filter(|client| client.send_raw(frame.clone()).is_ok())
            .count()
    }

    /// Reply to one connection with an `INIT` frame.
    pub fn send_init_message<T: Serialize + ?Sized>(
        &self,
        client: &Client,
        payload: &T,
    ) -> Result<(), ClientSendError> {
        client.send_message(self.name, ControlEvent::Init, payload)
    }

    /// Reply to one connection with an `ERROR` frame.
    pub fn send_error_message(
        &self,
        client: &Client,
        message: impl Into<String>,
    ) -> Result<(), ClientSendError> {
        client.send_message(self.name, ControlEvent::Error, &WsErrorPayload::new(message))
    }

    pub async fn subscriber_count(&self, channel_id: &str) -> usize {
        self.subscriptions
            .read()
            .await
            .channels
            .get(channel_id)
            .map_or(0, HashMap::len)
    }

    /// Number of channels `client` is subscribed to.
    pub async fn channel_count(&self, client: &Client) -> usize {
        self.subscriptions
            .read()
            .await
            .client_channels
            .get(&client.id())
            .map_or(0, HashSet::len)
    }
}
