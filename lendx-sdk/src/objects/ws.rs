//! WebSocket frame types.
//!
//! A single socket multiplexes several channel families. Every frame, in
//! both directions, has the shape:
//!
//! ```json
//! {"channel":"lending_orderbook","event":{"type":"UPDATE","payload":{ ... }}}
//! ```
//!
//! # Protocol
//!
//! 1. The client sends `SUBSCRIBE` on a channel. For `lending_orderbook`
//!    the payload is an [`OrderBookSubscription`]; for `lending_orders` and
//!    `notification` it is the user's address.
//! 2. The server answers with `INIT` (current book or stored notifications)
//!    or `ERROR` if the request was invalid.
//! 3. `UPDATE` frames follow on `lending_orderbook`; lifecycle events
//!    (e.g. `LENDING_ORDER_ADDED`) follow on `lending_orders` and
//!    `notification`.
//! 4. `UNSUBSCRIBE` stops a single channel; closing the socket stops all.

use serde::{Deserialize, Serialize};

use super::{EngineStatus, LendingOrder, LendingTrade};

/// Channel family names.
pub mod channels {
    pub const LENDING_ORDER_BOOK: &str = "lending_orderbook";
    pub const LENDING_ORDERS: &str = "lending_orders";
    pub const NOTIFICATION: &str = "notification";
}

/// Subscription-management and data-delivery event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ControlEvent {
    Subscribe,
    Unsubscribe,
    Init,
    Update,
    Error,
}

/// The `type` of a frame's event: either a control event or a lifecycle
/// status forwarded to the order's owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventType {
    Control(ControlEvent),
    Lifecycle(EngineStatus),
}

impl From<ControlEvent> for EventType {
    fn from(value: ControlEvent) -> Self {
        EventType::Control(value)
    }
}

impl From<EngineStatus> for EventType {
    fn from(value: EngineStatus) -> Self {
        EventType::Lifecycle(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "P: Deserialize<'de> + Default"))]
pub struct WsEvent<P> {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub payload: P,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "P: Deserialize<'de> + Default"))]
pub struct WsFrame<P> {
    pub channel: String,
    pub event: WsEvent<P>,
}

impl<P> WsFrame<P> {
    pub fn new(channel: impl Into<String>, event_type: impl Into<EventType>, payload: P) -> Self {
        Self {
            channel: channel.into(),
            event: WsEvent {
                event_type: event_type.into(),
                payload,
            },
        }
    }
}

/// `SUBSCRIBE` payload for the `lending_orderbook` channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBookSubscription {
    pub term: u64,
    pub lending_token: String,
}

/// Payload of `ERROR` frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsErrorPayload {
    pub message: String,
}

impl WsErrorPayload {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Payload of lifecycle frames on the `lending_orders` channel.
///
/// Repay, top-up and recall events carry the trade; everything else carries
/// the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LendingOrderPayload {
    Order(LendingOrder),
    Trade(LendingTrade),
}
