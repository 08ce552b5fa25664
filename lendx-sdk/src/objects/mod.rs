pub mod amount;
pub mod broker;
pub mod engine;
pub mod lending;
pub mod notification;
pub mod order_book;
pub mod ws;

pub use amount::{AmountParseError, TokenAmount};
pub use broker::BrokerMessage;
pub use engine::{EngineResponse, EngineStatus};
pub use lending::{
    LendingOrder, LendingOrderType, LendingSide, LendingStatus, LendingTrade, ValidationError,
};
pub use notification::{Notification, NotificationMessage, NotificationType, ReadStatus};
pub use order_book::{LendingOrderBook, OrderBookLevel, lending_order_book_channel_id};
pub use ws::{
    ControlEvent, EventType, LendingOrderPayload, OrderBookSubscription, WsErrorPayload, WsEvent,
    WsFrame,
};

/// Serde adapter for `u64` values carried as base-10 strings.
pub(crate) mod u64_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
