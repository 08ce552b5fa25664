//! Event channel factories and handles.

use lendx_sdk::objects::{BrokerMessage, EngineResponse};
use tokio::sync::mpsc;

/// Default buffer size for event channels.
///
/// This provides enough buffer to handle bursts while keeping memory bounded.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for engine responses consumed from the broker.
pub type EngineResponseSender = mpsc::Sender<EngineResponse>;
/// Receiver handle for engine responses, drained by the `Dispatcher`.
pub type EngineResponseReceiver = mpsc::Receiver<EngineResponse>;

/// Sender handle for inbound order messages.
pub type OrderMessageSender = mpsc::Sender<BrokerMessage>;
/// Receiver handle for inbound order messages, drained by the intake.
pub type OrderMessageReceiver = mpsc::Receiver<BrokerMessage>;

/// Create a new EngineResponse channel.
pub fn engine_response_channel() -> (EngineResponseSender, EngineResponseReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Create a new inbound order message channel.
pub fn order_message_channel() -> (OrderMessageSender, OrderMessageReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}
