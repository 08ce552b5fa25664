//! Event types and channel infrastructure.
//!
//! # Event Flow
//!
//! 1. A write to a lending document table fires a `LendingOrderChangeEvent`
//!    -> `ChangeWatcher`
//! 2. `ChangeWatcher` publishes an `EngineResponse` on the broker response
//!    subject
//! 3. The broker consumer forwards each `EngineResponse` -> `Dispatcher`
//! 4. `Dispatcher` notifies the order's owner and feeds `BulkAggregator`
//! 5. `BulkAggregator` broadcasts coalesced order-book snapshots
//!
//! Inbound `NEW_LENDING_ORDER` / `CANCEL_LENDING_ORDER` messages travel
//! broker consumer -> `LendingIntake` -> storage, and re-enter at step 1.

pub mod channels;
pub mod types;

pub use channels::{
    DEFAULT_CHANNEL_BUFFER, EngineResponseReceiver, EngineResponseSender, OrderMessageReceiver,
    OrderMessageSender, engine_response_channel, order_message_channel,
};

pub use types::{DocumentType, LendingOrderChangeEvent, OperationType};
