//! Event processors for the lending order pipeline.
//!
//! - `ChangeWatcher`: observes lending document tables, publishes `EngineResponse`
//! - `Dispatcher`: receives `EngineResponse`, notifies users, feeds the aggregator
//! - `BulkAggregator`: coalesces order-book deltas into periodic snapshots
//! - `LendingIntake`: validates/publishes submissions and applies inbound
//!   order messages to storage

pub mod bulk_aggregator;
pub mod change_watcher;
pub mod dispatcher;
pub mod intake;

pub use bulk_aggregator::{BulkAggregator, PendingOrders};
pub use change_watcher::{ChangeWatcher, handle_document_type, map_status};
pub use dispatcher::{DispatchError, DispatchTable, Dispatcher, Handler};
pub use intake::{IntakeError, LendingIntake};

use crate::broker::Broker;
use crate::events::DocumentType;
use crate::store::ChangeFeed;
use crate::utils::ticker::Ticker;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Start one [`ChangeWatcher`] per document type plus the aggregator's
/// flush task.
///
/// A watcher that cannot open its stream ends on its own without
/// affecting the others.
pub fn watch_changes<T: Ticker + 'static>(
    feed: Arc<dyn ChangeFeed>,
    broker: Arc<dyn Broker>,
    response_subject: &str,
    aggregator: Arc<BulkAggregator>,
    ticker: T,
    shutdown_rx: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let mut handles: Vec<JoinHandle<()>> = DocumentType::ALL
        .into_iter()
        .map(|doc_type| {
            let watcher =
                ChangeWatcher::new(doc_type, feed.clone(), broker.clone(), response_subject);
            tokio::spawn(watcher.run(shutdown_rx.clone()))
        })
        .collect();
    handles.push(tokio::spawn(aggregator.run(ticker, shutdown_rx)));
    handles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{LendingOrderChangeEvent, OperationType};
    use crate::registry::{Client, SubscriptionRegistry};
    use crate::store::LendingStore;
    use crate::testing::{FakeChangeFeed, FakeStore, ManualTicker, RecordingBroker, sample_order};
    use crate::user_connections::{UserConnections, user_channel_id};
    use lendx_sdk::objects::ws::channels;
    use lendx_sdk::objects::{
        EngineResponse, EngineStatus, LendingOrder, LendingOrderBook, LendingSide, LendingStatus,
        OrderBookLevel, TokenAmount,
    };

    struct Pipeline {
        feed: Arc<FakeChangeFeed>,
        store: Arc<FakeStore>,
        books: Arc<SubscriptionRegistry<LendingOrderBook>>,
        users: Arc<UserConnections>,
        aggregator: Arc<BulkAggregator>,
        dispatcher: Dispatcher,
        tick: tokio::sync::mpsc::UnboundedSender<()>,
        published: tokio::sync::mpsc::UnboundedReceiver<(String, lendx_sdk::objects::BrokerMessage)>,
        shutdown_tx: watch::Sender<bool>,
        handles: Vec<JoinHandle<()>>,
        order_events: tokio::sync::mpsc::UnboundedSender<
            Result<LendingOrderChangeEvent, crate::store::ChangeFeedError>,
        >,
    }

    fn pipeline() -> Pipeline {
        let feed = Arc::new(FakeChangeFeed::default());
        let order_events = feed.channel(DocumentType::LendingOrder);
        let store = Arc::new(FakeStore::default());
        let (broker, published) = RecordingBroker::new();
        let books = Arc::new(SubscriptionRegistry::new(channels::LENDING_ORDER_BOOK));
        let users = Arc::new(UserConnections::new());
        let aggregator = Arc::new(BulkAggregator::new(store.clone(), books.clone()));
        let dispatcher = Dispatcher::new(store.clone(), users.clone(), aggregator.clone()).unwrap();
        let (ticker, tick) = ManualTicker::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handles = watch_changes(
            feed.clone(),
            broker,
            "lending.responses",
            aggregator.clone(),
            ticker,
            shutdown_rx,
        );
        Pipeline {
            feed,
            store,
            books,
            users,
            aggregator,
            dispatcher,
            tick,
            published,
            shutdown_tx,
            handles,
            order_events,
        }
    }

    impl Pipeline {
        /// Storage write -> watcher -> broker -> dispatcher.
        ///
        /// `order` is the row as storage now holds it.
        async fn observe(&mut self, order: &LendingOrder, expected: EngineStatus) {
            self.order_events
                .send(Ok(LendingOrderChangeEvent {
                    operation_type: OperationType::Update,
                    full_document: Some(order.clone()),
                }))
                .unwrap();

            // The server's response consumer does this step.
            let (_, message) = self.published.recv().await.unwrap();
            let response: EngineResponse = message.decode().unwrap();
            assert_eq!(response.status, expected);
            self.dispatcher.handle_lending_order_response(response).await;
        }

        async fn stop(self) {
            self.shutdown_tx.send(true).unwrap();
            for handle in self.handles {
                handle.await.unwrap();
            }
            drop(self.feed);
        }
    }

    async fn next_frame(rx: &mut tokio::sync::mpsc::Receiver<String>) -> serde_json::Value {
        serde_json::from_str(&rx.recv().await.unwrap()).unwrap()
    }

    fn resting_lend_order(hash: &str, quantity: u64) -> LendingOrder {
        let mut order = sample_order(hash);
        order.side = LendingSide::Lend;
        order.status = LendingStatus::Open;
        order.quantity = TokenAmount::from(quantity);
        order
    }

    /// Both user frames for one lifecycle event, in delivery order.
    async fn expect_user_frames(
        rx: &mut tokio::sync::mpsc::Receiver<String>,
        order: &LendingOrder,
        expected: EngineStatus,
    ) {
        let first = next_frame(rx).await;
        assert_eq!(first["channel"], "lending_orders");
        assert_eq!(first["event"]["type"], expected.as_str());
        assert_eq!(first["event"]["payload"]["hash"], order.hash.as_str());
        let second = next_frame(rx).await;
        assert_eq!(second["channel"], "notification");
        assert_eq!(second["event"]["type"], expected.as_str());
        assert_eq!(second["event"]["payload"]["message"]["description"], order.hash.as_str());
    }

    fn lend_levels(snapshot: &serde_json::Value) -> serde_json::Value {
        assert_eq!(snapshot["event"]["type"], "UPDATE");
        assert_eq!(snapshot["event"]["payload"]["borrow"], serde_json::json!([]));
        snapshot["event"]["payload"]["lend"].clone()
    }

    #[tokio::test]
    async fn test_added_flow_end_to_end() {
        let mut p = pipeline();
        let order = resting_lend_order("0xe2e", 1_000);
        p.store.put_order(order.clone());

        let (user, mut user_rx) = Client::new(16);
        let channel = user_channel_id(&order.user_address);
        p.users.lending_orders.subscribe(&channel, &user).await.unwrap();
        p.users.notifications.subscribe(&channel, &user).await.unwrap();
        let (viewer, mut viewer_rx) = Client::new(16);
        p.books
            .subscribe(&order.order_book_channel_id(), &viewer)
            .await
            .unwrap();

        p.observe(&order, EngineStatus::Added).await;

        let notifications = p.store.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].message.message_type, "LENDING_ORDER_ADDED");
        assert_eq!(notifications[0].message.description, order.hash);
        expect_user_frames(&mut user_rx, &order, EngineStatus::Added).await;

        p.tick.send(()).unwrap();
        let snapshot = next_frame(&mut viewer_rx).await;
        assert_eq!(snapshot["event"]["payload"]["name"], order.order_book_channel_id());
        assert_eq!(
            lend_levels(&snapshot),
            serde_json::json!([{"interest": order.interest.to_string(), "amount": "1000"}])
        );

        p.stop().await;
    }

    #[tokio::test]
    async fn test_cancel_flow_end_to_end() {
        let mut p = pipeline();
        let h1 = resting_lend_order("0xh1", 1_000);
        // Shares h1's price level and stays on the book.
        let h2 = resting_lend_order("0xh2", 250);
        p.store.put_order(h1.clone());
        p.store.put_order(h2.clone());
        let level = |amount: &str| {
            serde_json::json!([{"interest": h1.interest.to_string(), "amount": amount}])
        };

        let (user, mut user_rx) = Client::new(16);
        let channel = user_channel_id(&h1.user_address);
        p.users.lending_orders.subscribe(&channel, &user).await.unwrap();
        p.users.notifications.subscribe(&channel, &user).await.unwrap();
        let (viewer, mut viewer_rx) = Client::new(16);
        p.books
            .subscribe(&h1.order_book_channel_id(), &viewer)
            .await
            .unwrap();

        p.observe(&h1, EngineStatus::Added).await;
        expect_user_frames(&mut user_rx, &h1, EngineStatus::Added).await;
        p.tick.send(()).unwrap();
        assert_eq!(lend_levels(&next_frame(&mut viewer_rx).await), level("1250"));

        p.store.cancel_lending_order(&h1).await.unwrap();
        let cancelled = p.store.order(&h1.hash).unwrap();
        assert_eq!(cancelled.status, LendingStatus::Cancelled);
        p.observe(&cancelled, EngineStatus::Cancelled).await;

        let notifications = p.store.notifications();
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[1].message.message_type, "LENDING_ORDER_CANCELLED");
        assert_eq!(notifications[1].message.description, h1.hash);
        expect_user_frames(&mut user_rx, &h1, EngineStatus::Cancelled).await;

        p.tick.send(()).unwrap();
        assert_eq!(lend_levels(&next_frame(&mut viewer_rx).await), level("250"));

        // A quiet window: no new snapshot, and the book no longer counts h1.
        p.tick.send(()).unwrap();
        assert_eq!(p.aggregator.flush().await, 0);
        let book = p
            .store
            .get_lending_order_book(h1.term, &h1.lending_token)
            .await
            .unwrap();
        assert_eq!(
            book.lend,
            vec![OrderBookLevel { interest: h1.interest, amount: TokenAmount::from(250u64) }]
        );
        assert!(p.store.cancel_lending_order(&h1).await.is_err());

        p.stop().await;
        assert!(viewer_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_missing_feeds_do_not_stop_running_watchers() {
        // Only the order table has a feed; the other three watchers fail
        // to open and exit.
        let mut p = pipeline();
        let mut order = sample_order("0x77");
        order.status = LendingStatus::Open;
        p.order_events
            .send(Ok(LendingOrderChangeEvent {
                operation_type: OperationType::Insert,
                full_document: Some(order),
            }))
            .unwrap();
        let (subject, _) = p.published.recv().await.unwrap();
        assert_eq!(subject, "lending.responses");

        p.stop().await;
    }
}
