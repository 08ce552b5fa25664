//! In-memory collaborators for unit tests.

use crate::broker::{Broker, BrokerError};
use crate::entities::{self, normalize_hash};
use crate::events::{DocumentType, LendingOrderChangeEvent};
use crate::store::{
    ChangeFeed, ChangeFeedError, ChangeStream, LendingStore, NewNotification, StoreError,
};
use crate::user_connections::UserMessenger;
use crate::utils::ticker::Ticker;
use async_trait::async_trait;
use futures_util::StreamExt;
use lendx_sdk::objects::{
    BrokerMessage, EngineStatus, LendingOrder, LendingOrderBook, LendingOrderPayload,
    LendingOrderType, LendingSide, LendingStatus, LendingTrade, Notification, OrderBookLevel,
    TokenAmount, lending_order_book_channel_id,
};
use bigdecimal::num_bigint::BigInt;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

pub const USER: &str = "0x1111111111111111111111111111111111111111";
pub const LENDING_TOKEN: &str = "0x2222222222222222222222222222222222222222";
pub const COLLATERAL_TOKEN: &str = "0x3333333333333333333333333333333333333333";

pub fn sample_order(hash: &str) -> LendingOrder {
    LendingOrder {
        hash: hash.to_string(),
        user_address: USER.to_string(),
        relayer_address: String::new(),
        side: LendingSide::Borrow,
        term: 86_400,
        interest: 500,
        lending_token: LENDING_TOKEN.to_string(),
        collateral_token: COLLATERAL_TOKEN.to_string(),
        quantity: TokenAmount::from(1_000u64),
        filled_amount: TokenAmount::zero(),
        nonce: 1,
        order_type: LendingOrderType::Limit,
        status: LendingStatus::New,
        created_at: None,
        updated_at: None,
    }
}

pub fn sample_trade(hash: &str) -> LendingTrade {
    LendingTrade {
        hash: hash.to_string(),
        borrower: USER.to_string(),
        investor: "0x4444444444444444444444444444444444444444".to_string(),
        lending_token: LENDING_TOKEN.to_string(),
        collateral_token: COLLATERAL_TOKEN.to_string(),
        borrowing_order_hash: "0xb0".to_string(),
        investing_order_hash: "0x10".to_string(),
        term: 86_400,
        interest: 500,
        amount: TokenAmount::from(1_000u64),
        collateral_lock_amount: TokenAmount::from(2_000u64),
        liquidation_price: TokenAmount::from(3u64),
        status: "OPEN".to_string(),
        created_at: None,
        updated_at: None,
    }
}

/// Storage fake. Order rows live in memory and volume queries aggregate
/// them with the same status filter the Postgres queries use.
#[derive(Default)]
pub struct FakeStore {
    notifications: Mutex<Vec<Notification>>,
    notification_keys: Mutex<HashMap<String, Notification>>,
    next_id: AtomicI64,
    fail_notifications: AtomicBool,
    trades: Mutex<HashMap<String, LendingTrade>>,
    orders: Mutex<HashMap<String, LendingOrder>>,
    fail_volume_lookups: AtomicBool,
    added: Mutex<Vec<LendingOrder>>,
    cancelled: Mutex<Vec<LendingOrder>>,
}

fn stored_status(order: &LendingOrder) -> Option<entities::LendingStatus> {
    match order.status {
        LendingStatus::Unknown => Some(entities::LendingStatus::New),
        s => entities::LendingStatus::try_from(s).ok(),
    }
}

fn unfilled(order: &LendingOrder) -> BigInt {
    order.quantity.as_bigint() - order.filled_amount.as_bigint()
}

impl FakeStore {
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn fail_notifications(&self, fail: bool) {
        self.fail_notifications.store(fail, Ordering::SeqCst);
    }

    pub fn insert_trade(&self, trade: LendingTrade) {
        self.trades
            .lock()
            .unwrap()
            .insert(normalize_hash(&trade.hash), trade);
    }

    /// Write an order row as-is, replacing any row with the same hash.
    pub fn put_order(&self, order: LendingOrder) {
        self.orders
            .lock()
            .unwrap()
            .insert(normalize_hash(&order.hash), order);
    }

    pub fn order(&self, hash: &str) -> Option<LendingOrder> {
        self.orders.lock().unwrap().get(&normalize_hash(hash)).cloned()
    }

    pub fn fail_volume_lookups(&self, fail: bool) {
        self.fail_volume_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn added(&self) -> Vec<LendingOrder> {
        self.added.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<LendingOrder> {
        self.cancelled.lock().unwrap().clone()
    }

    fn resting_orders(&self, term: u64, lending_token: &str) -> Vec<LendingOrder> {
        let token = lending_token.to_lowercase();
        self.orders
            .lock()
            .unwrap()
            .values()
            .filter(|o| o.term == term && o.lending_token.to_lowercase() == token)
            .filter(|o| stored_status(o).is_some_and(|s| s.is_resting()))
            .cloned()
            .collect()
    }
}

fn fake_db_error() -> StoreError {
    StoreError::Database(sqlx::Error::Protocol("injected failure".into()))
}

#[async_trait]
impl LendingStore for FakeStore {
    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, StoreError> {
        if self.fail_notifications.load(Ordering::SeqCst) {
            return Err(fake_db_error());
        }
        let mut keys = self.notification_keys.lock().unwrap();
        if let Some(existing) = notification.dedupe_key.as_ref().and_then(|k| keys.get(k)) {
            return Ok(existing.clone());
        }
        let now = OffsetDateTime::now_utc();
        let stored = Notification {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            recipient: notification.recipient,
            message: notification.message,
            notification_type: notification.notification_type,
            status: notification.status,
            created_at: now,
            updated_at: now,
        };
        if let Some(key) = notification.dedupe_key {
            keys.insert(key, stored.clone());
        }
        self.notifications.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn get_lending_trade_by_hash(
        &self,
        hash: &str,
    ) -> Result<Option<LendingTrade>, StoreError> {
        Ok(self
            .trades
            .lock()
            .unwrap()
            .get(&normalize_hash(hash))
            .cloned())
    }

    async fn get_lending_order_book_interest(
        &self,
        term: u64,
        lending_token: &str,
        interest: u64,
        side: LendingSide,
    ) -> Result<TokenAmount, StoreError> {
        if self.fail_volume_lookups.load(Ordering::SeqCst) {
            return Err(fake_db_error());
        }
        let total: BigInt = self
            .resting_orders(term, lending_token)
            .iter()
            .filter(|o| o.interest == interest && o.side == side)
            .map(unfilled)
            .sum();
        Ok(TokenAmount::from_bigint(total)?)
    }

    async fn add_lending_order(&self, order: &LendingOrder) -> Result<(), StoreError> {
        self.added.lock().unwrap().push(order.clone());
        let status = stored_status(order)
            .ok_or_else(|| StoreError::UnstorableStatus(order.hash.clone()))?;
        let mut row = order.clone();
        row.status = status.into();
        self.orders
            .lock()
            .unwrap()
            .entry(normalize_hash(&order.hash))
            .or_insert(row);
        Ok(())
    }

    async fn cancel_lending_order(&self, order: &LendingOrder) -> Result<(), StoreError> {
        self.cancelled.lock().unwrap().push(order.clone());
        let mut orders = self.orders.lock().unwrap();
        let not_cancellable = || StoreError::NotCancellable(order.hash.clone());
        let row = orders
            .get_mut(&normalize_hash(&order.hash))
            .ok_or_else(not_cancellable)?;
        let cancellable = stored_status(row).is_some_and(|s| s.is_cancellable());
        if !cancellable || !row.user_address.eq_ignore_ascii_case(&order.user_address) {
            return Err(not_cancellable());
        }
        row.status = LendingStatus::Cancelled;
        Ok(())
    }

    async fn get_notifications_by_user(
        &self,
        address: &str,
        limit: i64,
    ) -> Result<Vec<Notification>, StoreError> {
        let address = address.to_lowercase();
        Ok(self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|n| n.recipient.to_lowercase() == address)
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn get_lending_order_book(
        &self,
        term: u64,
        lending_token: &str,
    ) -> Result<LendingOrderBook, StoreError> {
        let mut levels: BTreeMap<(bool, u64), BigInt> = BTreeMap::new();
        for o in self.resting_orders(term, lending_token) {
            *levels
                .entry((o.side == LendingSide::Lend, o.interest))
                .or_default() += unfilled(&o);
        }
        let mut book = LendingOrderBook {
            name: lending_order_book_channel_id(term, lending_token),
            borrow: Vec::new(),
            lend: Vec::new(),
        };
        for ((is_lend, interest), amount) in levels {
            let level = OrderBookLevel {
                interest,
                amount: TokenAmount::from_bigint(amount)?,
            };
            if is_lend {
                book.lend.push(level);
            } else {
                book.borrow.push(level);
            }
        }
        Ok(book)
    }
}

/// Records every publish and forwards it to a test-side receiver.
pub struct RecordingBroker {
    tx: mpsc::UnboundedSender<(String, BrokerMessage)>,
    fail: AtomicBool,
}

impl RecordingBroker {
    pub fn new() -> (
        Arc<RecordingBroker>,
        mpsc::UnboundedReceiver<(String, BrokerMessage)>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let broker = RecordingBroker {
            tx,
            fail: AtomicBool::new(false),
        };
        (Arc::new(broker), rx)
    }

    pub fn fail_publishes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Broker for RecordingBroker {
    async fn publish(&self, subject: &str, message: &BrokerMessage) -> Result<(), BrokerError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BrokerError::Timeout(std::time::Duration::from_secs(5)));
        }
        let _ = self.tx.send((subject.to_string(), message.clone()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    LendingOrder {
        event: EngineStatus,
        address: String,
        payload: LendingOrderPayload,
    },
    Notification {
        event: EngineStatus,
        address: String,
        notification: Notification,
    },
}

impl Sent {
    pub fn event(&self) -> EngineStatus {
        match self {
            Sent::LendingOrder { event, .. } | Sent::Notification { event, .. } => *event,
        }
    }
}

#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingMessenger {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl UserMessenger for RecordingMessenger {
    async fn send_lending_order_message(
        &self,
        event: EngineStatus,
        address: &str,
        payload: LendingOrderPayload,
    ) {
        self.sent.lock().unwrap().push(Sent::LendingOrder {
            event,
            address: address.to_string(),
            payload,
        });
    }

    async fn send_notification_message(
        &self,
        event: EngineStatus,
        address: &str,
        notification: Notification,
    ) {
        self.sent.lock().unwrap().push(Sent::Notification {
            event,
            address: address.to_string(),
            notification,
        });
    }
}

type ChangeSender = mpsc::UnboundedSender<Result<LendingOrderChangeEvent, ChangeFeedError>>;
type ChangeReceiver = mpsc::UnboundedReceiver<Result<LendingOrderChangeEvent, ChangeFeedError>>;

/// Change feed fed by the test. Watching a document type without a
/// [`FakeChangeFeed::channel`] fails like an unreachable database.
#[derive(Default)]
pub struct FakeChangeFeed {
    streams: Mutex<HashMap<DocumentType, ChangeReceiver>>,
    failing: Mutex<HashSet<DocumentType>>,
}

impl FakeChangeFeed {
    pub fn channel(&self, doc_type: DocumentType) -> ChangeSender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams.lock().unwrap().insert(doc_type, rx);
        tx
    }

    pub fn fail_to_open(&self, doc_type: DocumentType) {
        self.failing.lock().unwrap().insert(doc_type);
    }
}

#[async_trait]
impl ChangeFeed for FakeChangeFeed {
    async fn watch(&self, doc_type: DocumentType) -> Result<ChangeStream, ChangeFeedError> {
        if self.failing.lock().unwrap().contains(&doc_type) {
            return Err(ChangeFeedError::Database(sqlx::Error::Protocol(
                "injected open failure".into(),
            )));
        }
        let rx = self.streams.lock().unwrap().remove(&doc_type).ok_or_else(|| {
            ChangeFeedError::Database(sqlx::Error::Protocol(format!("no feed for {doc_type}")))
        })?;
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}

/// Ticker driven by the test through the returned sender.
pub struct ManualTicker {
    rx: mpsc::UnboundedReceiver<()>,
}

impl ManualTicker {
    pub fn new() -> (ManualTicker, mpsc::UnboundedSender<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ManualTicker { rx }, tx)
    }
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }
}
