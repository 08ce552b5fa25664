use super::{LendingStore, NewNotification, StoreError};
use crate::entities::lending_orders::{
    CancelLendingOrder, GetLendingOrderBookInterest, GetLendingOrderBookLevels,
    InsertLendingOrder, LendingOrderInsert,
};
use crate::entities::lending_trades::{GetLendingTradeByHash, LendingTradeRecord};
use crate::entities::notifications::{GetNotificationsByRecipient, InsertNotification};
use crate::entities::{
    self, LendingStatus, amount_to_numeric, normalize_hash, numeric_to_amount,
};
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use kanau::processor::Processor;
use lendx_sdk::objects::{
    LendingOrder, LendingOrderBook, LendingSide, LendingStatus as SdkLendingStatus, LendingTrade,
    Notification, OrderBookLevel, TokenAmount, lending_order_book_channel_id,
};
use sqlx::PgPool;
use tracing::debug;

/// [`LendingStore`] backed by the Postgres query objects in
/// [`crate::entities`].
#[derive(Clone)]
pub struct PgLendingStore {
    db: DatabaseProcessor,
}

impl PgLendingStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            db: DatabaseProcessor::new(pool),
        }
    }
}

fn to_i64(field: &'static str, value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::OutOfRange {
        field,
        value: value.to_string(),
    })
}

fn to_u64(field: &'static str, value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::OutOfRange {
        field,
        value: value.to_string(),
    })
}

fn trade_from_record(r: LendingTradeRecord) -> Result<LendingTrade, StoreError> {
    Ok(LendingTrade {
        term: to_u64("term", r.term)?,
        interest: to_u64("interest", r.interest)?,
        amount: numeric_to_amount(r.amount)?,
        collateral_lock_amount: numeric_to_amount(r.collateral_lock_amount)?,
        liquidation_price: numeric_to_amount(r.liquidation_price)?,
        hash: r.hash,
        borrower: r.borrower,
        investor: r.investor,
        lending_token: r.lending_token,
        collateral_token: r.collateral_token,
        borrowing_order_hash: r.borrowing_order_hash,
        investing_order_hash: r.investing_order_hash,
        status: r.status,
        created_at: Some(r.created_at),
        updated_at: Some(r.updated_at),
    })
}

fn order_insert(order: &LendingOrder) -> Result<LendingOrderInsert, StoreError> {
    // Orders from the broker normally arrive without a status.
    let status = match order.status {
        SdkLendingStatus::Unknown => LendingStatus::New,
        s => LendingStatus::try_from(s)
            .map_err(|_| StoreError::UnstorableStatus(order.hash.clone()))?,
    };
    Ok(LendingOrderInsert {
        hash: normalize_hash(&order.hash),
        user_address: order.user_address.clone(),
        relayer_address: order.relayer_address.clone(),
        side: order.side.into(),
        term: to_i64("term", order.term)?,
        interest: to_i64("interest", order.interest)?,
        lending_token: order.lending_token.clone(),
        collateral_token: order.collateral_token.clone(),
        quantity: amount_to_numeric(&order.quantity),
        filled_amount: amount_to_numeric(&order.filled_amount),
        nonce: to_i64("nonce", order.nonce)?,
        order_type: order.order_type.into(),
        status,
    })
}

fn order_cancel(order: &LendingOrder) -> CancelLendingOrder {
    CancelLendingOrder {
        hash: normalize_hash(&order.hash),
        user_address: order.user_address.clone(),
    }
}

#[async_trait]
impl LendingStore for PgLendingStore {
    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, StoreError> {
        let record = self
            .db
            .process(InsertNotification {
                recipient: notification.recipient,
                message_type: notification.message.message_type,
                description: notification.message.description,
                notification_type: notification.notification_type.into(),
                status: notification.status.into(),
                dedupe_key: notification.dedupe_key,
            })
            .await?;
        Ok(record.into())
    }

    async fn get_lending_trade_by_hash(
        &self,
        hash: &str,
    ) -> Result<Option<LendingTrade>, StoreError> {
        self.db
            .process(GetLendingTradeByHash {
                hash: normalize_hash(hash),
            })
            .await?
            .map(trade_from_record)
            .transpose()
    }

    async fn get_lending_order_book_interest(
        &self,
        term: u64,
        lending_token: &str,
        interest: u64,
        side: LendingSide,
    ) -> Result<TokenAmount, StoreError> {
        let amount = self
            .db
            .process(GetLendingOrderBookInterest {
                term: to_i64("term", term)?,
                lending_token: lending_token.to_string(),
                interest: to_i64("interest", interest)?,
                side: side.into(),
            })
            .await?;
        match amount {
            Some(amount) => Ok(numeric_to_amount(amount)?),
            None => Ok(TokenAmount::zero()),
        }
    }

    async fn add_lending_order(&self, order: &LendingOrder) -> Result<(), StoreError> {
        let inserted = self
            .db
            .process(InsertLendingOrder {
                order: order_insert(order)?,
            })
            .await?;
        if inserted == 0 {
            debug!(order_hash = %order.hash, "Lending order already stored");
        }
        Ok(())
    }

    async fn cancel_lending_order(&self, order: &LendingOrder) -> Result<(), StoreError> {
        let updated = self.db.process(order_cancel(order)).await?;
        if updated == 0 {
            return Err(StoreError::NotCancellable(order.hash.clone()));
        }
        Ok(())
    }

    async fn get_notifications_by_user(
        &self,
        address: &str,
        limit: i64,
    ) -> Result<Vec<Notification>, StoreError> {
        let records = self
            .db
            .process(GetNotificationsByRecipient {
                recipient: address.to_string(),
                limit,
            })
            .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    async fn get_lending_order_book(
        &self,
        term: u64,
        lending_token: &str,
    ) -> Result<LendingOrderBook, StoreError> {
        let levels = self
            .db
            .process(GetLendingOrderBookLevels {
                term: to_i64("term", term)?,
                lending_token: lending_token.to_string(),
            })
            .await?;

        let mut book = LendingOrderBook {
            name: lending_order_book_channel_id(term, lending_token),
            borrow: Vec::new(),
            lend: Vec::new(),
        };
        for level in levels {
            let entry = OrderBookLevel {
                interest: to_u64("interest", level.interest)?,
                amount: numeric_to_amount(level.amount)?,
            };
            match level.side {
                entities::LendingSide::Borrow => book.borrow.push(entry),
                entities::LendingSide::Lend => book.lend.push(entry),
            }
        }
        Ok(book)
    }
}
