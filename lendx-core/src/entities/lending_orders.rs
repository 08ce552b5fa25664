use crate::entities::{LendingOrderType, LendingSide, LendingStatus};
use crate::framework::DatabaseProcessor;
use bigdecimal::BigDecimal;
use kanau::processor::Processor;

/// Data for inserting a lending order received from the broker.
#[derive(Debug, Clone)]
pub struct LendingOrderInsert {
    pub hash: String,
    pub user_address: String,
    pub relayer_address: String,
    pub side: LendingSide,
    pub term: i64,
    pub interest: i64,
    pub lending_token: String,
    pub collateral_token: String,
    pub quantity: BigDecimal,
    pub filled_amount: BigDecimal,
    pub nonce: i64,
    pub order_type: LendingOrderType,
    pub status: LendingStatus,
}

#[derive(Debug, Clone)]
/// Insert a lending order. Re-delivered messages are ignored.
///
/// Returns the number of rows inserted (0 for a duplicate hash).
pub struct InsertLendingOrder {
    pub order: LendingOrderInsert,
}

impl Processor<InsertLendingOrder> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertLendingOrder")]
    async fn process(&self, insert: InsertLendingOrder) -> Result<u64, sqlx::Error> {
        let o = insert.order;
        let result = sqlx::query(
            r#"
            INSERT INTO lending_orders (
                hash, user_address, relayer_address, side, term, interest,
                lending_token, collateral_token, quantity, filled_amount,
                nonce, order_type, status
            )
            VALUES (lower($1), lower($2), lower($3), $4, $5, $6, lower($7), lower($8), $9, $10, $11, $12, $13)
            ON CONFLICT (hash) DO NOTHING
            "#,
        )
        .bind(o.hash)
        .bind(o.user_address)
        .bind(o.relayer_address)
        .bind(o.side)
        .bind(o.term)
        .bind(o.interest)
        .bind(o.lending_token)
        .bind(o.collateral_token)
        .bind(o.quantity)
        .bind(o.filled_amount)
        .bind(o.nonce)
        .bind(o.order_type)
        .bind(o.status)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
/// Mark an order as cancelled.
///
/// Only orders in [`LendingStatus::CANCELLABLE`] that belong to the given user
/// are touched. Returns the number of rows updated.
pub struct CancelLendingOrder {
    pub hash: String,
    pub user_address: String,
}

impl Processor<CancelLendingOrder> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CancelLendingOrder")]
    async fn process(&self, cancel: CancelLendingOrder) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE lending_orders
            SET status = 'CANCELLED', updated_at = now()
            WHERE hash = lower($1)
              AND user_address = lower($2)
              AND status = ANY($3)
            "#,
        )
        .bind(cancel.hash)
        .bind(cancel.user_address)
        .bind(LendingStatus::CANCELLABLE.to_vec())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
/// Total open volume at one interest rate on one side of a book.
///
/// Returns `None` when no open order sits at that rate.
pub struct GetLendingOrderBookInterest {
    pub term: i64,
    pub lending_token: String,
    pub interest: i64,
    pub side: LendingSide,
}

impl Processor<GetLendingOrderBookInterest> for DatabaseProcessor {
    type Output = Option<BigDecimal>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetLendingOrderBookInterest")]
    async fn process(
        &self,
        query: GetLendingOrderBookInterest,
    ) -> Result<Option<BigDecimal>, sqlx::Error> {
        let amount: Option<BigDecimal> = sqlx::query_scalar(
            r#"
            SELECT SUM(quantity - filled_amount)
            FROM lending_orders
            WHERE term = $1
              AND lending_token = lower($2)
              AND interest = $3
              AND side = $4
              AND status = ANY($5)
            "#,
        )
        .bind(query.term)
        .bind(query.lending_token)
        .bind(query.interest)
        .bind(query.side)
        .bind(LendingStatus::RESTING.to_vec())
        .fetch_one(&self.pool)
        .await?;
        Ok(amount)
    }
}

/// One aggregated price level of a lending book.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LendingOrderBookLevel {
    pub side: LendingSide,
    pub interest: i64,
    pub amount: BigDecimal,
}

#[derive(Debug, Clone)]
/// Every open price level of the book for a term / lending token pair,
/// ordered by side then interest.
pub struct GetLendingOrderBookLevels {
    pub term: i64,
    pub lending_token: String,
}

impl Processor<GetLendingOrderBookLevels> for DatabaseProcessor {
    type Output = Vec<LendingOrderBookLevel>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetLendingOrderBookLevels")]
    async fn process(
        &self,
        query: GetLendingOrderBookLevels,
    ) -> Result<Vec<LendingOrderBookLevel>, sqlx::Error> {
        sqlx::query_as::<_, LendingOrderBookLevel>(
            r#"
            SELECT side, interest, SUM(quantity - filled_amount) AS amount
            FROM lending_orders
            WHERE term = $1
              AND lending_token = lower($2)
              AND status = ANY($3)
            GROUP BY side, interest
            ORDER BY side, interest
            "#,
        )
        .bind(query.term)
        .bind(query.lending_token)
        .bind(LendingStatus::RESTING.to_vec())
        .fetch_all(&self.pool)
        .await
    }
}
