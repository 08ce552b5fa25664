use crate::framework::DatabaseProcessor;
use bigdecimal::BigDecimal;
use kanau::processor::Processor;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LendingTradeRecord {
    pub hash: String,
    pub borrower: String,
    pub investor: String,
    pub lending_token: String,
    pub collateral_token: String,
    pub borrowing_order_hash: String,
    pub investing_order_hash: String,
    pub term: i64,
    pub interest: i64,
    pub amount: BigDecimal,
    pub collateral_lock_amount: BigDecimal,
    pub liquidation_price: BigDecimal,
    pub status: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
/// Repay, top-up and recall documents share their hash with the trade they
/// act on.
pub struct GetLendingTradeByHash {
    pub hash: String,
}

impl Processor<GetLendingTradeByHash> for DatabaseProcessor {
    type Output = Option<LendingTradeRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetLendingTradeByHash")]
    async fn process(
        &self,
        query: GetLendingTradeByHash,
    ) -> Result<Option<LendingTradeRecord>, sqlx::Error> {
        sqlx::query_as::<_, LendingTradeRecord>(
            r#"
            SELECT hash, borrower, investor, lending_token, collateral_token,
                   borrowing_order_hash, investing_order_hash, term, interest, amount,
                   collateral_lock_amount, liquidation_price, status, created_at, updated_at
            FROM lending_trades
            WHERE hash = lower($1)
            "#,
        )
        .bind(query.hash)
        .fetch_optional(&self.pool)
        .await
    }
}
