use crate::events::{DocumentType, LendingOrderChangeEvent};
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChangeFeedError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to decode change event: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A cursor over observed changes. Undecodable events surface as
/// [`ChangeFeedError::Decode`] items and do not end the stream.
pub type ChangeStream = BoxStream<'static, Result<LendingOrderChangeEvent, ChangeFeedError>>;

#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Open a change stream over one document table.
    async fn watch(&self, doc_type: DocumentType) -> Result<ChangeStream, ChangeFeedError>;
}

/// [`ChangeFeed`] over `LISTEN`/`NOTIFY`.
///
/// Each document table has a trigger that calls `pg_notify` with the
/// camelCase JSON document on [`DocumentType::notify_channel`].
#[derive(Clone)]
pub struct PgChangeFeed {
    pool: PgPool,
}

impl PgChangeFeed {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChangeFeed for PgChangeFeed {
    async fn watch(&self, doc_type: DocumentType) -> Result<ChangeStream, ChangeFeedError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(doc_type.notify_channel()).await?;

        let stream = listener.into_stream().map(|notification| {
            let notification = notification?;
            let event = serde_json::from_str::<LendingOrderChangeEvent>(notification.payload())?;
            Ok(event)
        });
        Ok(stream.boxed())
    }
}
