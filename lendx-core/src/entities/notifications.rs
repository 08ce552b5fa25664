use crate::entities::{NotificationType, ReadStatus};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use lendx_sdk::objects::{Notification, NotificationMessage};
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct NotificationRecord {
    pub id: i64,
    pub recipient: String,
    pub message_type: String,
    pub description: String,
    pub notification_type: NotificationType,
    pub status: ReadStatus,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<NotificationRecord> for Notification {
    fn from(r: NotificationRecord) -> Self {
        Notification {
            id: r.id,
            recipient: r.recipient,
            message: NotificationMessage {
                message_type: r.message_type,
                description: r.description,
            },
            notification_type: r.notification_type.into(),
            status: r.status.into(),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InsertNotification {
    pub recipient: String,
    pub message_type: String,
    pub description: String,
    pub notification_type: NotificationType,
    pub status: ReadStatus,
    pub dedupe_key: Option<String>,
}

/// Insert a notification. A repeated `dedupe_key` returns the stored row
/// instead of adding another.
impl Processor<InsertNotification> for DatabaseProcessor {
    type Output = NotificationRecord;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertNotification")]
    async fn process(&self, insert: InsertNotification) -> Result<NotificationRecord, sqlx::Error> {
        sqlx::query_as::<_, NotificationRecord>(
            r#"
            INSERT INTO notifications (
                recipient, message_type, description, notification_type, status, dedupe_key
            )
            VALUES (lower($1), $2, $3, $4, $5, $6)
            ON CONFLICT (dedupe_key) DO UPDATE SET dedupe_key = EXCLUDED.dedupe_key
            RETURNING id, recipient, message_type, description, notification_type, status,
                      created_at, updated_at
            "#,
        )
        .bind(insert.recipient)
        .bind(insert.message_type)
        .bind(insert.description)
        .bind(insert.notification_type)
        .bind(insert.status)
        .bind(insert.dedupe_key)
        .fetch_one(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Latest notifications for a user, newest first.
pub struct GetNotificationsByRecipient {
    pub recipient: String,
    pub limit: i64,
}

impl Processor<GetNotificationsByRecipient> for DatabaseProcessor {
    type Output = Vec<NotificationRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetNotificationsByRecipient")]
    async fn process(
        &self,
        query: GetNotificationsByRecipient,
    ) -> Result<Vec<NotificationRecord>, sqlx::Error> {
        sqlx::query_as::<_, NotificationRecord>(
            r#"
            SELECT id, recipient, message_type, description, notification_type, status,
                   created_at, updated_at
            FROM notifications
            WHERE recipient = lower($1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(query.recipient)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await
    }
}
