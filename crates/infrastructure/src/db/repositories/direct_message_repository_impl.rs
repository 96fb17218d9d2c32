use application::DirectMessageRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    DirectMessage, MessageContent, MessageCursor, MessageId, RepositoryError, Timestamp, UserId,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::repository::{invalid_data, map_sqlx_err};

#[derive(Debug, FromRow)]
struct DirectMessageRecord {
    id: Uuid,
    sender_id: Uuid,
    recipient_id: Uuid,
    content: String,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<DirectMessageRecord> for DirectMessage {
    type Error = RepositoryError;

    fn try_from(value: DirectMessageRecord) -> Result<Self, Self::Error> {
        let content =
            MessageContent::new(value.content).map_err(|err| invalid_data(err.to_string()))?;
        let mut message = DirectMessage::new(
            MessageId::from(value.id),
            UserId::from(value.sender_id),
            UserId::from(value.recipient_id),
            content,
            value.created_at,
        )
        .map_err(|err| invalid_data(err.to_string()))?;
        message.read_at = value.read_at;
        Ok(message)
    }
}

#[derive(Clone)]
pub struct PgDirectMessageRepository {
    pool: PgPool,
}

impl PgDirectMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DirectMessageRepository for PgDirectMessageRepository {
    async fn create(&self, message: DirectMessage) -> Result<DirectMessage, RepositoryError> {
        let record = sqlx::query_as::<_, DirectMessageRecord>(
            r#"
            INSERT INTO direct_messages (id, sender_id, recipient_id, content, read_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, sender_id, recipient_id, content, read_at, created_at
            "#,
        )
        .bind(Uuid::from(message.id))
        .bind(Uuid::from(message.sender_id))
        .bind(Uuid::from(message.recipient_id))
        .bind(message.content.as_str())
        .bind(message.read_at)
        .bind(message.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        DirectMessage::try_from(record)
    }

    async fn find_by_id(&self, id: MessageId) -> Result<Option<DirectMessage>, RepositoryError> {
        let record = sqlx::query_as::<_, DirectMessageRecord>(
            r#"
            SELECT id, sender_id, recipient_id, content, read_at, created_at
            FROM direct_messages
            WHERE id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(DirectMessage::try_from).transpose()
    }

    async fn list_conversation(
        &self,
        user_a: UserId,
        user_b: UserId,
        before: Option<MessageCursor>,
        limit: u32,
    ) -> Result<Vec<DirectMessage>, RepositoryError> {
        let records = sqlx::query_as::<_, DirectMessageRecord>(
            r#"
            SELECT id, sender_id, recipient_id, content, read_at, created_at
            FROM direct_messages
            WHERE LEAST(sender_id, recipient_id) = LEAST($1::uuid, $2::uuid)
              AND GREATEST(sender_id, recipient_id) = GREATEST($1::uuid, $2::uuid)
              AND ($3::timestamptz IS NULL OR (created_at, id) < ($3::timestamptz, $4::uuid))
            ORDER BY created_at DESC, id DESC
            LIMIT $5
            "#,
        )
        .bind(Uuid::from(user_a))
        .bind(Uuid::from(user_b))
        .bind(before.map(|cursor| cursor.created_at))
        .bind(before.map(|cursor| Uuid::from(cursor.id)))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(DirectMessage::try_from).collect()
    }

    async fn mark_read(
        &self,
        reader: UserId,
        sender: UserId,
        at: Timestamp,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE direct_messages
            SET read_at = $3
            WHERE recipient_id = $1 AND sender_id = $2 AND read_at IS NULL
            "#,
        )
        .bind(Uuid::from(reader))
        .bind(Uuid::from(sender))
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: MessageId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM direct_messages WHERE id = $1")
            .bind(Uuid::from(id))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(result.rows_affected() > 0)
    }
}
