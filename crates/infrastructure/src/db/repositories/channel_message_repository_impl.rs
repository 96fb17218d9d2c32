use std::str::FromStr;

use application::ChannelMessageRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    ChannelId, ChannelMessage, ChannelType, MessageContent, MessageCursor, MessageId, OrgId,
    RepositoryError, UserId,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::repository::{invalid_data, map_sqlx_err};

#[derive(Debug, FromRow)]
struct ChannelMessageRecord {
    id: Uuid,
    channel_id: Uuid,
    channel_type: String,
    sender_id: Uuid,
    organization_id: Uuid,
    content: String,
    created_at: DateTime<Utc>,
    edited_at: Option<DateTime<Utc>>,
}

impl TryFrom<ChannelMessageRecord> for ChannelMessage {
    type Error = RepositoryError;

    fn try_from(value: ChannelMessageRecord) -> Result<Self, Self::Error> {
        let channel_type = ChannelType::from_str(&value.channel_type)
            .map_err(|err| invalid_data(err.to_string()))?;
        let content =
            MessageContent::new(value.content).map_err(|err| invalid_data(err.to_string()))?;
        let mut message = ChannelMessage::new(
            MessageId::from(value.id),
            ChannelId::from(value.channel_id),
            channel_type,
            UserId::from(value.sender_id),
            OrgId::from(value.organization_id),
            content,
            value.created_at,
        )
        .map_err(|err| invalid_data(err.to_string()))?;
        message.edited_at = value.edited_at;
        Ok(message)
    }
}

#[derive(Clone)]
pub struct PgChannelMessageRepository {
    pool: PgPool,
}

impl PgChannelMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChannelMessageRepository for PgChannelMessageRepository {
    async fn create(&self, message: ChannelMessage) -> Result<ChannelMessage, RepositoryError> {
        let record = sqlx::query_as::<_, ChannelMessageRecord>(
            r#"
            INSERT INTO channel_messages
                (id, channel_id, channel_type, sender_id, organization_id, content, created_at, edited_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, channel_id, channel_type, sender_id, organization_id, content, created_at, edited_at
            "#,
        )
        .bind(Uuid::from(message.id))
        .bind(Uuid::from(message.channel_id))
        .bind(message.channel_type.as_str())
        .bind(Uuid::from(message.sender_id))
        .bind(Uuid::from(message.organization_id))
        .bind(message.content.as_str())
        .bind(message.created_at)
        .bind(message.edited_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        ChannelMessage::try_from(record)
    }

    async fn find_by_id(&self, id: MessageId) -> Result<Option<ChannelMessage>, RepositoryError> {
        let record = sqlx::query_as::<_, ChannelMessageRecord>(
            r#"
            SELECT id, channel_id, channel_type, sender_id, organization_id, content, created_at, edited_at
            FROM channel_messages
            WHERE id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(ChannelMessage::try_from).transpose()
    }

    async fn update(&self, message: ChannelMessage) -> Result<ChannelMessage, RepositoryError> {
        let record = sqlx::query_as::<_, ChannelMessageRecord>(
            r#"
            UPDATE channel_messages
            SET content = $2, edited_at = $3
            WHERE id = $1
            RETURNING id, channel_id, channel_type, sender_id, organization_id, content, created_at, edited_at
            "#,
        )
        .bind(Uuid::from(message.id))
        .bind(message.content.as_str())
        .bind(message.edited_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?
        .ok_or(RepositoryError::NotFound)?;

        ChannelMessage::try_from(record)
    }

    async fn list(
        &self,
        channel_id: ChannelId,
        channel_type: ChannelType,
        before: Option<MessageCursor>,
        limit: u32,
    ) -> Result<Vec<ChannelMessage>, RepositoryError> {
        let records = sqlx::query_as::<_, ChannelMessageRecord>(
            r#"
            SELECT id, channel_id, channel_type, sender_id, organization_id, content, created_at, edited_at
            FROM channel_messages
            WHERE channel_id = $1
              AND channel_type = $2
              AND ($3::timestamptz IS NULL OR (created_at, id) < ($3::timestamptz, $4::uuid))
            ORDER BY created_at DESC, id DESC
            LIMIT $5
            "#,
        )
        .bind(Uuid::from(channel_id))
        .bind(channel_type.as_str())
        .bind(before.map(|cursor| cursor.created_at))
        .bind(before.map(|cursor| Uuid::from(cursor.id)))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(ChannelMessage::try_from).collect()
    }

    async fn delete(&self, id: MessageId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM channel_messages WHERE id = $1")
            .bind(Uuid::from(id))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(result.rows_affected() > 0)
    }
}
