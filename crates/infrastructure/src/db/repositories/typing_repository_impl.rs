use std::str::FromStr;

use application::TypingIndicatorRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    ChannelId, ChannelType, OrgId, RepositoryError, Timestamp, TypingIndicator, TypingKey, UserId,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::repository::{invalid_data, map_sqlx_err};

#[derive(Debug, FromRow)]
struct TypingRecord {
    channel_id: Uuid,
    channel_type: String,
    user_id: Uuid,
    organization_id: Uuid,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TypingRecord> for TypingIndicator {
    type Error = RepositoryError;

    fn try_from(value: TypingRecord) -> Result<Self, Self::Error> {
        let channel_type = ChannelType::from_str(&value.channel_type)
            .map_err(|err| invalid_data(err.to_string()))?;
        let key = TypingKey {
            channel_id: ChannelId::from(value.channel_id),
            channel_type,
            user_id: UserId::from(value.user_id),
        };
        Ok(TypingIndicator::new(
            key,
            OrgId::from(value.organization_id),
            value.updated_at,
        ))
    }
}

#[derive(Clone)]
pub struct PgTypingIndicatorRepository {
    pool: PgPool,
}

impl PgTypingIndicatorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TypingIndicatorRepository for PgTypingIndicatorRepository {
    async fn upsert(&self, indicator: TypingIndicator) -> Result<(), RepositoryError> {
        // 主键冲突时原地刷新，任何时刻都只有一行
        sqlx::query(
            r#"
            INSERT INTO typing_indicators (channel_id, channel_type, user_id, organization_id, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (channel_id, channel_type, user_id)
            DO UPDATE SET organization_id = EXCLUDED.organization_id, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(Uuid::from(indicator.channel_id))
        .bind(indicator.channel_type.as_str())
        .bind(Uuid::from(indicator.user_id))
        .bind(Uuid::from(indicator.organization_id))
        .bind(indicator.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn remove(&self, key: TypingKey) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM typing_indicators
            WHERE channel_id = $1 AND channel_type = $2 AND user_id = $3
            "#,
        )
        .bind(Uuid::from(key.channel_id))
        .bind(key.channel_type.as_str())
        .bind(Uuid::from(key.user_id))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_since(
        &self,
        channel_id: ChannelId,
        channel_type: ChannelType,
        since: Timestamp,
    ) -> Result<Vec<TypingIndicator>, RepositoryError> {
        let records = sqlx::query_as::<_, TypingRecord>(
            r#"
            SELECT channel_id, channel_type, user_id, organization_id, updated_at
            FROM typing_indicators
            WHERE channel_id = $1 AND channel_type = $2 AND updated_at >= $3
            ORDER BY updated_at ASC
            "#,
        )
        .bind(Uuid::from(channel_id))
        .bind(channel_type.as_str())
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(TypingIndicator::try_from).collect()
    }

    async fn remove_older_than(&self, cutoff: Timestamp) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM typing_indicators WHERE updated_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(result.rows_affected())
    }
}
