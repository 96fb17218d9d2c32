use std::str::FromStr;

use application::ChannelRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Channel, ChannelId, ChannelType, OrgId, ProjectId, RepositoryError};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::repository::{invalid_data, map_sqlx_err};

#[derive(Debug, FromRow)]
struct ChannelRecord {
    id: Uuid,
    channel_type: String,
    organization_id: Uuid,
    project_id: Option<Uuid>,
    name: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ChannelRecord> for Channel {
    type Error = RepositoryError;

    fn try_from(value: ChannelRecord) -> Result<Self, Self::Error> {
        let channel_type = ChannelType::from_str(&value.channel_type)
            .map_err(|err| invalid_data(err.to_string()))?;
        Channel::new(
            ChannelId::from(value.id),
            channel_type,
            OrgId::from(value.organization_id),
            value.project_id.map(ProjectId::from),
            value.name,
            value.created_at,
        )
        .map_err(|err| invalid_data(err.to_string()))
    }
}

#[derive(Clone)]
pub struct PgChannelRepository {
    pool: PgPool,
}

impl PgChannelRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChannelRepository for PgChannelRepository {
    async fn create(&self, channel: Channel) -> Result<Channel, RepositoryError> {
        let record = sqlx::query_as::<_, ChannelRecord>(
            r#"
            INSERT INTO channels (id, channel_type, organization_id, project_id, name, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, channel_type, organization_id, project_id, name, created_at
            "#,
        )
        .bind(Uuid::from(channel.id))
        .bind(channel.channel_type.as_str())
        .bind(Uuid::from(channel.organization_id))
        .bind(channel.project_id.map(Uuid::from))
        .bind(&channel.name)
        .bind(channel.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Channel::try_from(record)
    }

    async fn find(
        &self,
        id: ChannelId,
        channel_type: ChannelType,
    ) -> Result<Option<Channel>, RepositoryError> {
        let record = sqlx::query_as::<_, ChannelRecord>(
            r#"
            SELECT id, channel_type, organization_id, project_id, name, created_at
            FROM channels
            WHERE id = $1 AND channel_type = $2
            "#,
        )
        .bind(Uuid::from(id))
        .bind(channel_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Channel::try_from).transpose()
    }

    async fn list_by_organization(
        &self,
        organization_id: OrgId,
    ) -> Result<Vec<Channel>, RepositoryError> {
        let records = sqlx::query_as::<_, ChannelRecord>(
            r#"
            SELECT id, channel_type, organization_id, project_id, name, created_at
            FROM channels
            WHERE organization_id = $1
            ORDER BY name ASC
            "#,
        )
        .bind(Uuid::from(organization_id))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Channel::try_from).collect()
    }

    async fn delete_cascade(
        &self,
        id: ChannelId,
        channel_type: ChannelType,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        let messages = sqlx::query(
            "DELETE FROM channel_messages WHERE channel_id = $1 AND channel_type = $2",
        )
        .bind(Uuid::from(id))
        .bind(channel_type.as_str())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        sqlx::query("DELETE FROM typing_indicators WHERE channel_id = $1 AND channel_type = $2")
            .bind(Uuid::from(id))
            .bind(channel_type.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;

        let channel = sqlx::query("DELETE FROM channels WHERE id = $1 AND channel_type = $2")
            .bind(Uuid::from(id))
            .bind(channel_type.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;

        tx.commit().await.map_err(map_sqlx_err)?;

        tracing::debug!(
            channel_id = %id,
            channel_type = %channel_type,
            messages = messages.rows_affected(),
            "频道已级联删除"
        );
        Ok(channel.rows_affected() > 0)
    }
}
