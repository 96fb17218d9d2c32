use std::str::FromStr;

use application::ActivityLogRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{ActivityAction, ActivityLogEntry, ActivityLogId, OrgId, RepositoryError, UserId};
use serde_json::Value as JsonValue;
use sqlx::{types::Json, FromRow, PgPool};
use uuid::Uuid;

use crate::repository::{invalid_data, map_sqlx_err};

#[derive(Debug, FromRow)]
struct ActivityLogRecord {
    id: Uuid,
    actor_user_id: Uuid,
    organization_id: Uuid,
    action: String,
    description: String,
    metadata: Json<JsonValue>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ActivityLogRecord> for ActivityLogEntry {
    type Error = RepositoryError;

    fn try_from(value: ActivityLogRecord) -> Result<Self, Self::Error> {
        Ok(ActivityLogEntry {
            id: ActivityLogId::from(value.id),
            actor_user_id: UserId::from(value.actor_user_id),
            organization_id: OrgId::from(value.organization_id),
            action: ActivityAction::from_str(&value.action)
                .map_err(|err| invalid_data(err.to_string()))?,
            description: value.description,
            metadata: value.metadata.0,
            created_at: value.created_at,
        })
    }
}

#[derive(Clone)]
pub struct PgActivityLogRepository {
    pool: PgPool,
}

impl PgActivityLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityLogRepository for PgActivityLogRepository {
    async fn append(&self, entry: ActivityLogEntry) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO activity_logs
                (id, actor_user_id, organization_id, action, description, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::from(entry.id))
        .bind(Uuid::from(entry.actor_user_id))
        .bind(Uuid::from(entry.organization_id))
        .bind(entry.action.as_str())
        .bind(&entry.description)
        .bind(Json(&entry.metadata))
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn list_by_organization(
        &self,
        organization_id: OrgId,
        limit: u32,
    ) -> Result<Vec<ActivityLogEntry>, RepositoryError> {
        let records = sqlx::query_as::<_, ActivityLogRecord>(
            r#"
            SELECT id, actor_user_id, organization_id, action, description, metadata, created_at
            FROM activity_logs
            WHERE organization_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(Uuid::from(organization_id))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(ActivityLogEntry::try_from).collect()
    }
}
