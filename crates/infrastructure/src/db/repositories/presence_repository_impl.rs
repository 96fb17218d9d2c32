use std::str::FromStr;

use application::PresenceRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{PresenceRecord, PresenceStatus, RepositoryError, UserId};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::repository::{invalid_data, map_sqlx_err};

#[derive(Debug, FromRow)]
struct PresenceRow {
    user_id: Uuid,
    last_seen: DateTime<Utc>,
    status: String,
}

impl TryFrom<PresenceRow> for PresenceRecord {
    type Error = RepositoryError;

    fn try_from(value: PresenceRow) -> Result<Self, Self::Error> {
        Ok(PresenceRecord {
            user_id: UserId::from(value.user_id),
            last_seen: value.last_seen,
            status: PresenceStatus::from_str(&value.status)
                .map_err(|err| invalid_data(err.to_string()))?,
        })
    }
}

#[derive(Clone)]
pub struct PgPresenceRepository {
    pool: PgPool,
}

impl PgPresenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PresenceRepository for PgPresenceRepository {
    async fn upsert(&self, record: PresenceRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO user_presence (user_id, last_seen, status)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE SET last_seen = EXCLUDED.last_seen, status = EXCLUDED.status
            "#,
        )
        .bind(Uuid::from(record.user_id))
        .bind(record.last_seen)
        .bind(record.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn find(&self, user_id: UserId) -> Result<Option<PresenceRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, PresenceRow>(
            "SELECT user_id, last_seen, status FROM user_presence WHERE user_id = $1",
        )
        .bind(Uuid::from(user_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        row.map(PresenceRecord::try_from).transpose()
    }

    async fn find_many(&self, user_ids: &[UserId]) -> Result<Vec<PresenceRecord>, RepositoryError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = user_ids.iter().copied().map(Uuid::from).collect();
        let rows = sqlx::query_as::<_, PresenceRow>(
            "SELECT user_id, last_seen, status FROM user_presence WHERE user_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        rows.into_iter().map(PresenceRecord::try_from).collect()
    }
}
