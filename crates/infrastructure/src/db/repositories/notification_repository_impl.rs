//! 通知仓储实现

use std::str::FromStr;

use application::NotificationRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    Notification, NotificationId, NotificationPage, NotificationQuery, NotificationType, OrgId,
    RepositoryError, Timestamp, UserId,
};
use serde_json::Value as JsonValue;
use sqlx::{types::Json, FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::repository::{invalid_data, map_sqlx_err};

/// 每条 INSERT 语句的最大行数，10 列 × 1000 行远低于绑定参数上限
pub const BATCH_CHUNK_ROWS: usize = 1000;

const NOTIFICATION_COLUMNS: &str = "id, user_id, organization_id, notification_type, title, message, link, metadata, read_at, created_at";

#[derive(Debug, FromRow)]
struct NotificationRecord {
    id: Uuid,
    user_id: Uuid,
    organization_id: Uuid,
    notification_type: String,
    title: String,
    message: String,
    link: Option<String>,
    metadata: Json<JsonValue>,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRecord> for Notification {
    type Error = RepositoryError;

    fn try_from(value: NotificationRecord) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: NotificationId::from(value.id),
            user_id: UserId::from(value.user_id),
            organization_id: OrgId::from(value.organization_id),
            notification_type: NotificationType::from_str(&value.notification_type)
                .map_err(|err| invalid_data(err.to_string()))?,
            title: value.title,
            message: value.message,
            link: value.link,
            metadata: value.metadata.0,
            read_at: value.read_at,
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct CountsRecord {
    total: i64,
    unread: i64,
}

#[derive(Clone)]
pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn create(&self, notification: Notification) -> Result<Notification, RepositoryError> {
        let record = sqlx::query_as::<_, NotificationRecord>(&format!(
            r#"
            INSERT INTO notifications ({NOTIFICATION_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(Uuid::from(notification.id))
        .bind(Uuid::from(notification.user_id))
        .bind(Uuid::from(notification.organization_id))
        .bind(notification.notification_type.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.link)
        .bind(Json(&notification.metadata))
        .bind(notification.read_at)
        .bind(notification.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Notification::try_from(record)
    }

    /// 单事务分块写入，任何一块失败整体回滚
    async fn create_batch(
        &self,
        notifications: Vec<Notification>,
    ) -> Result<Vec<Notification>, RepositoryError> {
        if notifications.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;
        let mut created = Vec::with_capacity(notifications.len());

        for chunk in notifications.chunks(BATCH_CHUNK_ROWS) {
            let mut query_builder: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("INSERT INTO notifications ({NOTIFICATION_COLUMNS}) "));
            query_builder.push_values(chunk, |mut b, notification| {
                b.push_bind(Uuid::from(notification.id))
                    .push_bind(Uuid::from(notification.user_id))
                    .push_bind(Uuid::from(notification.organization_id))
                    .push_bind(notification.notification_type.as_str())
                    .push_bind(notification.title.clone())
                    .push_bind(notification.message.clone())
                    .push_bind(notification.link.clone())
                    .push_bind(Json(notification.metadata.clone()))
                    .push_bind(notification.read_at)
                    .push_bind(notification.created_at);
            });
            query_builder.push(format!(" RETURNING {NOTIFICATION_COLUMNS}"));

            let records = query_builder
                .build_query_as::<NotificationRecord>()
                .fetch_all(&mut *tx)
                .await
                .map_err(map_sqlx_err)?;
            for record in records {
                created.push(Notification::try_from(record)?);
            }
        }

        tx.commit().await.map_err(map_sqlx_err)?;
        tracing::debug!(batch_size = created.len(), "批量通知已写入");
        Ok(created)
    }

    async fn find_by_id(&self, id: NotificationId) -> Result<Option<Notification>, RepositoryError> {
        let record = sqlx::query_as::<_, NotificationRecord>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1"
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Notification::try_from).transpose()
    }

    async fn list(&self, query: NotificationQuery) -> Result<NotificationPage, RepositoryError> {
        let user_id = Uuid::from(query.user_id);
        let organization_id = query.organization_id.map(Uuid::from);

        let counts = sqlx::query_as::<_, CountsRecord>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE NOT $3 OR read_at IS NULL) AS total,
                COUNT(*) FILTER (WHERE read_at IS NULL) AS unread
            FROM notifications
            WHERE user_id = $1 AND ($2::uuid IS NULL OR organization_id = $2)
            "#,
        )
        .bind(user_id)
        .bind(organization_id)
        .bind(query.unread_only)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        let records = sqlx::query_as::<_, NotificationRecord>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE user_id = $1
              AND ($2::uuid IS NULL OR organization_id = $2)
              AND (NOT $3 OR read_at IS NULL)
            ORDER BY created_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(user_id)
        .bind(organization_id)
        .bind(query.unread_only)
        .bind(i64::from(query.limit))
        .bind(i64::from(query.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(NotificationPage {
            notifications: records
                .into_iter()
                .map(Notification::try_from)
                .collect::<Result<_, _>>()?,
            unread_count: counts.unread.max(0) as u64,
            total: counts.total.max(0) as u64,
        })
    }

    async fn mark_read(
        &self,
        id: NotificationId,
        user_id: UserId,
        at: Timestamp,
    ) -> Result<Option<Notification>, RepositoryError> {
        // COALESCE 保留第一次的已读时间
        let record = sqlx::query_as::<_, NotificationRecord>(&format!(
            r#"
            UPDATE notifications
            SET read_at = COALESCE(read_at, $3)
            WHERE id = $1 AND user_id = $2
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(Uuid::from(id))
        .bind(Uuid::from(user_id))
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Notification::try_from).transpose()
    }

    async fn mark_all_read(
        &self,
        user_id: UserId,
        organization_id: Option<OrgId>,
        at: Timestamp,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET read_at = $3
            WHERE user_id = $1
              AND ($2::uuid IS NULL OR organization_id = $2)
              AND read_at IS NULL
            "#,
        )
        .bind(Uuid::from(user_id))
        .bind(organization_id.map(Uuid::from))
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: NotificationId, user_id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(Uuid::from(id))
            .bind(Uuid::from(user_id))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(result.rows_affected() > 0)
    }
}
