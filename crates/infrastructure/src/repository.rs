use std::sync::Arc;

use domain::RepositoryError;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::db::repositories::{
    PgActivityLogRepository, PgChannelMessageRepository, PgChannelRepository,
    PgDirectMessageRepository, PgMembershipRepository, PgNotificationRepository,
    PgPresenceRepository, PgTypingIndicatorRepository,
};

pub(crate) fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict;
        }
    }
    RepositoryError::storage(err.to_string())
}

pub(crate) fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

/// 所有 PostgreSQL 仓储，共享同一个连接池
#[derive(Clone)]
pub struct PgStorage {
    pub pool: PgPool,
    pub memberships: Arc<PgMembershipRepository>,
    pub channels: Arc<PgChannelRepository>,
    pub channel_messages: Arc<PgChannelMessageRepository>,
    pub direct_messages: Arc<PgDirectMessageRepository>,
    pub typing: Arc<PgTypingIndicatorRepository>,
    pub presence: Arc<PgPresenceRepository>,
    pub notifications: Arc<PgNotificationRepository>,
    pub activity: Arc<PgActivityLogRepository>,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            memberships: Arc::new(PgMembershipRepository::new(pool.clone())),
            channels: Arc::new(PgChannelRepository::new(pool.clone())),
            channel_messages: Arc::new(PgChannelMessageRepository::new(pool.clone())),
            direct_messages: Arc::new(PgDirectMessageRepository::new(pool.clone())),
            typing: Arc::new(PgTypingIndicatorRepository::new(pool.clone())),
            presence: Arc::new(PgPresenceRepository::new(pool.clone())),
            notifications: Arc::new(PgNotificationRepository::new(pool.clone())),
            activity: Arc::new(PgActivityLogRepository::new(pool.clone())),
            pool,
        }
    }

    pub async fn health_check(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
