//! 基础设施层实现。
//!
//! 提供 PostgreSQL 仓储与数据库迁移，实现应用层定义的仓储接口。

pub mod builder;
pub mod db;
pub mod migrations;
pub mod repository;

pub use builder::{Infrastructure, InfrastructureConfig, InfrastructureError};
pub use db::repositories::{
    PgActivityLogRepository, PgChannelMessageRepository, PgChannelRepository,
    PgDirectMessageRepository, PgMembershipRepository, PgNotificationRepository,
    PgPresenceRepository, PgTypingIndicatorRepository, BATCH_CHUNK_ROWS,
};
pub use migrations::MIGRATOR;
pub use repository::{create_pg_pool, PgStorage};
