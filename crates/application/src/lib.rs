//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务：访问控制、频道/私信、输入状态、
//! 在线状态、通知扇出以及审计日志，并抽象出仓储接口供基础设施层实现。

pub mod access;
pub mod audit;
pub mod clock;
pub mod error;
pub mod memory;
pub mod repository;
pub mod services;
pub mod sweeper;

pub use access::{AccessGate, Caller};
pub use audit::ActivityAuditLog;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::ApplicationError;
pub use memory::MemoryStore;
pub use repository::{
    ActivityLogRepository, ChannelMessageRepository, ChannelRepository, DirectMessageRepository,
    MembershipRepository, NotificationRepository, PresenceRepository, TypingIndicatorRepository,
};
pub use services::{
    MessagingService, MessagingServiceDependencies, NotificationService,
    NotificationServiceDependencies, PresenceService, PresenceServiceDependencies, TypingService,
    TypingServiceDependencies,
};
pub use sweeper::spawn_typing_sweeper;
