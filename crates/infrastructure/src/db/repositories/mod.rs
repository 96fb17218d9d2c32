//! Repository实现模块

pub mod activity_log_repository_impl;
pub mod channel_message_repository_impl;
pub mod channel_repository_impl;
pub mod direct_message_repository_impl;
pub mod membership_repository_impl;
pub mod notification_repository_impl;
pub mod presence_repository_impl;
pub mod typing_repository_impl;

pub use activity_log_repository_impl::PgActivityLogRepository;
pub use channel_message_repository_impl::PgChannelMessageRepository;
pub use channel_repository_impl::PgChannelRepository;
pub use direct_message_repository_impl::PgDirectMessageRepository;
pub use membership_repository_impl::PgMembershipRepository;
pub use notification_repository_impl::{PgNotificationRepository, BATCH_CHUNK_ROWS};
pub use presence_repository_impl::PgPresenceRepository;
pub use typing_repository_impl::PgTypingIndicatorRepository;
