use std::sync::Arc;

use application::{
    AccessGate, ActivityAuditLog, ActivityLogRepository, ChannelMessageRepository,
    ChannelRepository, Clock, DirectMessageRepository, MemoryStore, MembershipRepository,
    MessagingService, MessagingServiceDependencies, NotificationRepository, NotificationService,
    NotificationServiceDependencies, PresenceRepository, PresenceService,
    PresenceServiceDependencies, TypingIndicatorRepository, TypingService,
    TypingServiceDependencies,
};

use crate::JwtService;

/// 各服务依赖的仓储实现
#[derive(Clone)]
pub struct Repositories {
    pub memberships: Arc<dyn MembershipRepository>,
    pub channels: Arc<dyn ChannelRepository>,
    pub channel_messages: Arc<dyn ChannelMessageRepository>,
    pub direct_messages: Arc<dyn DirectMessageRepository>,
    pub typing: Arc<dyn TypingIndicatorRepository>,
    pub presence: Arc<dyn PresenceRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub activity: Arc<dyn ActivityLogRepository>,
}

impl Repositories {
    pub fn in_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            memberships: store.clone(),
            channels: store.clone(),
            channel_messages: store.clone(),
            direct_messages: store.clone(),
            typing: store.clone(),
            presence: store.clone(),
            notifications: store.clone(),
            activity: store,
        }
    }
}

/// 输入状态与在线状态的时间参数
#[derive(Debug, Clone, Copy)]
pub struct RealtimeSettings {
    pub typing_window: chrono::Duration,
    pub presence_stale_threshold: chrono::Duration,
}

#[derive(Clone)]
pub struct AppState {
    pub messaging: Arc<MessagingService>,
    pub typing: Arc<TypingService>,
    pub presence: Arc<PresenceService>,
    pub notifications: Arc<NotificationService>,
    pub audit: Arc<ActivityAuditLog>,
    pub jwt_service: Arc<JwtService>,
}

impl AppState {
    pub fn new(
        repositories: Repositories,
        clock: Arc<dyn Clock>,
        realtime: RealtimeSettings,
        jwt_service: Arc<JwtService>,
    ) -> Self {
        let gate = Arc::new(AccessGate::new(repositories.memberships.clone()));
        let audit = Arc::new(ActivityAuditLog::new(
            repositories.activity.clone(),
            gate.clone(),
            clock.clone(),
        ));

        let messaging = MessagingService::new(MessagingServiceDependencies {
            gate: gate.clone(),
            channels: repositories.channels.clone(),
            channel_messages: repositories.channel_messages.clone(),
            direct_messages: repositories.direct_messages.clone(),
            audit: audit.clone(),
            clock: clock.clone(),
        });

        let typing = TypingService::new(TypingServiceDependencies {
            gate: gate.clone(),
            repository: repositories.typing.clone(),
            clock: clock.clone(),
            window: realtime.typing_window,
        });

        let presence = PresenceService::new(PresenceServiceDependencies {
            gate: gate.clone(),
            memberships: repositories.memberships.clone(),
            repository: repositories.presence.clone(),
            clock: clock.clone(),
            stale_threshold: realtime.presence_stale_threshold,
        });

        let notifications = NotificationService::new(NotificationServiceDependencies {
            gate,
            memberships: repositories.memberships,
            repository: repositories.notifications,
            audit: audit.clone(),
            clock,
        });

        Self {
            messaging: Arc::new(messaging),
            typing: Arc::new(typing),
            presence: Arc::new(presence),
            notifications: Arc::new(notifications),
            audit,
            jwt_service,
        }
    }
}
