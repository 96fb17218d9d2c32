mod messaging_service;
mod notification_service;
mod presence_service;
mod typing_service;

pub use messaging_service::{
    MessagePage, MessagingService, MessagingServiceDependencies, DEFAULT_MESSAGE_LIMIT,
    MAX_MESSAGE_LIMIT,
};
pub use notification_service::{
    ListNotificationsRequest, NotificationListing, NotificationPayload, NotificationService,
    NotificationServiceDependencies, DEFAULT_NOTIFICATION_LIMIT, MAX_NOTIFICATION_LIMIT,
};
pub use presence_service::{
    MemberPresence, PresenceService, PresenceServiceDependencies, DEFAULT_PRESENCE_STALE_SECS,
};
pub use typing_service::{TypingService, TypingServiceDependencies, DEFAULT_TYPING_WINDOW_SECS};
