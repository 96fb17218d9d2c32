use async_trait::async_trait;
use domain::{
    ActivityLogEntry, Channel, ChannelId, ChannelMessage, ChannelType, DirectMessage, Membership,
    MessageCursor, MessageId, Notification, NotificationId, NotificationPage, NotificationQuery,
    OrgId, OrgRole, PresenceRecord, RepositoryError, Timestamp, TypingIndicator, TypingKey, UserId,
};

#[cfg(test)]
use mockall::automock;

/// 成员关系查询（成员管理本身不在本服务范围内）
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    async fn find(
        &self,
        user_id: UserId,
        organization_id: OrgId,
    ) -> Result<Option<Membership>, RepositoryError>;

    // 按加入时间升序，第一条视为用户的默认组织
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Membership>, RepositoryError>;

    async fn list_members(
        &self,
        organization_id: OrgId,
        role: Option<OrgRole>,
    ) -> Result<Vec<Membership>, RepositoryError>;
}

#[async_trait]
pub trait ChannelRepository: Send + Sync {
    async fn create(&self, channel: Channel) -> Result<Channel, RepositoryError>;

    async fn find(
        &self,
        id: ChannelId,
        channel_type: ChannelType,
    ) -> Result<Option<Channel>, RepositoryError>;

    async fn list_by_organization(
        &self,
        organization_id: OrgId,
    ) -> Result<Vec<Channel>, RepositoryError>;

    // 在同一事务内删除频道、频道消息和输入状态，返回频道是否存在
    async fn delete_cascade(
        &self,
        id: ChannelId,
        channel_type: ChannelType,
    ) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait ChannelMessageRepository: Send + Sync {
    async fn create(&self, message: ChannelMessage) -> Result<ChannelMessage, RepositoryError>;

    async fn find_by_id(&self, id: MessageId) -> Result<Option<ChannelMessage>, RepositoryError>;

    // 只更新 content 和 edited_at
    async fn update(&self, message: ChannelMessage) -> Result<ChannelMessage, RepositoryError>;

    // 按 (created_at, id) 倒序，返回严格早于 before 的记录
    async fn list(
        &self,
        channel_id: ChannelId,
        channel_type: ChannelType,
        before: Option<MessageCursor>,
        limit: u32,
    ) -> Result<Vec<ChannelMessage>, RepositoryError>;

    async fn delete(&self, id: MessageId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait DirectMessageRepository: Send + Sync {
    async fn create(&self, message: DirectMessage) -> Result<DirectMessage, RepositoryError>;

    async fn find_by_id(&self, id: MessageId) -> Result<Option<DirectMessage>, RepositoryError>;

    async fn list_conversation(
        &self,
        user_a: UserId,
        user_b: UserId,
        before: Option<MessageCursor>,
        limit: u32,
    ) -> Result<Vec<DirectMessage>, RepositoryError>;

    // 把 sender 发给 reader 的未读消息标记为已读
    async fn mark_read(
        &self,
        reader: UserId,
        sender: UserId,
        at: Timestamp,
    ) -> Result<u64, RepositoryError>;

    async fn delete(&self, id: MessageId) -> Result<bool, RepositoryError>;
}

/// 输入状态存储，键 (channel_id, channel_type, user_id) 必须由存储层保证唯一
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TypingIndicatorRepository: Send + Sync {
    // 原子地插入或刷新，不能先删后插
    async fn upsert(&self, indicator: TypingIndicator) -> Result<(), RepositoryError>;

    async fn remove(&self, key: TypingKey) -> Result<bool, RepositoryError>;

    async fn list_since(
        &self,
        channel_id: ChannelId,
        channel_type: ChannelType,
        since: Timestamp,
    ) -> Result<Vec<TypingIndicator>, RepositoryError>;

    async fn remove_older_than(&self, cutoff: Timestamp) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait PresenceRepository: Send + Sync {
    async fn upsert(&self, record: PresenceRecord) -> Result<(), RepositoryError>;

    async fn find(&self, user_id: UserId) -> Result<Option<PresenceRecord>, RepositoryError>;

    async fn find_many(&self, user_ids: &[UserId]) -> Result<Vec<PresenceRecord>, RepositoryError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: Notification) -> Result<Notification, RepositoryError>;

    // 全部成功或全部失败
    async fn create_batch(
        &self,
        notifications: Vec<Notification>,
    ) -> Result<Vec<Notification>, RepositoryError>;

    async fn find_by_id(&self, id: NotificationId) -> Result<Option<Notification>, RepositoryError>;

    async fn list(&self, query: NotificationQuery) -> Result<NotificationPage, RepositoryError>;

    // 仅当通知属于 user_id 时生效；已读的保留原 read_at。不存在或不属于该用户返回 None
    async fn mark_read(
        &self,
        id: NotificationId,
        user_id: UserId,
        at: Timestamp,
    ) -> Result<Option<Notification>, RepositoryError>;

    async fn mark_all_read(
        &self,
        user_id: UserId,
        organization_id: Option<OrgId>,
        at: Timestamp,
    ) -> Result<u64, RepositoryError>;

    async fn delete(&self, id: NotificationId, user_id: UserId) -> Result<bool, RepositoryError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ActivityLogRepository: Send + Sync {
    async fn append(&self, entry: ActivityLogEntry) -> Result<(), RepositoryError>;

    async fn list_by_organization(
        &self,
        organization_id: OrgId,
        limit: u32,
    ) -> Result<Vec<ActivityLogEntry>, RepositoryError>;
}
