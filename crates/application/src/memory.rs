//! 内存实现的存储（用于测试和本地开发）
//!
//! 所有写操作都在同一把写锁内完成，因此输入状态的 upsert 与批量通知插入
//! 和 PostgreSQL 实现一样具有原子性。

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use domain::{
    ActivityLogEntry, Channel, ChannelId, ChannelMessage, ChannelType, DirectMessage, Membership,
    MessageCursor, MessageId, Notification, NotificationId, NotificationPage, NotificationQuery,
    OrgId, OrgRole, PresenceRecord, RepositoryError, Timestamp, TypingIndicator, TypingKey, UserId,
};
use tokio::sync::RwLock;

use crate::repository::{
    ActivityLogRepository, ChannelMessageRepository, ChannelRepository, DirectMessageRepository,
    MembershipRepository, NotificationRepository, PresenceRepository, TypingIndicatorRepository,
};

#[derive(Default)]
struct MemoryState {
    memberships: Vec<Membership>,
    channels: HashMap<(ChannelId, ChannelType), Channel>,
    channel_messages: HashMap<MessageId, ChannelMessage>,
    direct_messages: HashMap<MessageId, DirectMessage>,
    typing: HashMap<TypingKey, TypingIndicator>,
    presence: HashMap<UserId, PresenceRecord>,
    notifications: HashMap<NotificationId, Notification>,
    activity: Vec<ActivityLogEntry>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入一条成员关系；同一 (user, org) 再次写入时覆盖角色
    pub async fn add_membership(&self, user_id: UserId, organization_id: OrgId, role: OrgRole) {
        let mut state = self.state.write().await;
        if let Some(existing) = state
            .memberships
            .iter_mut()
            .find(|m| m.user_id == user_id && m.organization_id == organization_id)
        {
            existing.role = role;
            return;
        }
        state
            .memberships
            .push(Membership::new(user_id, organization_id, role, Utc::now()));
    }

    /// 某个键当前的输入状态行数（正常情况下只会是 0 或 1）
    pub async fn typing_rows(&self, key: TypingKey) -> usize {
        let state = self.state.read().await;
        state.typing.keys().filter(|k| **k == key).count()
    }

    pub async fn activity_entries(&self) -> Vec<ActivityLogEntry> {
        self.state.read().await.activity.clone()
    }

    pub async fn notification_count(&self) -> usize {
        self.state.read().await.notifications.len()
    }
}

fn page<T, K>(mut items: Vec<T>, key: K, before: Option<MessageCursor>, limit: u32) -> Vec<T>
where
    K: Fn(&T) -> (Timestamp, MessageId),
{
    items.retain(|item| {
        let (created_at, id) = key(item);
        before.map_or(true, |cursor| cursor.precedes(created_at, id))
    });
    items.sort_by(|a, b| key(b).cmp(&key(a)));
    items.truncate(limit as usize);
    items
}

#[async_trait]
impl MembershipRepository for MemoryStore {
    async fn find(
        &self,
        user_id: UserId,
        organization_id: OrgId,
    ) -> Result<Option<Membership>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .memberships
            .iter()
            .find(|m| m.user_id == user_id && m.organization_id == organization_id)
            .cloned())
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Membership>, RepositoryError> {
        let state = self.state.read().await;
        let mut memberships: Vec<Membership> = state
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        memberships.sort_by_key(|m| m.created_at);
        Ok(memberships)
    }

    async fn list_members(
        &self,
        organization_id: OrgId,
        role: Option<OrgRole>,
    ) -> Result<Vec<Membership>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .memberships
            .iter()
            .filter(|m| m.organization_id == organization_id)
            .filter(|m| role.map_or(true, |role| m.role == role))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ChannelRepository for MemoryStore {
    async fn create(&self, channel: Channel) -> Result<Channel, RepositoryError> {
        let mut state = self.state.write().await;
        let key = (channel.id, channel.channel_type);
        if state.channels.contains_key(&key) {
            return Err(RepositoryError::Conflict);
        }
        state.channels.insert(key, channel.clone());
        Ok(channel)
    }

    async fn find(
        &self,
        id: ChannelId,
        channel_type: ChannelType,
    ) -> Result<Option<Channel>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.channels.get(&(id, channel_type)).cloned())
    }

    async fn list_by_organization(
        &self,
        organization_id: OrgId,
    ) -> Result<Vec<Channel>, RepositoryError> {
        let state = self.state.read().await;
        let mut channels: Vec<Channel> = state
            .channels
            .values()
            .filter(|c| c.organization_id == organization_id)
            .cloned()
            .collect();
        channels.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(channels)
    }

    async fn delete_cascade(
        &self,
        id: ChannelId,
        channel_type: ChannelType,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        if state.channels.remove(&(id, channel_type)).is_none() {
            return Ok(false);
        }
        state
            .channel_messages
            .retain(|_, m| !(m.channel_id == id && m.channel_type == channel_type));
        state
            .typing
            .retain(|k, _| !(k.channel_id == id && k.channel_type == channel_type));
        Ok(true)
    }
}

#[async_trait]
impl ChannelMessageRepository for MemoryStore {
    async fn create(&self, message: ChannelMessage) -> Result<ChannelMessage, RepositoryError> {
        let mut state = self.state.write().await;
        if state.channel_messages.contains_key(&message.id) {
            return Err(RepositoryError::Conflict);
        }
        state.channel_messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn find_by_id(&self, id: MessageId) -> Result<Option<ChannelMessage>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.channel_messages.get(&id).cloned())
    }

    async fn update(&self, message: ChannelMessage) -> Result<ChannelMessage, RepositoryError> {
        let mut state = self.state.write().await;
        let stored = state
            .channel_messages
            .get_mut(&message.id)
            .ok_or(RepositoryError::NotFound)?;
        stored.content = message.content;
        stored.edited_at = message.edited_at;
        Ok(stored.clone())
    }

    async fn list(
        &self,
        channel_id: ChannelId,
        channel_type: ChannelType,
        before: Option<MessageCursor>,
        limit: u32,
    ) -> Result<Vec<ChannelMessage>, RepositoryError> {
        let state = self.state.read().await;
        let items = state
            .channel_messages
            .values()
            .filter(|m| m.channel_id == channel_id && m.channel_type == channel_type)
            .cloned()
            .collect();
        Ok(page(items, |m| (m.created_at, m.id), before, limit))
    }

    async fn delete(&self, id: MessageId) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        Ok(state.channel_messages.remove(&id).is_some())
    }
}

#[async_trait]
impl DirectMessageRepository for MemoryStore {
    async fn create(&self, message: DirectMessage) -> Result<DirectMessage, RepositoryError> {
        let mut state = self.state.write().await;
        if state.direct_messages.contains_key(&message.id) {
            return Err(RepositoryError::Conflict);
        }
        state.direct_messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn find_by_id(&self, id: MessageId) -> Result<Option<DirectMessage>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.direct_messages.get(&id).cloned())
    }

    async fn list_conversation(
        &self,
        user_a: UserId,
        user_b: UserId,
        before: Option<MessageCursor>,
        limit: u32,
    ) -> Result<Vec<DirectMessage>, RepositoryError> {
        let state = self.state.read().await;
        let items = state
            .direct_messages
            .values()
            .filter(|m| m.is_between(user_a, user_b))
            .cloned()
            .collect();
        Ok(page(items, |m| (m.created_at, m.id), before, limit))
    }

    async fn mark_read(
        &self,
        reader: UserId,
        sender: UserId,
        at: Timestamp,
    ) -> Result<u64, RepositoryError> {
        let mut state = self.state.write().await;
        let mut updated = 0;
        for message in state.direct_messages.values_mut() {
            if message.recipient_id == reader
                && message.sender_id == sender
                && message.read_at.is_none()
            {
                message.read_at = Some(at);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn delete(&self, id: MessageId) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        Ok(state.direct_messages.remove(&id).is_some())
    }
}

#[async_trait]
impl TypingIndicatorRepository for MemoryStore {
    async fn upsert(&self, indicator: TypingIndicator) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.typing.insert(indicator.key(), indicator);
        Ok(())
    }

    async fn remove(&self, key: TypingKey) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        Ok(state.typing.remove(&key).is_some())
    }

    async fn list_since(
        &self,
        channel_id: ChannelId,
        channel_type: ChannelType,
        since: Timestamp,
    ) -> Result<Vec<TypingIndicator>, RepositoryError> {
        let state = self.state.read().await;
        let mut rows: Vec<TypingIndicator> = state
            .typing
            .values()
            .filter(|t| t.channel_id == channel_id && t.channel_type == channel_type)
            .filter(|t| t.updated_at >= since)
            .cloned()
            .collect();
        rows.sort_by_key(|t| t.updated_at);
        Ok(rows)
    }

    async fn remove_older_than(&self, cutoff: Timestamp) -> Result<u64, RepositoryError> {
        let mut state = self.state.write().await;
        let before = state.typing.len();
        state.typing.retain(|_, t| t.updated_at >= cutoff);
        Ok((before - state.typing.len()) as u64)
    }
}

#[async_trait]
impl PresenceRepository for MemoryStore {
    async fn upsert(&self, record: PresenceRecord) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.presence.insert(record.user_id, record);
        Ok(())
    }

    async fn find(&self, user_id: UserId) -> Result<Option<PresenceRecord>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.presence.get(&user_id).cloned())
    }

    async fn find_many(&self, user_ids: &[UserId]) -> Result<Vec<PresenceRecord>, RepositoryError> {
        let state = self.state.read().await;
        Ok(user_ids
            .iter()
            .filter_map(|id| state.presence.get(id).cloned())
            .collect())
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn create(&self, notification: Notification) -> Result<Notification, RepositoryError> {
        let mut state = self.state.write().await;
        if state.notifications.contains_key(&notification.id) {
            return Err(RepositoryError::Conflict);
        }
        state
            .notifications
            .insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn create_batch(
        &self,
        notifications: Vec<Notification>,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let mut state = self.state.write().await;
        // 先整体校验再写入，任何一条冲突都不落库
        let mut seen = std::collections::HashSet::new();
        for notification in &notifications {
            if state.notifications.contains_key(&notification.id) || !seen.insert(notification.id)
            {
                return Err(RepositoryError::Conflict);
            }
        }
        for notification in &notifications {
            state
                .notifications
                .insert(notification.id, notification.clone());
        }
        Ok(notifications)
    }

    async fn find_by_id(&self, id: NotificationId) -> Result<Option<Notification>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.notifications.get(&id).cloned())
    }

    async fn list(&self, query: NotificationQuery) -> Result<NotificationPage, RepositoryError> {
        let state = self.state.read().await;
        let mut matching: Vec<&Notification> = state
            .notifications
            .values()
            .filter(|n| query.matches(n))
            .collect();
        matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let unread_count = state
            .notifications
            .values()
            .filter(|n| n.user_id == query.user_id && n.is_unread())
            .filter(|n| {
                query
                    .organization_id
                    .map_or(true, |org| n.organization_id == org)
            })
            .count() as u64;

        Ok(NotificationPage {
            total: matching.len() as u64,
            notifications: matching
                .into_iter()
                .skip(query.offset as usize)
                .take(query.limit as usize)
                .cloned()
                .collect(),
            unread_count,
        })
    }

    async fn mark_read(
        &self,
        id: NotificationId,
        user_id: UserId,
        at: Timestamp,
    ) -> Result<Option<Notification>, RepositoryError> {
        let mut state = self.state.write().await;
        match state.notifications.get_mut(&id) {
            Some(notification) if notification.user_id == user_id => {
                notification.mark_read(at);
                Ok(Some(notification.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_all_read(
        &self,
        user_id: UserId,
        organization_id: Option<OrgId>,
        at: Timestamp,
    ) -> Result<u64, RepositoryError> {
        let mut state = self.state.write().await;
        let mut updated = 0;
        for notification in state.notifications.values_mut() {
            let in_scope = notification.user_id == user_id
                && organization_id.map_or(true, |org| notification.organization_id == org);
            if in_scope && notification.mark_read(at) {
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn delete(&self, id: NotificationId, user_id: UserId) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        match state.notifications.get(&id) {
            Some(notification) if notification.user_id == user_id => {
                state.notifications.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl ActivityLogRepository for MemoryStore {
    async fn append(&self, entry: ActivityLogEntry) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.activity.push(entry);
        Ok(())
    }

    async fn list_by_organization(
        &self,
        organization_id: OrgId,
        limit: u32,
    ) -> Result<Vec<ActivityLogEntry>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .activity
            .iter()
            .rev()
            .filter(|entry| entry.organization_id == organization_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
