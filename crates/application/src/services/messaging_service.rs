//! 频道消息与私信服务
//!
//! 消息写入后不可变（发送者可编辑内容），删除只能由管理员执行并写入审计日志。
//! 历史记录按 (created_at, id) 倒序以游标分页。

use std::sync::Arc;

use domain::{
    ActivityAction, Channel, ChannelId, ChannelMessage, ChannelType, DirectMessage, DomainError,
    MessageContent, MessageCursor, MessageId, MessageKind, MessageSummary, OrgId, ProjectId,
    RoleRequirement, UserId,
};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::Serialize;
use serde_json::json;

use crate::{
    access::{AccessGate, Caller},
    audit::ActivityAuditLog,
    clock::Clock,
    error::ApplicationError,
    repository::{ChannelMessageRepository, ChannelRepository, DirectMessageRepository},
};

pub const DEFAULT_MESSAGE_LIMIT: u32 = 50;
pub const MAX_MESSAGE_LIMIT: u32 = 100;

pub struct MessagingServiceDependencies {
    pub gate: Arc<AccessGate>,
    pub channels: Arc<dyn ChannelRepository>,
    pub channel_messages: Arc<dyn ChannelMessageRepository>,
    pub direct_messages: Arc<dyn DirectMessageRepository>,
    pub audit: Arc<ActivityAuditLog>,
    pub clock: Arc<dyn Clock>,
}

/// 一页消息；满页时带上下一页的游标
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage<T> {
    pub messages: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<MessageCursor>,
}

pub struct MessagingService {
    deps: MessagingServiceDependencies,
}

fn clamp_limit(limit: Option<u32>) -> u32 {
    limit
        .unwrap_or(DEFAULT_MESSAGE_LIMIT)
        .clamp(1, MAX_MESSAGE_LIMIT)
}

fn page_of<T>(messages: Vec<T>, limit: u32, cursor: impl Fn(&T) -> MessageCursor) -> MessagePage<T> {
    let next_cursor = if messages.len() as u32 == limit {
        messages.last().map(cursor)
    } else {
        None
    };
    MessagePage {
        messages,
        next_cursor,
    }
}

impl MessagingService {
    pub fn new(deps: MessagingServiceDependencies) -> Self {
        Self { deps }
    }

    /// 未指定组织时使用调用者的默认组织
    pub async fn list_channels(
        &self,
        caller: Caller,
        organization_id: Option<OrgId>,
    ) -> Result<Vec<Channel>, ApplicationError> {
        let membership = match organization_id {
            Some(org) => {
                self.deps
                    .gate
                    .authorize(caller, org, RoleRequirement::Any)
                    .await?
            }
            None => self.deps.gate.primary_membership(caller).await?,
        };
        Ok(self
            .deps
            .channels
            .list_by_organization(membership.organization_id)
            .await?)
    }

    pub async fn create_channel(
        &self,
        caller: Caller,
        organization_id: OrgId,
        channel_type: ChannelType,
        name: String,
        project_id: Option<ProjectId>,
    ) -> Result<Channel, ApplicationError> {
        self.deps
            .gate
            .authorize(caller, organization_id, RoleRequirement::AdminOrOwner)
            .await?;

        let channel = Channel::new(
            ChannelId::generate(),
            channel_type,
            organization_id,
            project_id,
            name,
            self.deps.clock.now(),
        )?;
        let channel = self.deps.channels.create(channel).await?;
        tracing::info!(
            channel_id = %channel.id,
            channel_type = %channel.channel_type,
            organization_id = %organization_id,
            "频道已创建"
        );
        Ok(channel)
    }

    async fn find_channel(
        &self,
        channel_id: ChannelId,
        channel_type: ChannelType,
    ) -> Result<Channel, ApplicationError> {
        self.deps
            .channels
            .find(channel_id, channel_type)
            .await?
            .ok_or_else(|| ApplicationError::not_found("channel not found"))
    }

    pub async fn send_channel_message(
        &self,
        caller: Caller,
        channel_id: ChannelId,
        channel_type: ChannelType,
        content: String,
    ) -> Result<ChannelMessage, ApplicationError> {
        let sender_id = caller.user_id()?;
        let channel = self.find_channel(channel_id, channel_type).await?;
        self.deps
            .gate
            .authorize(caller, channel.organization_id, RoleRequirement::Any)
            .await?;

        let content = MessageContent::new(content)?;
        let message = ChannelMessage::new(
            MessageId::generate(),
            channel.id,
            channel.channel_type,
            sender_id,
            channel.organization_id,
            content,
            self.deps.clock.now(),
        )?;
        let message = self.deps.channel_messages.create(message).await?;
        tracing::debug!(message_id = %message.id, channel_id = %channel_id, sender_id = %sender_id, "频道消息已发送");
        Ok(message)
    }

    pub async fn list_channel_messages(
        &self,
        caller: Caller,
        channel_id: ChannelId,
        channel_type: ChannelType,
        before: Option<MessageCursor>,
        limit: Option<u32>,
    ) -> Result<MessagePage<ChannelMessage>, ApplicationError> {
        let channel = self.find_channel(channel_id, channel_type).await?;
        self.deps
            .gate
            .authorize(caller, channel.organization_id, RoleRequirement::Any)
            .await?;

        let limit = clamp_limit(limit);
        let messages = self
            .deps
            .channel_messages
            .list(channel_id, channel_type, before, limit)
            .await?;
        Ok(page_of(messages, limit, ChannelMessage::cursor))
    }

    /// 以流的形式遍历频道历史（新到旧），只有被 poll 时才拉取下一页。
    ///
    /// 鉴权只在创建流时做一次；从任意游标开始都可以重新遍历。
    pub async fn channel_history_stream(
        &self,
        caller: Caller,
        channel_id: ChannelId,
        channel_type: ChannelType,
        from: Option<MessageCursor>,
        page_size: Option<u32>,
    ) -> Result<BoxStream<'static, Result<ChannelMessage, ApplicationError>>, ApplicationError>
    {
        let channel = self.find_channel(channel_id, channel_type).await?;
        self.deps
            .gate
            .authorize(caller, channel.organization_id, RoleRequirement::Any)
            .await?;

        let repository = self.deps.channel_messages.clone();
        let page_size = clamp_limit(page_size);

        let pages = stream::try_unfold((from, false), move |(cursor, exhausted)| {
            let repository = repository.clone();
            async move {
                if exhausted {
                    return Ok::<_, ApplicationError>(None);
                }
                let page = repository
                    .list(channel_id, channel_type, cursor, page_size)
                    .await?;
                if page.is_empty() {
                    return Ok(None);
                }
                let next = page.last().map(ChannelMessage::cursor);
                let exhausted = (page.len() as u32) < page_size;
                Ok(Some((page, (next, exhausted))))
            }
        });

        Ok(pages
            .map_ok(|page| stream::iter(page.into_iter().map(Ok::<_, ApplicationError>)))
            .try_flatten()
            .boxed())
    }

    /// 只有发送者本人可以编辑
    pub async fn edit_channel_message(
        &self,
        caller: Caller,
        message_id: MessageId,
        content: String,
    ) -> Result<ChannelMessage, ApplicationError> {
        let editor = caller.user_id()?;
        let mut message = self
            .deps
            .channel_messages
            .find_by_id(message_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("message not found"))?;
        self.deps
            .gate
            .authorize(caller, message.organization_id, RoleRequirement::Any)
            .await?;
        if message.sender_id != editor {
            return Err(ApplicationError::authorization(
                "only the sender can edit a message",
            ));
        }

        message.edit(MessageContent::new(content)?, self.deps.clock.now());
        Ok(self.deps.channel_messages.update(message).await?)
    }

    pub async fn send_direct_message(
        &self,
        caller: Caller,
        recipient_id: UserId,
        content: String,
    ) -> Result<DirectMessage, ApplicationError> {
        let sender_id = caller.user_id()?;
        self.deps.gate.authorize_shared(caller, recipient_id).await?;

        let content = MessageContent::new(content)?;
        let message = DirectMessage::new(
            MessageId::generate(),
            sender_id,
            recipient_id,
            content,
            self.deps.clock.now(),
        )?;
        Ok(self.deps.direct_messages.create(message).await?)
    }

    pub async fn list_direct_messages(
        &self,
        caller: Caller,
        peer_id: UserId,
        before: Option<MessageCursor>,
        limit: Option<u32>,
    ) -> Result<MessagePage<DirectMessage>, ApplicationError> {
        let user_id = caller.user_id()?;
        self.deps.gate.authorize_shared(caller, peer_id).await?;
        let limit = clamp_limit(limit);
        let messages = self
            .deps
            .direct_messages
            .list_conversation(user_id, peer_id, before, limit)
            .await?;
        Ok(page_of(messages, limit, DirectMessage::cursor))
    }

    /// 把对方发来的未读私信全部标记为已读，返回更新条数
    pub async fn mark_conversation_read(
        &self,
        caller: Caller,
        peer_id: UserId,
    ) -> Result<u64, ApplicationError> {
        let reader = caller.user_id()?;
        self.deps.gate.authorize_shared(caller, peer_id).await?;
        Ok(self
            .deps
            .direct_messages
            .mark_read(reader, peer_id, self.deps.clock.now())
            .await?)
    }

    /// 管理员删除消息。目标不存在时视为成功，且不写审计日志
    pub async fn delete_message(
        &self,
        caller: Caller,
        message_id: MessageId,
        kind: MessageKind,
    ) -> Result<(), ApplicationError> {
        let (summary, organization_id) = match kind {
            MessageKind::Channel => {
                let Some(message) = self.deps.channel_messages.find_by_id(message_id).await?
                else {
                    self.deps
                        .gate
                        .authorize_any(caller, RoleRequirement::AdminOnly)
                        .await?;
                    return Ok(());
                };
                self.deps
                    .gate
                    .authorize(caller, message.organization_id, RoleRequirement::AdminOnly)
                    .await?;
                (MessageSummary::from(&message), message.organization_id)
            }
            MessageKind::Direct => {
                let Some(message) = self.deps.direct_messages.find_by_id(message_id).await?
                else {
                    self.deps
                        .gate
                        .authorize_any(caller, RoleRequirement::AdminOnly)
                        .await?;
                    return Ok(());
                };
                // 审计记在双方共同所属、且调用者为管理员的组织下
                let membership = self
                    .deps
                    .gate
                    .authorize_over(
                        caller,
                        &[message.sender_id, message.recipient_id],
                        RoleRequirement::AdminOnly,
                    )
                    .await?;
                (MessageSummary::from(&message), membership.organization_id)
            }
        };

        let deleted = match kind {
            MessageKind::Channel => self.deps.channel_messages.delete(message_id).await?,
            MessageKind::Direct => self.deps.direct_messages.delete(message_id).await?,
        };
        if !deleted {
            return Ok(());
        }

        let actor = caller.user_id()?;
        let (action, description) = match kind {
            MessageKind::Channel => (
                ActivityAction::MessageDeleted,
                format!("Deleted channel message: {}", summary.preview),
            ),
            MessageKind::Direct => (
                ActivityAction::DirectMessageDeleted,
                format!("Deleted direct message: {}", summary.preview),
            ),
        };
        self.deps
            .audit
            .record(
                actor,
                organization_id,
                action,
                description,
                json!({
                    "messageId": summary.id,
                    "messageType": summary.kind.as_str(),
                    "channelType": summary.channel_type.map(|t| t.as_str()),
                    "preview": summary.preview,
                }),
            )
            .await;
        Ok(())
    }

    /// 删除频道及其消息和输入状态（同一事务）
    pub async fn delete_channel(
        &self,
        caller: Caller,
        channel_id: ChannelId,
        channel_type: ChannelType,
    ) -> Result<(), ApplicationError> {
        if !channel_type.is_persistent() {
            return Err(DomainError::invalid_argument(
                "channel_type",
                "must be organization or project",
            )
            .into());
        }

        let Some(channel) = self.deps.channels.find(channel_id, channel_type).await? else {
            self.deps
                .gate
                .authorize_any(caller, RoleRequirement::AdminOrOwner)
                .await?;
            return Ok(());
        };
        let membership = self
            .deps
            .gate
            .authorize(caller, channel.organization_id, RoleRequirement::AdminOrOwner)
            .await?;

        if !self
            .deps
            .channels
            .delete_cascade(channel_id, channel_type)
            .await?
        {
            return Ok(());
        }

        self.deps
            .audit
            .record(
                membership.user_id,
                channel.organization_id,
                ActivityAction::ChannelDeleted,
                format!("Deleted channel: {}", channel.name),
                json!({
                    "channelId": channel.id,
                    "channelType": channel.channel_type.as_str(),
                    "name": channel.name,
                }),
            )
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock, memory::MemoryStore, repository::MockActivityLogRepository,
    };
    use chrono::Duration;
    use domain::{OrgRole, RepositoryError};

    struct Fixture {
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        service: MessagingService,
        org: OrgId,
        admin: UserId,
        member: UserId,
    }

    async fn fixture() -> Fixture {
        fixture_with_audit(None).await
    }

    async fn fixture_with_audit(audit_repo: Option<MockActivityLogRepository>) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::default());
        let org = OrgId::generate();
        let admin = UserId::generate();
        let member = UserId::generate();
        store.add_membership(admin, org, OrgRole::Admin).await;
        store.add_membership(member, org, OrgRole::Consultant).await;

        let gate = Arc::new(AccessGate::new(store.clone()));
        let audit = match audit_repo {
            Some(repo) => ActivityAuditLog::new(Arc::new(repo), gate.clone(), clock.clone()),
            None => ActivityAuditLog::new(store.clone(), gate.clone(), clock.clone()),
        };
        let service = MessagingService::new(MessagingServiceDependencies {
            gate,
            channels: store.clone(),
            channel_messages: store.clone(),
            direct_messages: store.clone(),
            audit: Arc::new(audit),
            clock: clock.clone(),
        });

        Fixture {
            store,
            clock,
            service,
            org,
            admin,
            member,
        }
    }

    async fn general(f: &Fixture) -> Channel {
        f.service
            .create_channel(
                Caller::User(f.admin),
                f.org,
                ChannelType::Organization,
                "general".into(),
                None,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn empty_content_is_rejected_and_not_persisted() {
        let f = fixture().await;
        let channel = general(&f).await;

        let result = f
            .service
            .send_channel_message(
                Caller::User(f.member),
                channel.id,
                channel.channel_type,
                "   ".into(),
            )
            .await;
        assert!(matches!(result, Err(ApplicationError::Domain(_))));

        let page = f
            .service
            .list_channel_messages(Caller::User(f.member), channel.id, channel.channel_type, None, None)
            .await
            .unwrap();
        assert!(page.messages.is_empty());
    }

    #[tokio::test]
    async fn non_member_cannot_post() {
        let f = fixture().await;
        let channel = general(&f).await;

        let result = f
            .service
            .send_channel_message(
                Caller::User(UserId::generate()),
                channel.id,
                channel.channel_type,
                "hello".into(),
            )
            .await;
        assert!(matches!(result, Err(ApplicationError::Authorization(_))));
    }

    #[tokio::test]
    async fn history_stream_is_newest_first_across_pages() {
        let f = fixture().await;
        let channel = general(&f).await;
        for i in 0..5 {
            f.service
                .send_channel_message(
                    Caller::User(f.member),
                    channel.id,
                    channel.channel_type,
                    format!("message {i}"),
                )
                .await
                .unwrap();
            f.clock.advance(Duration::seconds(1));
        }

        let stream = f
            .service
            .channel_history_stream(
                Caller::User(f.member),
                channel.id,
                channel.channel_type,
                None,
                Some(2),
            )
            .await
            .unwrap();
        let contents: Vec<String> = stream
            .map_ok(|m| m.content.to_string())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(
            contents,
            vec!["message 4", "message 3", "message 2", "message 1", "message 0"]
        );
    }

    #[tokio::test]
    async fn full_page_carries_cursor() {
        let f = fixture().await;
        let channel = general(&f).await;
        for i in 0..3 {
            f.service
                .send_channel_message(
                    Caller::User(f.member),
                    channel.id,
                    channel.channel_type,
                    format!("m{i}"),
                )
                .await
                .unwrap();
            f.clock.advance(Duration::seconds(1));
        }

        let first = f
            .service
            .list_channel_messages(Caller::User(f.member), channel.id, channel.channel_type, None, Some(2))
            .await
            .unwrap();
        assert_eq!(first.messages.len(), 2);
        let cursor = first.next_cursor.unwrap();

        let second = f
            .service
            .list_channel_messages(
                Caller::User(f.member),
                channel.id,
                channel.channel_type,
                Some(cursor),
                Some(2),
            )
            .await
            .unwrap();
        assert_eq!(second.messages.len(), 1);
        assert_eq!(second.messages[0].content.as_str(), "m0");
        assert!(second.next_cursor.is_none());
    }

    #[tokio::test]
    async fn only_sender_can_edit() {
        let f = fixture().await;
        let channel = general(&f).await;
        let message = f
            .service
            .send_channel_message(Caller::User(f.member), channel.id, channel.channel_type, "draft".into())
            .await
            .unwrap();

        let by_admin = f
            .service
            .edit_channel_message(Caller::User(f.admin), message.id, "hijacked".into())
            .await;
        assert!(matches!(by_admin, Err(ApplicationError::Authorization(_))));

        let edited = f
            .service
            .edit_channel_message(Caller::User(f.member), message.id, "final".into())
            .await
            .unwrap();
        assert_eq!(edited.content.as_str(), "final");
        assert!(edited.edited_at.is_some());
    }

    #[tokio::test]
    async fn non_admin_cannot_delete_channel() {
        let f = fixture().await;
        let channel = general(&f).await;

        let result = f
            .service
            .delete_channel(Caller::User(f.member), channel.id, channel.channel_type)
            .await;
        assert!(matches!(result, Err(ApplicationError::Authorization(_))));

        let channels = f
            .service
            .list_channels(Caller::User(f.member), Some(f.org))
            .await
            .unwrap();
        assert_eq!(channels.len(), 1);
    }

    #[tokio::test]
    async fn channel_delete_cascades_and_is_audited() {
        let f = fixture().await;
        let channel = general(&f).await;
        f.service
            .send_channel_message(Caller::User(f.member), channel.id, channel.channel_type, "hi".into())
            .await
            .unwrap();

        f.service
            .delete_channel(Caller::User(f.admin), channel.id, channel.channel_type)
            .await
            .unwrap();

        let result = f
            .service
            .list_channel_messages(Caller::User(f.member), channel.id, channel.channel_type, None, None)
            .await;
        assert!(matches!(result, Err(ApplicationError::NotFound(_))));

        let entries = f.store.activity_entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, ActivityAction::ChannelDeleted);
        assert_eq!(entries[0].description, "Deleted channel: general");
    }

    #[tokio::test]
    async fn deleting_missing_message_is_a_silent_success() {
        let f = fixture().await;

        f.service
            .delete_message(Caller::User(f.admin), MessageId::generate(), MessageKind::Channel)
            .await
            .unwrap();
        assert!(f.store.activity_entries().await.is_empty());
    }

    #[tokio::test]
    async fn message_delete_requires_admin_and_records_preview() {
        let f = fixture().await;
        let channel = general(&f).await;
        let message = f
            .service
            .send_channel_message(
                Caller::User(f.member),
                channel.id,
                channel.channel_type,
                "x".repeat(150),
            )
            .await
            .unwrap();

        let result = f
            .service
            .delete_message(Caller::User(f.member), message.id, MessageKind::Channel)
            .await;
        assert!(matches!(result, Err(ApplicationError::Authorization(_))));

        f.service
            .delete_message(Caller::User(f.admin), message.id, MessageKind::Channel)
            .await
            .unwrap();
        let entries = f.store.activity_entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].metadata["preview"].as_str().unwrap().chars().count(), 101);
    }

    #[tokio::test]
    async fn audit_failure_does_not_fail_delete() {
        let mut audit_repo = MockActivityLogRepository::new();
        audit_repo
            .expect_append()
            .returning(|_| Err(RepositoryError::storage("connection reset")));
        let f = fixture_with_audit(Some(audit_repo)).await;
        let channel = general(&f).await;
        let message = f
            .service
            .send_channel_message(Caller::User(f.member), channel.id, channel.channel_type, "bye".into())
            .await
            .unwrap();

        f.service
            .delete_message(Caller::User(f.admin), message.id, MessageKind::Channel)
            .await
            .unwrap();
        let page = f
            .service
            .list_channel_messages(Caller::User(f.admin), channel.id, channel.channel_type, None, None)
            .await
            .unwrap();
        assert!(page.messages.is_empty());
    }

    #[tokio::test]
    async fn direct_messages_require_shared_organization() {
        let f = fixture().await;
        let outsider = UserId::generate();
        f.store
            .add_membership(outsider, OrgId::generate(), OrgRole::Client)
            .await;

        let result = f
            .service
            .send_direct_message(Caller::User(f.member), outsider, "hi".into())
            .await;
        assert!(matches!(result, Err(ApplicationError::Authorization(_))));

        f.service
            .send_direct_message(Caller::User(f.member), f.admin, "hi".into())
            .await
            .unwrap();
        let updated = f
            .service
            .mark_conversation_read(Caller::User(f.admin), f.member)
            .await
            .unwrap();
        assert_eq!(updated, 1);

        let listing = f
            .service
            .list_direct_messages(Caller::User(outsider), f.member, None, None)
            .await;
        assert!(matches!(listing, Err(ApplicationError::Authorization(_))));
        let marking = f
            .service
            .mark_conversation_read(Caller::User(outsider), f.member)
            .await;
        assert!(matches!(marking, Err(ApplicationError::Authorization(_))));
    }

    #[tokio::test]
    async fn direct_message_delete_is_scoped_to_participants_organization() {
        let f = fixture().await;
        let foreign_org = OrgId::generate();
        let foreign_admin = UserId::generate();
        f.store
            .add_membership(foreign_admin, foreign_org, OrgRole::Admin)
            .await;
        let dm = f
            .service
            .send_direct_message(Caller::User(f.member), f.admin, "private".into())
            .await
            .unwrap();

        let result = f
            .service
            .delete_message(Caller::User(foreign_admin), dm.id, MessageKind::Direct)
            .await;
        assert!(matches!(result, Err(ApplicationError::Authorization(_))));
        assert!(DirectMessageRepository::find_by_id(f.store.as_ref(), dm.id)
            .await
            .unwrap()
            .is_some());
        assert!(f.store.activity_entries().await.is_empty());

        f.service
            .delete_message(Caller::User(f.admin), dm.id, MessageKind::Direct)
            .await
            .unwrap();
        let entries = f.store.activity_entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].organization_id, f.org);
        assert_eq!(entries[0].action, ActivityAction::DirectMessageDeleted);
    }
}
