use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::channel::ChannelType;
use crate::errors::DomainError;
use crate::value_objects::{ChannelId, MessageContent, MessageId, OrgId, Timestamp, UserId};

/// 管理端删除消息时区分的消息种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Channel,
    Direct,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Channel => "channel",
            MessageKind::Direct => "direct",
        }
    }
}

impl FromStr for MessageKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "channel" => Ok(MessageKind::Channel),
            "direct" => Ok(MessageKind::Direct),
            _ => Err(DomainError::unknown_variant("message_type", value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub channel_type: ChannelType,
    pub sender_id: UserId,
    pub organization_id: OrgId,
    pub content: MessageContent,
    pub created_at: Timestamp,
    pub edited_at: Option<Timestamp>,
}

impl ChannelMessage {
    pub fn new(
        id: MessageId,
        channel_id: ChannelId,
        channel_type: ChannelType,
        sender_id: UserId,
        organization_id: OrgId,
        content: MessageContent,
        created_at: Timestamp,
    ) -> Result<Self, DomainError> {
        if !channel_type.is_persistent() {
            return Err(DomainError::invalid_argument(
                "channel_type",
                "channel messages require an organization or project channel",
            ));
        }
        Ok(Self {
            id,
            channel_id,
            channel_type,
            sender_id,
            organization_id,
            content,
            created_at,
            edited_at: None,
        })
    }

    /// 只有内容和编辑时间可变
    pub fn edit(&mut self, content: MessageContent, at: Timestamp) {
        self.content = content;
        self.edited_at = Some(at);
    }

    pub fn cursor(&self) -> MessageCursor {
        MessageCursor {
            created_at: self.created_at,
            id: self.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessage {
    pub id: MessageId,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub content: MessageContent,
    pub read_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl DirectMessage {
    pub fn new(
        id: MessageId,
        sender_id: UserId,
        recipient_id: UserId,
        content: MessageContent,
        created_at: Timestamp,
    ) -> Result<Self, DomainError> {
        if sender_id == recipient_id {
            return Err(DomainError::invalid_argument(
                "recipient_id",
                "cannot send a direct message to yourself",
            ));
        }
        Ok(Self {
            id,
            sender_id,
            recipient_id,
            content,
            read_at: None,
            created_at,
        })
    }

    /// 是否属于 (a, b) 这一对用户之间的会话（无方向）
    pub fn is_between(&self, a: UserId, b: UserId) -> bool {
        (self.sender_id == a && self.recipient_id == b)
            || (self.sender_id == b && self.recipient_id == a)
    }

    pub fn cursor(&self) -> MessageCursor {
        MessageCursor {
            created_at: self.created_at,
            id: self.id,
        }
    }
}

/// 按 (created_at, id) 倒序翻页的游标，返回严格早于游标的记录
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageCursor {
    pub created_at: Timestamp,
    pub id: MessageId,
}

impl MessageCursor {
    /// 记录 (created_at, id) 是否排在游标之后（即更旧）
    pub fn precedes(&self, created_at: Timestamp, id: MessageId) -> bool {
        (created_at, id) < (self.created_at, self.id)
    }
}

/// 删除前抓取的最小摘要，用于写入审计日志
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSummary {
    pub id: MessageId,
    pub kind: MessageKind,
    pub organization_id: Option<OrgId>,
    pub channel_type: Option<ChannelType>,
    pub preview: String,
}

impl From<&ChannelMessage> for MessageSummary {
    fn from(message: &ChannelMessage) -> Self {
        Self {
            id: message.id,
            kind: MessageKind::Channel,
            organization_id: Some(message.organization_id),
            channel_type: Some(message.channel_type),
            preview: message.content.preview(MessageSummary::PREVIEW_CHARS),
        }
    }
}

impl From<&DirectMessage> for MessageSummary {
    fn from(message: &DirectMessage) -> Self {
        Self {
            id: message.id,
            kind: MessageKind::Direct,
            organization_id: None,
            channel_type: None,
            preview: message.content.preview(MessageSummary::PREVIEW_CHARS),
        }
    }
}

impl MessageSummary {
    pub const PREVIEW_CHARS: usize = 100;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    #[test]
    fn cursor_orders_by_time_then_id() {
        let now = Utc::now();
        let cursor = MessageCursor {
            created_at: now,
            id: MessageId::from(Uuid::from_u128(5)),
        };
        assert!(cursor.precedes(now - Duration::seconds(1), MessageId::from(Uuid::from_u128(9))));
        assert!(cursor.precedes(now, MessageId::from(Uuid::from_u128(4))));
        assert!(!cursor.precedes(now, MessageId::from(Uuid::from_u128(5))));
    }

    #[test]
    fn cannot_message_self() {
        let user = UserId::generate();
        let content = MessageContent::new("hi").unwrap();
        assert!(DirectMessage::new(MessageId::generate(), user, user, content, Utc::now()).is_err());
    }
}
