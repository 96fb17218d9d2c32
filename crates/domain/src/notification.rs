//! 通知实体
//!
//! 一个逻辑事件发给 N 个接收者时，会产生 N 条彼此独立的通知记录。

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::errors::DomainError;
use crate::membership::OrgRole;
use crate::value_objects::{NotificationId, OrgId, Timestamp, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Info,
    Success,
    Warning,
    Error,
    Message,
    Mention,
    Assignment,
    System,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Info => "info",
            NotificationType::Success => "success",
            NotificationType::Warning => "warning",
            NotificationType::Error => "error",
            NotificationType::Message => "message",
            NotificationType::Mention => "mention",
            NotificationType::Assignment => "assignment",
            NotificationType::System => "system",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "info" => Ok(NotificationType::Info),
            "success" => Ok(NotificationType::Success),
            "warning" => Ok(NotificationType::Warning),
            "error" => Ok(NotificationType::Error),
            "message" => Ok(NotificationType::Message),
            "mention" => Ok(NotificationType::Mention),
            "assignment" => Ok(NotificationType::Assignment),
            "system" => Ok(NotificationType::System),
            _ => Err(DomainError::unknown_variant("notification_type", value)),
        }
    }
}

/// 已校验的通知内容，批量发送时所有接收者共享同一份
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub metadata: JsonValue,
}

impl NotificationDraft {
    pub const MAX_TITLE_CHARS: usize = 200;
    pub const MAX_MESSAGE_CHARS: usize = 1000;

    pub fn new(
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
        link: Option<String>,
        metadata: Option<JsonValue>,
    ) -> Result<Self, DomainError> {
        let title = Self::validate_text("title", title.into(), Self::MAX_TITLE_CHARS)?;
        let message = Self::validate_text("message", message.into(), Self::MAX_MESSAGE_CHARS)?;
        let link = link
            .map(|link| link.trim().to_owned())
            .filter(|link| !link.is_empty());
        let metadata = match metadata {
            None | Some(JsonValue::Null) => JsonValue::Object(Default::default()),
            Some(value @ JsonValue::Object(_)) => value,
            Some(_) => {
                return Err(DomainError::invalid_argument(
                    "metadata",
                    "must be a JSON object",
                ))
            }
        };

        Ok(Self {
            notification_type,
            title,
            message,
            link,
            metadata,
        })
    }

    fn validate_text(field: &str, value: String, max: usize) -> Result<String, DomainError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_argument(field, "cannot be empty"));
        }
        if trimmed.chars().count() > max {
            return Err(DomainError::invalid_argument(
                field,
                format!("cannot exceed {max} characters"),
            ));
        }
        Ok(trimmed.to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub organization_id: OrgId,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub metadata: JsonValue,
    pub read_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl Notification {
    pub fn for_recipient(
        draft: &NotificationDraft,
        user_id: UserId,
        organization_id: OrgId,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: NotificationId::generate(),
            user_id,
            organization_id,
            notification_type: draft.notification_type,
            title: draft.title.clone(),
            message: draft.message.clone(),
            link: draft.link.clone(),
            metadata: draft.metadata.clone(),
            read_at: None,
            created_at,
        }
    }

    pub fn is_unread(&self) -> bool {
        self.read_at.is_none()
    }

    /// 幂等：已读的通知保留第一次的 read_at，返回是否发生了变化
    pub fn mark_read(&mut self, now: Timestamp) -> bool {
        if self.read_at.is_some() {
            return false;
        }
        self.read_at = Some(now);
        true
    }
}

/// 接收者描述，发送前统一解析为具体的用户列表
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientSpec {
    /// 组织全部成员
    All,
    /// 组织内指定角色的成员
    Role(OrgRole),
    /// 指定用户（仍限于组织成员）
    SpecificUsers(Vec<UserId>),
}

/// 通知列表查询条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationQuery {
    pub user_id: UserId,
    pub organization_id: Option<OrgId>,
    pub unread_only: bool,
    pub limit: u32,
    pub offset: u32,
}

impl NotificationQuery {
    /// 查询条件是否命中该通知（不考虑分页）
    pub fn matches(&self, notification: &Notification) -> bool {
        notification.user_id == self.user_id
            && self
                .organization_id
                .map_or(true, |org| notification.organization_id == org)
            && (!self.unread_only || notification.is_unread())
    }
}

/// 分页结果：`total` 为命中条件的总数，`unread_count` 为 (用户, 组织) 范围内未读总数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    pub unread_count: u64,
    pub total: u64,
}
