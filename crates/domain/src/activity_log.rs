use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::errors::DomainError;
use crate::value_objects::{ActivityLogId, OrgId, Timestamp, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    MessageDeleted,
    DirectMessageDeleted,
    ChannelDeleted,
    NotificationsBroadcast,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::MessageDeleted => "message_deleted",
            ActivityAction::DirectMessageDeleted => "direct_message_deleted",
            ActivityAction::ChannelDeleted => "channel_deleted",
            ActivityAction::NotificationsBroadcast => "notifications_broadcast",
        }
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityAction {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "message_deleted" => Ok(ActivityAction::MessageDeleted),
            "direct_message_deleted" => Ok(ActivityAction::DirectMessageDeleted),
            "channel_deleted" => Ok(ActivityAction::ChannelDeleted),
            "notifications_broadcast" => Ok(ActivityAction::NotificationsBroadcast),
            _ => Err(DomainError::unknown_variant("activity_action", value)),
        }
    }
}

/// 仅追加的审计记录，写入后不更新也不删除
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogEntry {
    pub id: ActivityLogId,
    pub actor_user_id: UserId,
    pub organization_id: OrgId,
    pub action: ActivityAction,
    pub description: String,
    pub metadata: JsonValue,
    pub created_at: Timestamp,
}

impl ActivityLogEntry {
    pub fn new(
        actor_user_id: UserId,
        organization_id: OrgId,
        action: ActivityAction,
        description: impl Into<String>,
        metadata: JsonValue,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: ActivityLogId::generate(),
            actor_user_id,
            organization_id,
            action,
            description: description.into(),
            metadata,
            created_at,
        }
    }
}
