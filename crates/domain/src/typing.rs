use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::channel::ChannelType;
use crate::value_objects::{ChannelId, OrgId, Timestamp, UserId};

/// 输入状态的唯一键，同一键在任意时刻至多一行
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingKey {
    pub channel_id: ChannelId,
    pub channel_type: ChannelType,
    pub user_id: UserId,
}

/// 短暂的“正在输入”标记
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingIndicator {
    pub channel_id: ChannelId,
    pub channel_type: ChannelType,
    pub user_id: UserId,
    pub organization_id: OrgId,
    pub updated_at: Timestamp,
}

impl TypingIndicator {
    pub fn new(key: TypingKey, organization_id: OrgId, updated_at: Timestamp) -> Self {
        Self {
            channel_id: key.channel_id,
            channel_type: key.channel_type,
            user_id: key.user_id,
            organization_id,
            updated_at,
        }
    }

    pub fn key(&self) -> TypingKey {
        TypingKey {
            channel_id: self.channel_id,
            channel_type: self.channel_type,
            user_id: self.user_id,
        }
    }

    /// 在 `as_of` 时刻、窗口 `window` 内是否仍然有效
    pub fn is_active(&self, as_of: Timestamp, window: Duration) -> bool {
        as_of - self.updated_at <= window
    }
}
