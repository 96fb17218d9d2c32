use std::{fmt, str::FromStr};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{Timestamp, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

impl PresenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceStatus::Online => "online",
            PresenceStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresenceStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "online" => Ok(PresenceStatus::Online),
            "offline" => Ok(PresenceStatus::Offline),
            _ => Err(DomainError::unknown_variant("presence_status", value)),
        }
    }
}

/// 每个用户一行，只会被本人的心跳覆盖，从不删除
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub user_id: UserId,
    pub last_seen: Timestamp,
    pub status: PresenceStatus,
}

impl PresenceRecord {
    pub fn heartbeat(user_id: UserId, now: Timestamp) -> Self {
        Self {
            user_id,
            last_seen: now,
            status: PresenceStatus::Online,
        }
    }
}

/// 在线状态只在读取时推导，不存在“下线”写入
pub fn resolve_status(
    record: &PresenceRecord,
    as_of: Timestamp,
    stale_threshold: Duration,
) -> PresenceStatus {
    if as_of - record.last_seen < stale_threshold {
        PresenceStatus::Online
    } else {
        PresenceStatus::Offline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn recent_heartbeat_is_online() {
        let now = Utc::now();
        let record = PresenceRecord::heartbeat(UserId::generate(), now - Duration::seconds(30));
        assert_eq!(
            resolve_status(&record, now, Duration::seconds(120)),
            PresenceStatus::Online
        );
    }

    #[test]
    fn stale_heartbeat_is_offline_even_if_stored_online() {
        let now = Utc::now();
        let record = PresenceRecord::heartbeat(UserId::generate(), now - Duration::seconds(120));
        assert_eq!(record.status, PresenceStatus::Online);
        assert_eq!(
            resolve_status(&record, now, Duration::seconds(120)),
            PresenceStatus::Offline
        );
    }
}
