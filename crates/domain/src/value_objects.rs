use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

/// 统一的时间戳类型。
pub type Timestamp = DateTime<Utc>;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new(id: Uuid) -> Self {
                Self(id)
            }

            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

uuid_id!(
    /// 用户唯一标识。
    UserId
);
uuid_id!(
    /// 组织（租户）唯一标识。
    OrgId
);
uuid_id!(
    /// 项目唯一标识。
    ProjectId
);
uuid_id!(
    /// 频道唯一标识。
    ChannelId
);
uuid_id!(
    /// 消息唯一标识（频道消息与私信共用）。
    MessageId
);
uuid_id!(
    /// 通知唯一标识。
    NotificationId
);
uuid_id!(
    /// 审计日志唯一标识。
    ActivityLogId
);

/// 经过验证的消息内容：去除首尾空白后 1..=5000 个字符。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageContent(String);

impl MessageContent {
    pub const MAX_CHARS: usize = 5000;

    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_argument("content", "cannot be empty"));
        }
        if trimmed.chars().count() > Self::MAX_CHARS {
            return Err(DomainError::invalid_argument(
                "content",
                format!("cannot exceed {} characters", Self::MAX_CHARS),
            ));
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 截取前 `max_chars` 个字符作为审计摘要。
    pub fn preview(&self, max_chars: usize) -> String {
        preview(&self.0, max_chars)
    }
}

impl TryFrom<String> for MessageContent {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MessageContent> for String {
    fn from(value: MessageContent) -> Self {
        value.0
    }
}

impl fmt::Display for MessageContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 按字符（而非字节）截断，超出部分以省略号结尾。
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_is_trimmed() {
        let content = MessageContent::new("  hello  ").unwrap();
        assert_eq!(content.as_str(), "hello");
    }

    #[test]
    fn blank_content_is_rejected() {
        assert!(MessageContent::new("   \n\t").is_err());
        assert!(MessageContent::new("").is_err());
    }

    #[test]
    fn content_limit_counts_characters() {
        let exact = "é".repeat(MessageContent::MAX_CHARS);
        assert!(MessageContent::new(exact).is_ok());

        let over = "a".repeat(MessageContent::MAX_CHARS + 1);
        assert!(MessageContent::new(over).is_err());
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(preview("你好世界", 2), "你好…");
        assert_eq!(preview("short", 10), "short");
    }
}
