use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{ChannelId, OrgId, ProjectId, Timestamp};

/// 频道类型。`Direct` 只出现在输入状态上，持久化的频道只有组织频道和项目频道。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Organization,
    Project,
    Direct,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Organization => "organization",
            ChannelType::Project => "project",
            ChannelType::Direct => "direct",
        }
    }

    /// 是否为可持久化的频道类型
    pub fn is_persistent(&self) -> bool {
        !matches!(self, ChannelType::Direct)
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "organization" => Ok(ChannelType::Organization),
            "project" => Ok(ChannelType::Project),
            "direct" => Ok(ChannelType::Direct),
            _ => Err(DomainError::unknown_variant("channel_type", value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: ChannelId,
    pub channel_type: ChannelType,
    pub organization_id: OrgId,
    pub project_id: Option<ProjectId>,
    pub name: String,
    pub created_at: Timestamp,
}

impl Channel {
    pub fn new(
        id: ChannelId,
        channel_type: ChannelType,
        organization_id: OrgId,
        project_id: Option<ProjectId>,
        name: impl Into<String>,
        created_at: Timestamp,
    ) -> Result<Self, DomainError> {
        let name = Self::validate_name(name.into())?;
        match (channel_type, project_id) {
            (ChannelType::Direct, _) => {
                return Err(DomainError::invalid_argument(
                    "channel_type",
                    "direct conversations are not channels",
                ))
            }
            (ChannelType::Project, None) => {
                return Err(DomainError::invalid_argument(
                    "project_id",
                    "required for project channels",
                ))
            }
            (ChannelType::Organization, Some(_)) => {
                return Err(DomainError::invalid_argument(
                    "project_id",
                    "not allowed for organization channels",
                ))
            }
            _ => {}
        }

        Ok(Self {
            id,
            channel_type,
            organization_id,
            project_id,
            name,
            created_at,
        })
    }

    fn validate_name(name: String) -> Result<String, DomainError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_argument("name", "cannot be empty"));
        }
        if trimmed.chars().count() > 80 {
            return Err(DomainError::invalid_argument("name", "too long"));
        }
        Ok(trimmed.to_owned())
    }
}
