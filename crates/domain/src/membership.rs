use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{OrgId, Timestamp, UserId};

/// 组织内角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrgRole {
    Admin,
    Owner,
    Manager,
    Consultant,
    Client,
}

impl OrgRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrgRole::Admin => "ADMIN",
            OrgRole::Owner => "OWNER",
            OrgRole::Manager => "MANAGER",
            OrgRole::Consultant => "CONSULTANT",
            OrgRole::Client => "CLIENT",
        }
    }
}

impl fmt::Display for OrgRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrgRole {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(OrgRole::Admin),
            "OWNER" => Ok(OrgRole::Owner),
            "MANAGER" => Ok(OrgRole::Manager),
            "CONSULTANT" => Ok(OrgRole::Consultant),
            "CLIENT" => Ok(OrgRole::Client),
            _ => Err(DomainError::unknown_variant("role", value)),
        }
    }
}

/// 操作所需的角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleRequirement {
    /// 任意成员
    Any,
    /// 仅 ADMIN（删除消息）
    AdminOnly,
    /// ADMIN 或 OWNER（删除频道、群发通知）
    AdminOrOwner,
}

impl RoleRequirement {
    pub fn is_satisfied_by(&self, role: OrgRole) -> bool {
        match self {
            RoleRequirement::Any => true,
            RoleRequirement::AdminOnly => role == OrgRole::Admin,
            RoleRequirement::AdminOrOwner => matches!(role, OrgRole::Admin | OrgRole::Owner),
        }
    }
}

/// 用户在组织中的成员关系，(user_id, organization_id) 唯一
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub user_id: UserId,
    pub organization_id: OrgId,
    pub role: OrgRole,
    pub created_at: Timestamp,
}

impl Membership {
    pub fn new(user_id: UserId, organization_id: OrgId, role: OrgRole, created_at: Timestamp) -> Self {
        Self {
            user_id,
            organization_id,
            role,
            created_at,
        }
    }

    pub fn satisfies(&self, requirement: RoleRequirement) -> bool {
        requirement.is_satisfied_by(self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_only_rejects_owner() {
        assert!(RoleRequirement::AdminOnly.is_satisfied_by(OrgRole::Admin));
        assert!(!RoleRequirement::AdminOnly.is_satisfied_by(OrgRole::Owner));
    }

    #[test]
    fn admin_or_owner_rejects_manager() {
        assert!(RoleRequirement::AdminOrOwner.is_satisfied_by(OrgRole::Owner));
        assert!(!RoleRequirement::AdminOrOwner.is_satisfied_by(OrgRole::Manager));
        assert!(!RoleRequirement::AdminOrOwner.is_satisfied_by(OrgRole::Client));
    }

    #[test]
    fn role_parsing_is_case_insensitive() {
        assert_eq!("consultant".parse::<OrgRole>().unwrap(), OrgRole::Consultant);
        assert!("guest".parse::<OrgRole>().is_err());
    }
}
