//! 访问控制
//!
//! 所有对外操作都先经过 `AccessGate`：解析调用者身份，再校验租户成员关系与角色。
//! 各服务自身不再实现任何鉴权逻辑。

use std::sync::Arc;

use domain::{Membership, OrgId, RoleRequirement, UserId};

use crate::{error::ApplicationError, repository::MembershipRepository};

/// 请求调用者，由 Web 层的认证提供者解析得到
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    Anonymous,
    User(UserId),
}

impl Caller {
    pub fn user_id(&self) -> Result<UserId, ApplicationError> {
        match self {
            Caller::User(user_id) => Ok(*user_id),
            Caller::Anonymous => Err(ApplicationError::Authentication),
        }
    }
}

impl From<Option<UserId>> for Caller {
    fn from(value: Option<UserId>) -> Self {
        value.map_or(Caller::Anonymous, Caller::User)
    }
}

pub struct AccessGate {
    memberships: Arc<dyn MembershipRepository>,
}

impl AccessGate {
    pub fn new(memberships: Arc<dyn MembershipRepository>) -> Self {
        Self { memberships }
    }

    /// 校验调用者是 `organization_id` 的成员且角色满足要求
    pub async fn authorize(
        &self,
        caller: Caller,
        organization_id: OrgId,
        required: RoleRequirement,
    ) -> Result<Membership, ApplicationError> {
        let user_id = caller.user_id()?;
        let membership = self
            .memberships
            .find(user_id, organization_id)
            .await?
            .ok_or_else(|| {
                tracing::debug!(user_id = %user_id, organization_id = %organization_id, "非组织成员");
                ApplicationError::authorization("not a member of this organization")
            })?;

        if !membership.satisfies(required) {
            tracing::debug!(
                user_id = %user_id,
                organization_id = %organization_id,
                role = %membership.role,
                required = ?required,
                "角色不足"
            );
            return Err(ApplicationError::authorization("insufficient role"));
        }

        Ok(membership)
    }

    /// 调用者在任一组织中拥有满足要求的角色即可，返回第一条满足的成员关系
    pub async fn authorize_any(
        &self,
        caller: Caller,
        required: RoleRequirement,
    ) -> Result<Membership, ApplicationError> {
        let user_id = caller.user_id()?;
        self.memberships
            .list_for_user(user_id)
            .await?
            .into_iter()
            .find(|membership| membership.satisfies(required))
            .ok_or_else(|| ApplicationError::authorization("insufficient role"))
    }

    /// 调用者的默认组织（最早加入的那个）
    pub async fn primary_membership(&self, caller: Caller) -> Result<Membership, ApplicationError> {
        let user_id = caller.user_id()?;
        self.memberships
            .list_for_user(user_id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApplicationError::authorization("no organization"))
    }

    /// 私信双方必须至少同属一个组织
    pub async fn authorize_shared(
        &self,
        caller: Caller,
        other: UserId,
    ) -> Result<OrgId, ApplicationError> {
        let user_id = caller.user_id()?;
        let mine = self.memberships.list_for_user(user_id).await?;
        let theirs = self.memberships.list_for_user(other).await?;

        mine.iter()
            .map(|membership| membership.organization_id)
            .find(|org| theirs.iter().any(|m| m.organization_id == *org))
            .ok_or_else(|| ApplicationError::authorization("no shared organization"))
    }

    /// 调用者须在某个组织中满足角色要求，且 `parties` 全部是该组织成员
    pub async fn authorize_over(
        &self,
        caller: Caller,
        parties: &[UserId],
        required: RoleRequirement,
    ) -> Result<Membership, ApplicationError> {
        let user_id = caller.user_id()?;
        for membership in self.memberships.list_for_user(user_id).await? {
            if !membership.satisfies(required) {
                continue;
            }
            let mut covers_all = true;
            for party in parties {
                if self
                    .memberships
                    .find(*party, membership.organization_id)
                    .await?
                    .is_none()
                {
                    covers_all = false;
                    break;
                }
            }
            if covers_all {
                return Ok(membership);
            }
        }
        tracing::debug!(user_id = %user_id, "调用者无权管理这些用户");
        Err(ApplicationError::authorization(
            "not an administrator of the participants' organization",
        ))
    }
}
