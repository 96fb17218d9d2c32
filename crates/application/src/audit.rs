//! 审计日志
//!
//! 记录管理类/破坏性操作。写入是尽力而为的：失败只记日志，不影响外层操作的结果。

use std::sync::Arc;

use domain::{ActivityAction, ActivityLogEntry, OrgId, RoleRequirement, UserId};
use serde_json::Value as JsonValue;

use crate::{
    access::{AccessGate, Caller},
    clock::Clock,
    error::ApplicationError,
    repository::ActivityLogRepository,
};

pub struct ActivityAuditLog {
    repository: Arc<dyn ActivityLogRepository>,
    gate: Arc<AccessGate>,
    clock: Arc<dyn Clock>,
}

impl ActivityAuditLog {
    pub fn new(
        repository: Arc<dyn ActivityLogRepository>,
        gate: Arc<AccessGate>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            gate,
            clock,
        }
    }

    /// 追加一条审计记录，返回是否写入成功
    pub async fn record(
        &self,
        actor: UserId,
        organization_id: OrgId,
        action: ActivityAction,
        description: impl Into<String>,
        metadata: JsonValue,
    ) -> bool {
        let entry = ActivityLogEntry::new(
            actor,
            organization_id,
            action,
            description,
            metadata,
            self.clock.now(),
        );
        let entry_id = entry.id;

        match self.repository.append(entry).await {
            Ok(()) => {
                tracing::info!(
                    entry_id = %entry_id,
                    actor = %actor,
                    organization_id = %organization_id,
                    action = %action,
                    "审计日志已记录"
                );
                true
            }
            Err(err) => {
                tracing::warn!(
                    actor = %actor,
                    organization_id = %organization_id,
                    action = %action,
                    error = %err,
                    "审计日志写入失败，操作本身已生效"
                );
                false
            }
        }
    }

    /// 组织最近的审计记录，仅 ADMIN/OWNER 可见
    pub async fn recent(
        &self,
        caller: Caller,
        organization_id: OrgId,
        limit: u32,
    ) -> Result<Vec<ActivityLogEntry>, ApplicationError> {
        self.gate
            .authorize(caller, organization_id, RoleRequirement::AdminOrOwner)
            .await?;
        let limit = limit.clamp(1, 200);
        Ok(self
            .repository
            .list_by_organization(organization_id, limit)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::SystemClock, memory::MemoryStore, repository::MockActivityLogRepository};
    use domain::RepositoryError;

    #[tokio::test]
    async fn failed_write_is_swallowed() {
        let mut repository = MockActivityLogRepository::new();
        repository
            .expect_append()
            .times(1)
            .returning(|_| Err(RepositoryError::storage("disk full")));

        let gate = Arc::new(AccessGate::new(Arc::new(MemoryStore::new())));
        let audit = ActivityAuditLog::new(Arc::new(repository), gate, Arc::new(SystemClock));

        let written = audit
            .record(
                UserId::generate(),
                OrgId::generate(),
                ActivityAction::ChannelDeleted,
                "Deleted channel general",
                serde_json::json!({}),
            )
            .await;
        assert!(!written);
    }
}
