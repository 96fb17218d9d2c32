use std::{collections::HashMap, sync::Arc};

use chrono::Duration;
use domain::{
    resolve_status, OrgId, PresenceRecord, PresenceStatus, RoleRequirement, Timestamp, UserId,
};
use serde::Serialize;

use crate::{
    access::{AccessGate, Caller},
    clock::Clock,
    error::ApplicationError,
    repository::{MembershipRepository, PresenceRepository},
};

/// 心跳周期 60 秒，阈值取两倍
pub const DEFAULT_PRESENCE_STALE_SECS: i64 = 120;

pub struct PresenceServiceDependencies {
    pub gate: Arc<AccessGate>,
    pub memberships: Arc<dyn MembershipRepository>,
    pub repository: Arc<dyn PresenceRepository>,
    pub clock: Arc<dyn Clock>,
    pub stale_threshold: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberPresence {
    pub user_id: UserId,
    pub status: PresenceStatus,
    pub last_seen: Option<Timestamp>,
}

pub struct PresenceService {
    deps: PresenceServiceDependencies,
}

impl PresenceService {
    pub fn new(deps: PresenceServiceDependencies) -> Self {
        Self { deps }
    }

    /// 无条件覆盖 last_seen，不做任何调度
    pub async fn heartbeat(&self, caller: Caller) -> Result<PresenceRecord, ApplicationError> {
        let user_id = caller.user_id()?;
        let record = PresenceRecord::heartbeat(user_id, self.deps.clock.now());
        self.deps.repository.upsert(record.clone()).await?;
        tracing::trace!(user_id = %user_id, "心跳已记录");
        Ok(record)
    }

    pub async fn status_of(&self, user_id: UserId) -> Result<MemberPresence, ApplicationError> {
        let record = self.deps.repository.find(user_id).await?;
        Ok(self.resolve(user_id, record.as_ref(), self.deps.clock.now()))
    }

    /// 组织全部成员的在线状态，没有心跳记录的成员视为离线
    pub async fn organization_presence(
        &self,
        caller: Caller,
        organization_id: OrgId,
    ) -> Result<Vec<MemberPresence>, ApplicationError> {
        self.deps
            .gate
            .authorize(caller, organization_id, RoleRequirement::Any)
            .await?;

        let members = self
            .deps
            .memberships
            .list_members(organization_id, None)
            .await?;
        let user_ids: Vec<UserId> = members.iter().map(|m| m.user_id).collect();
        let records: HashMap<UserId, PresenceRecord> = self
            .deps
            .repository
            .find_many(&user_ids)
            .await?
            .into_iter()
            .map(|record| (record.user_id, record))
            .collect();

        let as_of = self.deps.clock.now();
        Ok(user_ids
            .into_iter()
            .map(|user_id| self.resolve(user_id, records.get(&user_id), as_of))
            .collect())
    }

    fn resolve(
        &self,
        user_id: UserId,
        record: Option<&PresenceRecord>,
        as_of: Timestamp,
    ) -> MemberPresence {
        match record {
            Some(record) => MemberPresence {
                user_id,
                status: resolve_status(record, as_of, self.deps.stale_threshold),
                last_seen: Some(record.last_seen),
            },
            None => MemberPresence {
                user_id,
                status: PresenceStatus::Offline,
                last_seen: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::ManualClock, memory::MemoryStore};
    use domain::OrgRole;

    #[tokio::test]
    async fn presence_goes_stale_without_heartbeat() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::default());
        let org = OrgId::generate();
        let alice = UserId::generate();
        let bob = UserId::generate();
        store.add_membership(alice, org, OrgRole::Manager).await;
        store.add_membership(bob, org, OrgRole::Client).await;

        let service = PresenceService::new(PresenceServiceDependencies {
            gate: Arc::new(AccessGate::new(store.clone())),
            memberships: store.clone(),
            repository: store.clone(),
            clock: clock.clone(),
            stale_threshold: Duration::seconds(DEFAULT_PRESENCE_STALE_SECS),
        });

        service.heartbeat(Caller::User(alice)).await.unwrap();
        let users = service
            .organization_presence(Caller::User(bob), org)
            .await
            .unwrap();
        let status: HashMap<_, _> = users.iter().map(|u| (u.user_id, u.status)).collect();
        assert_eq!(status[&alice], PresenceStatus::Online);
        assert_eq!(status[&bob], PresenceStatus::Offline);

        clock.advance(Duration::seconds(DEFAULT_PRESENCE_STALE_SECS));
        assert_eq!(
            service.status_of(alice).await.unwrap().status,
            PresenceStatus::Offline
        );
    }

    #[tokio::test]
    async fn outsiders_cannot_list_presence() {
        let store = Arc::new(MemoryStore::new());
        let service = PresenceService::new(PresenceServiceDependencies {
            gate: Arc::new(AccessGate::new(store.clone())),
            memberships: store.clone(),
            repository: store,
            clock: Arc::new(ManualClock::default()),
            stale_threshold: Duration::seconds(DEFAULT_PRESENCE_STALE_SECS),
        });

        let result = service
            .organization_presence(Caller::User(UserId::generate()), OrgId::generate())
            .await;
        assert!(matches!(result, Err(ApplicationError::Authorization(_))));
    }
}
