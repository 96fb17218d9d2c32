//! 通知扇出服务
//!
//! 批量发送先把接收者描述解析为去重后的用户列表，再一次性写入；
//! 写入失败时不会留下任何部分结果。

use std::{collections::HashSet, sync::Arc};

use domain::{
    ActivityAction, DomainError, Notification, NotificationDraft, NotificationId,
    NotificationPage, NotificationQuery, NotificationType, OrgId, RecipientSpec, RoleRequirement,
    UserId,
};
use serde_json::{json, Value as JsonValue};

use crate::{
    access::{AccessGate, Caller},
    audit::ActivityAuditLog,
    clock::Clock,
    error::ApplicationError,
    repository::{MembershipRepository, NotificationRepository},
};

pub const DEFAULT_NOTIFICATION_LIMIT: u32 = 20;
pub const MAX_NOTIFICATION_LIMIT: u32 = 100;

pub struct NotificationServiceDependencies {
    pub gate: Arc<AccessGate>,
    pub memberships: Arc<dyn MembershipRepository>,
    pub repository: Arc<dyn NotificationRepository>,
    pub audit: Arc<ActivityAuditLog>,
    pub clock: Arc<dyn Clock>,
}

/// 未校验的通知内容
#[derive(Debug, Clone)]
pub struct NotificationPayload {
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub metadata: Option<JsonValue>,
}

impl NotificationPayload {
    fn into_draft(self) -> Result<NotificationDraft, DomainError> {
        NotificationDraft::new(
            self.notification_type,
            self.title,
            self.message,
            self.link,
            self.metadata,
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListNotificationsRequest {
    pub organization_id: Option<OrgId>,
    pub unread_only: bool,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// 列表结果以及实际生效的分页参数
#[derive(Debug, Clone)]
pub struct NotificationListing {
    pub page: NotificationPage,
    pub limit: u32,
    pub offset: u32,
}

pub struct NotificationService {
    deps: NotificationServiceDependencies,
}

impl NotificationService {
    pub fn new(deps: NotificationServiceDependencies) -> Self {
        Self { deps }
    }

    /// 调用者和接收者都必须是该组织成员
    pub async fn create(
        &self,
        caller: Caller,
        recipient_id: UserId,
        organization_id: OrgId,
        payload: NotificationPayload,
    ) -> Result<Notification, ApplicationError> {
        self.deps
            .gate
            .authorize(caller, organization_id, RoleRequirement::Any)
            .await?;
        let draft = payload.into_draft()?;

        if self
            .deps
            .memberships
            .find(recipient_id, organization_id)
            .await?
            .is_none()
        {
            return Err(DomainError::invalid_argument(
                "userId",
                "recipient is not a member of this organization",
            )
            .into());
        }

        let notification =
            Notification::for_recipient(&draft, recipient_id, organization_id, self.deps.clock.now());
        Ok(self.deps.repository.create(notification).await?)
    }

    /// 批量发送，仅 ADMIN/OWNER。全部成功或全部失败
    pub async fn bulk_create(
        &self,
        caller: Caller,
        organization_id: OrgId,
        payload: NotificationPayload,
        recipients: RecipientSpec,
    ) -> Result<Vec<Notification>, ApplicationError> {
        let membership = self
            .deps
            .gate
            .authorize(caller, organization_id, RoleRequirement::AdminOrOwner)
            .await?;
        let draft = payload.into_draft()?;

        let recipient_kind = match &recipients {
            RecipientSpec::All => "all",
            RecipientSpec::Role(_) => "role",
            RecipientSpec::SpecificUsers(_) => "specific_users",
        };
        let user_ids = self.resolve_recipients(organization_id, recipients).await?;
        if user_ids.is_empty() {
            return Err(DomainError::invalid_argument("recipients", "no recipients resolved").into());
        }

        let now = self.deps.clock.now();
        let rows: Vec<Notification> = user_ids
            .iter()
            .map(|user_id| Notification::for_recipient(&draft, *user_id, organization_id, now))
            .collect();

        let created = self
            .deps
            .repository
            .create_batch(rows)
            .await
            .map_err(|err| {
                tracing::error!(
                    organization_id = %organization_id,
                    recipients = user_ids.len(),
                    error = %err,
                    "批量通知写入失败，已整体回滚"
                );
                ApplicationError::from(err)
            })?;

        tracing::info!(
            organization_id = %organization_id,
            created = created.len(),
            "批量通知已发送"
        );
        self.deps
            .audit
            .record(
                membership.user_id,
                organization_id,
                ActivityAction::NotificationsBroadcast,
                format!(
                    "Sent notification \"{}\" to {} recipients",
                    draft.title,
                    created.len()
                ),
                json!({
                    "type": draft.notification_type.as_str(),
                    "recipients": recipient_kind,
                    "count": created.len(),
                }),
            )
            .await;

        Ok(created)
    }

    /// 解析为组织成员的用户列表，保持首次出现的顺序并去重
    async fn resolve_recipients(
        &self,
        organization_id: OrgId,
        recipients: RecipientSpec,
    ) -> Result<Vec<UserId>, ApplicationError> {
        let candidates: Vec<UserId> = match recipients {
            RecipientSpec::All => self
                .deps
                .memberships
                .list_members(organization_id, None)
                .await?
                .into_iter()
                .map(|m| m.user_id)
                .collect(),
            RecipientSpec::Role(role) => self
                .deps
                .memberships
                .list_members(organization_id, Some(role))
                .await?
                .into_iter()
                .map(|m| m.user_id)
                .collect(),
            RecipientSpec::SpecificUsers(user_ids) => {
                let members: HashSet<UserId> = self
                    .deps
                    .memberships
                    .list_members(organization_id, None)
                    .await?
                    .into_iter()
                    .map(|m| m.user_id)
                    .collect();
                user_ids
                    .into_iter()
                    .filter(|user_id| members.contains(user_id))
                    .collect()
            }
        };

        let mut seen = HashSet::new();
        Ok(candidates
            .into_iter()
            .filter(|user_id| seen.insert(*user_id))
            .collect())
    }

    pub async fn list(
        &self,
        caller: Caller,
        request: ListNotificationsRequest,
    ) -> Result<NotificationListing, ApplicationError> {
        let user_id = caller.user_id()?;
        if let Some(org) = request.organization_id {
            self.deps
                .gate
                .authorize(caller, org, RoleRequirement::Any)
                .await?;
        }

        let limit = request
            .limit
            .unwrap_or(DEFAULT_NOTIFICATION_LIMIT)
            .clamp(1, MAX_NOTIFICATION_LIMIT);
        let offset = request.offset.unwrap_or(0);
        let page = self
            .deps
            .repository
            .list(NotificationQuery {
                user_id,
                organization_id: request.organization_id,
                unread_only: request.unread_only,
                limit,
                offset,
            })
            .await?;

        Ok(NotificationListing {
            page,
            limit,
            offset,
        })
    }

    /// 幂等；不存在或不属于调用者时返回 NotFound
    pub async fn mark_read(
        &self,
        caller: Caller,
        id: NotificationId,
    ) -> Result<Notification, ApplicationError> {
        let user_id = caller.user_id()?;
        self.deps
            .repository
            .mark_read(id, user_id, self.deps.clock.now())
            .await?
            .ok_or_else(|| ApplicationError::not_found("notification not found"))
    }

    pub async fn mark_all_read(
        &self,
        caller: Caller,
        organization_id: Option<OrgId>,
    ) -> Result<u64, ApplicationError> {
        let user_id = caller.user_id()?;
        Ok(self
            .deps
            .repository
            .mark_all_read(user_id, organization_id, self.deps.clock.now())
            .await?)
    }

    pub async fn delete(&self, caller: Caller, id: NotificationId) -> Result<(), ApplicationError> {
        let user_id = caller.user_id()?;
        if !self.deps.repository.delete(id, user_id).await? {
            return Err(ApplicationError::not_found("notification not found"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::ManualClock, memory::MemoryStore, repository::MockNotificationRepository};
    use chrono::Duration;
    use domain::{OrgRole, RepositoryError};

    struct Fixture {
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        service: NotificationService,
        org: OrgId,
        admin: UserId,
        members: Vec<UserId>,
    }

    async fn fixture_with(repository: Option<MockNotificationRepository>) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::default());
        let org = OrgId::generate();
        let admin = UserId::generate();
        store.add_membership(admin, org, OrgRole::Admin).await;
        let mut members = vec![admin];
        for role in [OrgRole::Owner, OrgRole::Manager, OrgRole::Consultant, OrgRole::Client] {
            let user = UserId::generate();
            store.add_membership(user, org, role).await;
            members.push(user);
        }

        let gate = Arc::new(AccessGate::new(store.clone()));
        let audit = Arc::new(ActivityAuditLog::new(store.clone(), gate.clone(), clock.clone()));
        let repository: Arc<dyn NotificationRepository> = match repository {
            Some(mock) => Arc::new(mock),
            None => store.clone(),
        };
        let service = NotificationService::new(NotificationServiceDependencies {
            gate,
            memberships: store.clone(),
            repository,
            audit,
            clock: clock.clone(),
        });

        Fixture {
            store,
            clock,
            service,
            org,
            admin,
            members,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(None).await
    }

    fn payload(title: &str) -> NotificationPayload {
        NotificationPayload {
            notification_type: NotificationType::System,
            title: title.into(),
            message: "Scheduled maintenance tonight".into(),
            link: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn broadcast_reaches_every_member() {
        let f = fixture().await;

        let created = f
            .service
            .bulk_create(Caller::User(f.admin), f.org, payload("Maintenance"), RecipientSpec::All)
            .await
            .unwrap();
        assert_eq!(created.len(), 5);
        assert!(created.iter().all(|n| n.is_unread() && n.title == "Maintenance"));

        for member in &f.members {
            let listing = f
                .service
                .list(
                    Caller::User(*member),
                    ListNotificationsRequest {
                        unread_only: true,
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            assert_eq!(listing.page.notifications.len(), 1);
            assert_eq!(listing.page.unread_count, 1);
            assert_eq!(listing.page.total, 1);
        }

        let entries = f.store.activity_entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, ActivityAction::NotificationsBroadcast);
    }

    #[tokio::test]
    async fn broadcast_requires_admin_or_owner() {
        let f = fixture().await;
        let manager = f.members[2];

        let result = f
            .service
            .bulk_create(Caller::User(manager), f.org, payload("Hi"), RecipientSpec::All)
            .await;
        assert!(matches!(result, Err(ApplicationError::Authorization(_))));
        assert_eq!(f.store.notification_count().await, 0);
    }

    #[tokio::test]
    async fn role_and_specific_recipients_are_resolved_within_org() {
        let f = fixture().await;

        let created = f
            .service
            .bulk_create(
                Caller::User(f.admin),
                f.org,
                payload("Clients"),
                RecipientSpec::Role(OrgRole::Client),
            )
            .await
            .unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].user_id, f.members[4]);

        let outsider = UserId::generate();
        let created = f
            .service
            .bulk_create(
                Caller::User(f.admin),
                f.org,
                payload("Picked"),
                RecipientSpec::SpecificUsers(vec![f.members[1], outsider, f.members[1], f.members[3]]),
            )
            .await
            .unwrap();
        let recipients: Vec<UserId> = created.iter().map(|n| n.user_id).collect();
        assert_eq!(recipients, vec![f.members[1], f.members[3]]);
    }

    #[tokio::test]
    async fn empty_resolution_is_a_validation_error() {
        let f = fixture().await;

        let result = f
            .service
            .bulk_create(
                Caller::User(f.admin),
                f.org,
                payload("Nobody"),
                RecipientSpec::SpecificUsers(vec![UserId::generate()]),
            )
            .await;
        assert!(matches!(result, Err(ApplicationError::Domain(_))));
    }

    #[tokio::test]
    async fn failed_batch_leaves_nothing_behind() {
        let mut repository = MockNotificationRepository::new();
        repository
            .expect_create_batch()
            .times(1)
            .returning(|_| Err(RepositoryError::storage("deadlock detected")));
        let f = fixture_with(Some(repository)).await;

        let result = f
            .service
            .bulk_create(Caller::User(f.admin), f.org, payload("Boom"), RecipientSpec::All)
            .await;
        assert!(matches!(result, Err(ApplicationError::Repository(_))));
        assert_eq!(f.store.notification_count().await, 0);
        assert!(f.store.activity_entries().await.is_empty());
    }

    #[tokio::test]
    async fn mark_read_is_idempotent() {
        let f = fixture().await;
        let recipient = f.members[3];
        let notification = f
            .service
            .create(Caller::User(f.admin), recipient, f.org, payload("Assigned"))
            .await
            .unwrap();

        let first = f
            .service
            .mark_read(Caller::User(recipient), notification.id)
            .await
            .unwrap();
        f.clock.advance(Duration::seconds(30));
        let second = f
            .service
            .mark_read(Caller::User(recipient), notification.id)
            .await
            .unwrap();
        assert!(first.read_at.is_some());
        assert_eq!(first.read_at, second.read_at);

        let by_other = f
            .service
            .mark_read(Caller::User(f.admin), notification.id)
            .await;
        assert!(matches!(by_other, Err(ApplicationError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_is_owner_only() {
        let f = fixture().await;
        let recipient = f.members[1];
        let notification = f
            .service
            .create(Caller::User(f.admin), recipient, f.org, payload("Note"))
            .await
            .unwrap();

        let result = f.service.delete(Caller::User(f.admin), notification.id).await;
        assert!(matches!(result, Err(ApplicationError::NotFound(_))));

        f.service
            .delete(Caller::User(recipient), notification.id)
            .await
            .unwrap();
        let again = f.service.delete(Caller::User(recipient), notification.id).await;
        assert!(matches!(again, Err(ApplicationError::NotFound(_))));
    }

    #[tokio::test]
    async fn create_rejects_outside_recipient() {
        let f = fixture().await;
        let result = f
            .service
            .create(Caller::User(f.admin), UserId::generate(), f.org, payload("Hi"))
            .await;
        assert!(matches!(result, Err(ApplicationError::Domain(_))));
    }

    #[tokio::test]
    async fn mark_all_read_clears_unread_count() {
        let f = fixture().await;
        let recipient = f.members[2];
        for title in ["one", "two", "three"] {
            f.service
                .create(Caller::User(f.admin), recipient, f.org, payload(title))
                .await
                .unwrap();
        }

        let updated = f
            .service
            .mark_all_read(Caller::User(recipient), None)
            .await
            .unwrap();
        assert_eq!(updated, 3);

        let listing = f
            .service
            .list(Caller::User(recipient), ListNotificationsRequest::default())
            .await
            .unwrap();
        assert_eq!(listing.page.unread_count, 0);
        assert_eq!(listing.page.total, 3);
        assert_eq!(listing.limit, DEFAULT_NOTIFICATION_LIMIT);
    }
}
