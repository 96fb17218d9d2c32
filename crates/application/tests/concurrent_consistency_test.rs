//! 并发一致性测试
//!
//! 多个写入者同时操作同一份内存存储时，输入状态、消息分页和通知计数保持一致。

use std::{collections::HashSet, sync::Arc};

use application::{
    services::{ListNotificationsRequest, NotificationPayload},
    AccessGate, ActivityAuditLog, Caller, ManualClock, MemoryStore, MessagingService,
    MessagingServiceDependencies, NotificationService, NotificationServiceDependencies,
    TypingService, TypingServiceDependencies,
};
use chrono::Duration;
use domain::{
    ChannelId, ChannelType, NotificationType, OrgId, OrgRole, RecipientSpec, TypingKey, UserId,
};
use futures::{future::join_all, TryStreamExt};

struct Harness {
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    gate: Arc<AccessGate>,
    audit: Arc<ActivityAuditLog>,
    org: OrgId,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::default());
        let gate = Arc::new(AccessGate::new(store.clone()));
        let audit = Arc::new(ActivityAuditLog::new(store.clone(), gate.clone(), clock.clone()));
        Self {
            store,
            clock,
            gate,
            audit,
            org: OrgId::generate(),
        }
    }

    async fn members(&self, count: usize, role: OrgRole) -> Vec<UserId> {
        let mut users = Vec::with_capacity(count);
        for _ in 0..count {
            let user = UserId::generate();
            self.store.add_membership(user, self.org, role).await;
            users.push(user);
        }
        users
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_typing_keeps_one_row_per_key() {
    let h = Harness::new();
    let users = h.members(8, OrgRole::Consultant).await;
    let channel = ChannelId::generate();
    let service = Arc::new(TypingService::new(TypingServiceDependencies {
        gate: h.gate.clone(),
        repository: h.store.clone(),
        clock: h.clock.clone(),
        window: Duration::seconds(8),
    }));

    let tasks = users.iter().flat_map(|user| {
        let user = *user;
        let org = h.org;
        let service = service.clone();
        (0..20).map(move |_| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .set_typing(Caller::User(user), channel, ChannelType::Project, org, true)
                    .await
            })
        })
    });
    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    for user in &users {
        let key = TypingKey {
            channel_id: channel,
            channel_type: ChannelType::Project,
            user_id: *user,
        };
        assert_eq!(h.store.typing_rows(key).await, 1);
    }

    let typers = service
        .list_active_typers(Caller::User(users[0]), channel, ChannelType::Project, h.org, false)
        .await
        .unwrap();
    assert_eq!(typers.len(), users.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_senders_produce_a_consistent_history() {
    let h = Harness::new();
    let admins = h.members(1, OrgRole::Admin).await;
    let senders = h.members(5, OrgRole::Client).await;
    let service = Arc::new(MessagingService::new(MessagingServiceDependencies {
        gate: h.gate.clone(),
        channels: h.store.clone(),
        channel_messages: h.store.clone(),
        direct_messages: h.store.clone(),
        audit: h.audit.clone(),
        clock: h.clock.clone(),
    }));

    let channel = service
        .create_channel(
            Caller::User(admins[0]),
            h.org,
            ChannelType::Organization,
            "general".to_string(),
            None,
        )
        .await
        .unwrap();

    let tasks = senders.iter().flat_map(|sender| {
        let sender = *sender;
        let service = service.clone();
        let channel_id = channel.id;
        (0..10).map(move |i| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .send_channel_message(
                        Caller::User(sender),
                        channel_id,
                        ChannelType::Organization,
                        format!("{sender} #{i}"),
                    )
                    .await
            })
        })
    });
    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    // 逐页遍历：不重复、不遗漏、严格倒序
    let history: Vec<_> = service
        .channel_history_stream(
            Caller::User(senders[0]),
            channel.id,
            ChannelType::Organization,
            None,
            Some(7),
        )
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(history.len(), 50);
    let ids: HashSet<_> = history.iter().map(|m| m.id).collect();
    assert_eq!(ids.len(), 50);
    assert!(history
        .windows(2)
        .all(|pair| (pair[0].created_at, pair[0].id) > (pair[1].created_at, pair[1].id)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bulk_sends_and_reads_keep_counts_exact() {
    let h = Harness::new();
    let owner = h.members(1, OrgRole::Owner).await[0];
    let members = h.members(10, OrgRole::Manager).await;
    let service = Arc::new(NotificationService::new(NotificationServiceDependencies {
        gate: h.gate.clone(),
        memberships: h.store.clone(),
        repository: h.store.clone(),
        audit: h.audit.clone(),
        clock: h.clock.clone(),
    }));

    let sends = (0..4).map(|i| {
        let service = service.clone();
        let org = h.org;
        tokio::spawn(async move {
            service
                .bulk_create(
                    Caller::User(owner),
                    org,
                    NotificationPayload {
                        notification_type: NotificationType::Info,
                        title: format!("Update {i}"),
                        message: "Weekly summary".to_string(),
                        link: None,
                        metadata: None,
                    },
                    RecipientSpec::Role(OrgRole::Manager),
                )
                .await
        })
    });
    for result in join_all(sends).await {
        assert_eq!(result.unwrap().unwrap().len(), members.len());
    }
    assert_eq!(h.store.notification_count().await, 4 * members.len());

    // 每个成员并发地把全部通知标为已读
    let reads = members.iter().map(|member| {
        let service = service.clone();
        let member = *member;
        tokio::spawn(async move {
            service
                .mark_all_read(Caller::User(member), None)
                .await
        })
    });
    let updated: u64 = join_all(reads)
        .await
        .into_iter()
        .map(|result| result.unwrap().unwrap())
        .sum();
    assert_eq!(updated, 4 * members.len() as u64);

    let listing = service
        .list(
            Caller::User(members[0]),
            ListNotificationsRequest {
                organization_id: Some(h.org),
                unread_only: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(listing.page.unread_count, 0);
    assert!(listing.page.notifications.is_empty());
    assert_eq!(h.store.activity_entries().await.len(), 4);
}
