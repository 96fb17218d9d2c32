#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use application::{Clock, ManualClock, MemoryStore};
use axum::Router;
use chrono::Duration as ChronoDuration;
use domain::{OrgId, OrgRole, UserId};
use reqwest::{Client, RequestBuilder};
use tokio::{net::TcpListener, sync::oneshot, time::sleep};
use web_api::{router, AppState, JwtConfig, JwtService, RealtimeSettings, Repositories};

pub const TYPING_WINDOW_SECS: i64 = 8;

/// 运行在随机端口上的测试服务，存储使用内存实现，时钟可手动推进
pub struct TestApp {
    pub base_url: String,
    pub client: Client,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    jwt: Arc<JwtService>,
    shutdown: Option<oneshot::Sender<()>>,
}

pub fn build_router(store: Arc<MemoryStore>, clock: Arc<dyn Clock>, jwt: Arc<JwtService>) -> Router {
    let state = AppState::new(
        Repositories::in_memory(store),
        clock,
        RealtimeSettings {
            typing_window: ChronoDuration::seconds(TYPING_WINDOW_SECS),
            presence_stale_threshold: ChronoDuration::seconds(120),
        },
        jwt,
    );
    router(state)
}

pub async fn spawn_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::default());
    let jwt = Arc::new(JwtService::new(JwtConfig {
        secret: "integration-test-secret-key-with-32-chars".to_string(),
        expiration_hours: 1,
    }));

    let app = build_router(store.clone(), clock.clone(), jwt.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
    });

    // 等待服务器启动
    sleep(Duration::from_millis(100)).await;

    TestApp {
        base_url: format!("http://{}/api/v1", addr),
        client: Client::new(),
        store,
        clock,
        jwt,
        shutdown: Some(shutdown_tx),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn token(&self, user: UserId) -> String {
        self.jwt.generate_token(user).expect("token")
    }

    /// 新建一个指定角色的组织成员
    pub async fn member(&self, org: OrgId, role: OrgRole) -> UserId {
        let user = UserId::generate();
        self.store.add_membership(user, org, role).await;
        user
    }

    pub fn get(&self, user: UserId, path: &str) -> RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(self.token(user))
    }

    pub fn post(&self, user: UserId, path: &str) -> RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(self.token(user))
    }

    pub fn patch(&self, user: UserId, path: &str) -> RequestBuilder {
        self.client.patch(self.url(path)).bearer_auth(self.token(user))
    }

    pub fn delete(&self, user: UserId, path: &str) -> RequestBuilder {
        self.client.delete(self.url(path)).bearer_auth(self.token(user))
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
