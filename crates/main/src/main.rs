//! 协作服务入口
//!
//! 加载配置、装配存储与服务、启动输入状态清理任务并运行 Axum Web API。

use std::sync::Arc;

use application::{spawn_typing_sweeper, MemoryStore, SystemClock};
use config::{AppConfig, StorageBackend};
use infrastructure::{Infrastructure, InfrastructureConfig, PgStorage};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use web_api::{cors_layer, router, AppState, JwtService, RealtimeSettings, Repositories};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::load()?;
    tracing::info!(config = %config.sanitize(), "配置已加载");
    web_api::set_expose_internal_errors(config.server.expose_internal_errors);

    let repositories = match config.storage.backend {
        StorageBackend::Postgres => {
            let infrastructure = Infrastructure::connect(InfrastructureConfig {
                database_url: config.database.url.clone(),
                max_connections: config.database.max_connections,
                run_migrations: config.database.run_migrations,
            })
            .await?;
            infrastructure.storage.health_check().await?;
            pg_repositories(&infrastructure.storage)
        }
        StorageBackend::Memory => {
            tracing::warn!("使用内存存储，进程退出后数据全部丢失");
            Repositories::in_memory(Arc::new(MemoryStore::new()))
        }
    };

    let realtime = RealtimeSettings {
        typing_window: chrono::Duration::from_std(config.realtime.typing_window())?,
        presence_stale_threshold: chrono::Duration::from_std(
            config.realtime.presence_stale_threshold(),
        )?,
    };
    let jwt_service = Arc::new(JwtService::new(config.jwt.clone()));
    let state = AppState::new(repositories, Arc::new(SystemClock), realtime, jwt_service);

    let shutdown = CancellationToken::new();
    let sweeper = spawn_typing_sweeper(
        state.typing.clone(),
        config.realtime.typing_sweep_interval(),
        shutdown.clone(),
    );

    let app = router(state).layer(cors_layer(&config.server.cors_origins));
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("协作服务启动在 http://{}", addr);

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "监听退出信号失败");
            }
            tracing::info!("收到退出信号，开始关闭");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    sweeper.await?;
    Ok(())
}

fn pg_repositories(storage: &PgStorage) -> Repositories {
    Repositories {
        memberships: storage.memberships.clone(),
        channels: storage.channels.clone(),
        channel_messages: storage.channel_messages.clone(),
        direct_messages: storage.direct_messages.clone(),
        typing: storage.typing.clone(),
        presence: storage.presence.clone(),
        notifications: storage.notifications.clone(),
        activity: storage.activity.clone(),
    }
}
