use axum::{
    http::{HeaderValue, StatusCode},
    routing::get,
    Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    admin_routes::admin_routes, chat_routes::chat_routes,
    notification_routes::notification_routes, presence_routes::presence_routes,
    state::AppState, typing_routes::typing_routes,
};

/// 只表示操作成功的响应体
#[derive(Debug, Serialize)]
pub(crate) struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub(crate) fn ok() -> Self {
        Self { success: true }
    }
}

/// 批量更新类操作的响应体
#[derive(Debug, Serialize)]
pub(crate) struct UpdatedResponse {
    pub success: bool,
    pub updated: u64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(typing_routes())
        .merge(notification_routes())
        .merge(chat_routes())
        .merge(presence_routes())
        .nest("/admin", admin_routes())
}

/// `*` 表示允许任意来源；无法解析的来源会被跳过
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "忽略无效的 CORS 来源");
                None
            }
        })
        .collect();
    layer.allow_origin(allowed)
}

async fn health() -> StatusCode {
    StatusCode::OK
}
