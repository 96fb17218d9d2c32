//! Web API 层。
//!
//! 提供 Axum 路由，把 `/api/v1` 下的 JSON 请求委托给应用层的协作服务。

mod admin_routes;
mod auth;
mod chat_routes;
mod error;
mod extract;
mod notification_routes;
mod presence_routes;
mod routes;
mod state;
mod typing_routes;

pub use auth::{Claims, JwtService};
pub use config::JwtConfig;
pub use error::{set_expose_internal_errors, ApiError, ErrorBody};
pub use routes::{cors_layer, router};
pub use state::{AppState, RealtimeSettings, Repositories};
