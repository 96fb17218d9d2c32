use application::services::MemberPresence;
use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use domain::OrgId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::ApiError, extract::ApiQuery, routes::SuccessResponse, state::AppState};

pub fn presence_routes() -> Router<AppState> {
    Router::new()
        .route("/presence", get(organization_presence))
        .route("/presence/heartbeat", post(heartbeat))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresenceQuery {
    organization_id: Uuid,
}

#[derive(Debug, Serialize)]
struct PresenceResponse {
    users: Vec<MemberPresence>,
}

async fn heartbeat(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let caller = state.jwt_service.caller_from_headers(&headers)?;
    state.presence.heartbeat(caller).await?;
    Ok(Json(SuccessResponse::ok()))
}

async fn organization_presence(
    headers: HeaderMap,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PresenceQuery>,
) -> Result<Json<PresenceResponse>, ApiError> {
    let caller = state.jwt_service.caller_from_headers(&headers)?;
    let users = state
        .presence
        .organization_presence(caller, OrgId::from(query.organization_id))
        .await?;
    Ok(Json(PresenceResponse { users }))
}
