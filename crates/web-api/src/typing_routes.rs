use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use domain::{ChannelId, ChannelType, OrgId, TypingIndicator};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    extract::{ApiJson, ApiQuery},
    routes::SuccessResponse,
    state::AppState,
};

pub fn typing_routes() -> Router<AppState> {
    Router::new().route("/typing", post(set_typing).get(list_typers))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetTypingPayload {
    channel_id: Uuid,
    channel_type: ChannelType,
    is_typing: bool,
    organization_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypersQuery {
    channel_id: Uuid,
    channel_type: ChannelType,
    organization_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TyperResponse {
    user_id: Uuid,
    updated_at: DateTime<Utc>,
}

impl From<TypingIndicator> for TyperResponse {
    fn from(indicator: TypingIndicator) -> Self {
        Self {
            user_id: indicator.user_id.into(),
            updated_at: indicator.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct TypersResponse {
    typers: Vec<TyperResponse>,
}

async fn set_typing(
    headers: HeaderMap,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SetTypingPayload>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let caller = state.jwt_service.caller_from_headers(&headers)?;
    state
        .typing
        .set_typing(
            caller,
            ChannelId::from(payload.channel_id),
            payload.channel_type,
            OrgId::from(payload.organization_id),
            payload.is_typing,
        )
        .await?;

    Ok(Json(SuccessResponse::ok()))
}

/// 不包含调用者自己
async fn list_typers(
    headers: HeaderMap,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TypersQuery>,
) -> Result<Json<TypersResponse>, ApiError> {
    let caller = state.jwt_service.caller_from_headers(&headers)?;
    let typers = state
        .typing
        .list_active_typers(
            caller,
            ChannelId::from(query.channel_id),
            query.channel_type,
            OrgId::from(query.organization_id),
            true,
        )
        .await?;

    Ok(Json(TypersResponse {
        typers: typers.into_iter().map(TyperResponse::from).collect(),
    }))
}
