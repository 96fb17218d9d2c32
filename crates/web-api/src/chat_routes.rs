//! 频道与私信路由

use application::services::MessagePage;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use domain::{
    Channel, ChannelId, ChannelMessage, ChannelType, DirectMessage, MessageCursor, MessageId,
    OrgId, ProjectId, UserId,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    extract::{ApiJson, ApiPath, ApiQuery},
    routes::UpdatedResponse,
    state::AppState,
};

pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/chat/channels", get(list_channels).post(create_channel))
        .route(
            "/chat/channels/{channel_id}/messages",
            post(send_channel_message).get(list_channel_messages),
        )
        .route("/chat/messages/{message_id}", patch(edit_channel_message))
        .route(
            "/chat/direct/{user_id}/messages",
            post(send_direct_message).get(list_direct_messages),
        )
        .route("/chat/direct/{user_id}/read", post(mark_conversation_read))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelsQuery {
    organization_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateChannelPayload {
    organization_id: Uuid,
    channel_type: ChannelType,
    name: String,
    project_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendChannelMessagePayload {
    channel_type: ChannelType,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ContentPayload {
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryQuery {
    before: Option<DateTime<Utc>>,
    before_id: Option<Uuid>,
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelHistoryQuery {
    channel_type: ChannelType,
    before: Option<DateTime<Utc>>,
    before_id: Option<Uuid>,
    limit: Option<u32>,
}

/// `before` 与 `beforeId` 必须同时给出
fn parse_cursor(
    before: Option<DateTime<Utc>>,
    before_id: Option<Uuid>,
) -> Result<Option<MessageCursor>, ApiError> {
    match (before, before_id) {
        (Some(created_at), Some(id)) => Ok(Some(MessageCursor {
            created_at,
            id: MessageId::from(id),
        })),
        (None, None) => Ok(None),
        _ => Err(ApiError::bad_request(
            "before and beforeId must be provided together",
        )),
    }
}

#[derive(Debug, Serialize)]
struct ChannelsResponse {
    channels: Vec<Channel>,
}

#[derive(Debug, Serialize)]
struct ChannelResponse {
    channel: Channel,
}

#[derive(Debug, Serialize)]
struct MessageResponse<T> {
    message: T,
}

async fn list_channels(
    headers: HeaderMap,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ChannelsQuery>,
) -> Result<Json<ChannelsResponse>, ApiError> {
    let caller = state.jwt_service.caller_from_headers(&headers)?;
    let channels = state
        .messaging
        .list_channels(caller, query.organization_id.map(OrgId::from))
        .await?;
    Ok(Json(ChannelsResponse { channels }))
}

async fn create_channel(
    headers: HeaderMap,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateChannelPayload>,
) -> Result<(StatusCode, Json<ChannelResponse>), ApiError> {
    let caller = state.jwt_service.caller_from_headers(&headers)?;
    let channel = state
        .messaging
        .create_channel(
            caller,
            OrgId::from(payload.organization_id),
            payload.channel_type,
            payload.name,
            payload.project_id.map(ProjectId::from),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ChannelResponse { channel })))
}

async fn send_channel_message(
    headers: HeaderMap,
    State(state): State<AppState>,
    ApiPath(channel_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<SendChannelMessagePayload>,
) -> Result<(StatusCode, Json<MessageResponse<ChannelMessage>>), ApiError> {
    let caller = state.jwt_service.caller_from_headers(&headers)?;
    let message = state
        .messaging
        .send_channel_message(
            caller,
            ChannelId::from(channel_id),
            payload.channel_type,
            payload.content,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(MessageResponse { message })))
}

async fn list_channel_messages(
    headers: HeaderMap,
    State(state): State<AppState>,
    ApiPath(channel_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<ChannelHistoryQuery>,
) -> Result<Json<MessagePage<ChannelMessage>>, ApiError> {
    let caller = state.jwt_service.caller_from_headers(&headers)?;
    let page = state
        .messaging
        .list_channel_messages(
            caller,
            ChannelId::from(channel_id),
            query.channel_type,
            parse_cursor(query.before, query.before_id)?,
            query.limit,
        )
        .await?;
    Ok(Json(page))
}

async fn edit_channel_message(
    headers: HeaderMap,
    State(state): State<AppState>,
    ApiPath(message_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<ContentPayload>,
) -> Result<Json<MessageResponse<ChannelMessage>>, ApiError> {
    let caller = state.jwt_service.caller_from_headers(&headers)?;
    let message = state
        .messaging
        .edit_channel_message(caller, MessageId::from(message_id), payload.content)
        .await?;
    Ok(Json(MessageResponse { message }))
}

async fn send_direct_message(
    headers: HeaderMap,
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<ContentPayload>,
) -> Result<(StatusCode, Json<MessageResponse<DirectMessage>>), ApiError> {
    let caller = state.jwt_service.caller_from_headers(&headers)?;
    let message = state
        .messaging
        .send_direct_message(caller, UserId::from(user_id), payload.content)
        .await?;
    Ok((StatusCode::CREATED, Json(MessageResponse { message })))
}

async fn list_direct_messages(
    headers: HeaderMap,
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Result<Json<MessagePage<DirectMessage>>, ApiError> {
    let caller = state.jwt_service.caller_from_headers(&headers)?;
    let page = state
        .messaging
        .list_direct_messages(
            caller,
            UserId::from(user_id),
            parse_cursor(query.before, query.before_id)?,
            query.limit,
        )
        .await?;
    Ok(Json(page))
}

async fn mark_conversation_read(
    headers: HeaderMap,
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> Result<Json<UpdatedResponse>, ApiError> {
    let caller = state.jwt_service.caller_from_headers(&headers)?;
    let updated = state
        .messaging
        .mark_conversation_read(caller, UserId::from(user_id))
        .await?;
    Ok(Json(UpdatedResponse {
        success: true,
        updated,
    }))
}
