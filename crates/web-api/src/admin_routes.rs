//! 管理端路由：删除频道/消息、批量通知、审计日志查询
//!
//! 角色校验在应用层完成，这里只做参数解析。

use std::str::FromStr;

use application::{services::NotificationPayload, ApplicationError};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use domain::{
    ActivityLogEntry, ChannelId, ChannelType, MessageId, MessageKind, NotificationType, OrgId,
    OrgRole, RecipientSpec, UserId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::{
    error::ApiError,
    extract::{ApiJson, ApiPath, ApiQuery},
    routes::SuccessResponse,
    state::AppState,
};

const DEFAULT_ACTIVITY_LIMIT: u32 = 50;

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/messaging/channels/{id}", delete(delete_channel))
        .route("/messaging/messages/{id}", delete(delete_message))
        .route("/notifications/bulk", post(bulk_notifications))
        .route("/activity", get(activity_log))
}

#[derive(Debug, Deserialize)]
struct DeleteChannelQuery {
    channel_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeleteMessageQuery {
    message_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RecipientKind {
    All,
    Role,
    SpecificUsers,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecipientsPayload {
    kind: RecipientKind,
    role: Option<OrgRole>,
    user_ids: Option<Vec<Uuid>>,
}

impl TryFrom<RecipientsPayload> for RecipientSpec {
    type Error = ApiError;

    fn try_from(payload: RecipientsPayload) -> Result<Self, Self::Error> {
        match payload.kind {
            RecipientKind::All => Ok(RecipientSpec::All),
            RecipientKind::Role => payload
                .role
                .map(RecipientSpec::Role)
                .ok_or_else(|| ApiError::bad_request("recipients.role is required")),
            RecipientKind::SpecificUsers => match payload.user_ids {
                Some(ids) if !ids.is_empty() => Ok(RecipientSpec::SpecificUsers(
                    ids.into_iter().map(UserId::from).collect(),
                )),
                _ => Err(ApiError::bad_request("recipients.userIds is required")),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkNotificationPayload {
    organization_id: Uuid,
    #[serde(rename = "type")]
    notification_type: NotificationType,
    title: String,
    message: String,
    link: Option<String>,
    metadata: Option<JsonValue>,
    recipients: RecipientsPayload,
}

#[derive(Debug, Serialize)]
struct BulkNotificationResponse {
    success: bool,
    created: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityQuery {
    organization_id: Uuid,
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ActivityResponse {
    entries: Vec<ActivityLogEntry>,
}

/// 解析必填的查询参数枚举值，缺失或取值非法都返回 400
fn required_param<T>(value: Option<String>, name: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = domain::DomainError>,
{
    let value = value.ok_or_else(|| ApiError::bad_request(format!("{name} is required")))?;
    T::from_str(&value).map_err(|err| ApiError::from(ApplicationError::from(err)))
}

async fn delete_channel(
    headers: HeaderMap,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<DeleteChannelQuery>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let caller = state.jwt_service.caller_from_headers(&headers)?;
    let channel_type: ChannelType = required_param(query.channel_type, "channel_type")?;

    state
        .messaging
        .delete_channel(caller, ChannelId::from(id), channel_type)
        .await?;
    Ok(Json(SuccessResponse::ok()))
}

async fn delete_message(
    headers: HeaderMap,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<DeleteMessageQuery>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let caller = state.jwt_service.caller_from_headers(&headers)?;
    let kind: MessageKind = required_param(query.message_type, "message_type")?;

    state
        .messaging
        .delete_message(caller, MessageId::from(id), kind)
        .await?;
    Ok(Json(SuccessResponse::ok()))
}

async fn bulk_notifications(
    headers: HeaderMap,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<BulkNotificationPayload>,
) -> Result<(StatusCode, Json<BulkNotificationResponse>), ApiError> {
    let caller = state.jwt_service.caller_from_headers(&headers)?;
    let recipients = RecipientSpec::try_from(payload.recipients)?;

    let created = state
        .notifications
        .bulk_create(
            caller,
            OrgId::from(payload.organization_id),
            NotificationPayload {
                notification_type: payload.notification_type,
                title: payload.title,
                message: payload.message,
                link: payload.link,
                metadata: payload.metadata,
            },
            recipients,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(BulkNotificationResponse {
            success: true,
            created: created.len(),
        }),
    ))
}

async fn activity_log(
    headers: HeaderMap,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ActivityQuery>,
) -> Result<Json<ActivityResponse>, ApiError> {
    let caller = state.jwt_service.caller_from_headers(&headers)?;
    let entries = state
        .audit
        .recent(
            caller,
            OrgId::from(query.organization_id),
            query.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT),
        )
        .await?;
    Ok(Json(ActivityResponse { entries }))
}
