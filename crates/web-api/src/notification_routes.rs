use application::services::{ListNotificationsRequest, NotificationPayload};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{patch, post},
    Json, Router,
};
use domain::{Notification, NotificationId, NotificationType, OrgId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::{
    error::ApiError,
    extract::{ApiJson, ApiPath, ApiQuery},
    routes::{SuccessResponse, UpdatedResponse},
    state::AppState,
};

pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/notifications",
            post(create_notification).get(list_notifications),
        )
        .route("/notifications/read-all", post(mark_all_read))
        .route(
            "/notifications/{id}",
            patch(mark_read).delete(delete_notification),
        )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    organization_id: Option<Uuid>,
    #[serde(default)]
    unread_only: bool,
    limit: Option<u32>,
    offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateNotificationPayload {
    user_id: Uuid,
    organization_id: Uuid,
    #[serde(rename = "type")]
    notification_type: NotificationType,
    title: String,
    message: String,
    link: Option<String>,
    metadata: Option<JsonValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarkAllReadQuery {
    organization_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationData {
    notifications: Vec<Notification>,
    unread_count: u64,
}

#[derive(Debug, Serialize)]
struct Pagination {
    limit: u32,
    offset: u32,
    total: u64,
}

#[derive(Debug, Serialize)]
struct NotificationListResponse {
    data: NotificationData,
    pagination: Pagination,
}

#[derive(Debug, Serialize)]
struct NotificationResponse {
    notification: Notification,
}

async fn list_notifications(
    headers: HeaderMap,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<NotificationListResponse>, ApiError> {
    let caller = state.jwt_service.caller_from_headers(&headers)?;
    let listing = state
        .notifications
        .list(
            caller,
            ListNotificationsRequest {
                organization_id: query.organization_id.map(OrgId::from),
                unread_only: query.unread_only,
                limit: query.limit,
                offset: query.offset,
            },
        )
        .await?;

    Ok(Json(NotificationListResponse {
        data: NotificationData {
            notifications: listing.page.notifications,
            unread_count: listing.page.unread_count,
        },
        pagination: Pagination {
            limit: listing.limit,
            offset: listing.offset,
            total: listing.page.total,
        },
    }))
}

async fn create_notification(
    headers: HeaderMap,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateNotificationPayload>,
) -> Result<(StatusCode, Json<NotificationResponse>), ApiError> {
    let caller = state.jwt_service.caller_from_headers(&headers)?;
    let notification = state
        .notifications
        .create(
            caller,
            UserId::from(payload.user_id),
            OrgId::from(payload.organization_id),
            NotificationPayload {
                notification_type: payload.notification_type,
                title: payload.title,
                message: payload.message,
                link: payload.link,
                metadata: payload.metadata,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(NotificationResponse { notification })))
}

async fn mark_read(
    headers: HeaderMap,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<NotificationResponse>, ApiError> {
    let caller = state.jwt_service.caller_from_headers(&headers)?;
    let notification = state
        .notifications
        .mark_read(caller, NotificationId::from(id))
        .await?;
    Ok(Json(NotificationResponse { notification }))
}

async fn mark_all_read(
    headers: HeaderMap,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<MarkAllReadQuery>,
) -> Result<Json<UpdatedResponse>, ApiError> {
    let caller = state.jwt_service.caller_from_headers(&headers)?;
    let updated = state
        .notifications
        .mark_all_read(caller, query.organization_id.map(OrgId::from))
        .await?;
    Ok(Json(UpdatedResponse {
        success: true,
        updated,
    }))
}

async fn delete_notification(
    headers: HeaderMap,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let caller = state.jwt_service.caller_from_headers(&headers)?;
    state
        .notifications
        .delete(caller, NotificationId::from(id))
        .await?;
    Ok(Json(SuccessResponse::ok()))
}
