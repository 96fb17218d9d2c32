use application::ApplicationError;
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::{DomainError, RepositoryError};
use once_cell::sync::OnceCell;
use serde::Serialize;

static EXPOSE_INTERNAL_ERRORS: OnceCell<bool> = OnceCell::new();

/// 启动时设置一次；开启后 500 响应携带存储层错误原文
pub fn set_expose_internal_errors(enabled: bool) {
    if EXPOSE_INTERNAL_ERRORS.set(enabled).is_err() {
        tracing::warn!("内部错误暴露开关已设置，忽略重复设置");
    }
}

fn expose_internal_errors() -> bool {
    EXPOSE_INTERNAL_ERRORS.get().copied().unwrap_or(false)
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    /// 记录原始错误，对外只返回通用信息
    pub fn internal_server_error(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(error = %message, "请求处理失败");
        let public = if expose_internal_errors() {
            message
        } else {
            "internal server error".to_string()
        };
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", public)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        match error {
            ApplicationError::Domain(DomainError::InvalidArgument { field, reason }) => {
                ApiError::new(
                    StatusCode::BAD_REQUEST,
                    "INVALID_ARGUMENT",
                    format!("{}: {}", field, reason),
                )
            }
            ApplicationError::Domain(err @ DomainError::UnknownVariant { .. }) => {
                ApiError::new(StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", err.to_string())
            }
            ApplicationError::Authentication => ApiError::unauthorized("authentication required"),
            ApplicationError::Authorization(message) => ApiError::forbidden(message),
            ApplicationError::NotFound(message) => ApiError::not_found(message),
            ApplicationError::Repository(RepositoryError::NotFound) => {
                ApiError::not_found("requested resource not found")
            }
            ApplicationError::Repository(RepositoryError::Conflict) => {
                ApiError::new(StatusCode::CONFLICT, "CONFLICT", "resource already exists")
            }
            ApplicationError::Repository(RepositoryError::Storage { message }) => {
                ApiError::internal_server_error(format!("storage error: {}", message))
            }
            ApplicationError::Infrastructure(message) => ApiError::internal_server_error(message),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        let cases = [
            (
                ApplicationError::Domain(DomainError::invalid_argument("content", "empty")),
                StatusCode::BAD_REQUEST,
            ),
            (ApplicationError::Authentication, StatusCode::UNAUTHORIZED),
            (
                ApplicationError::authorization("insufficient role"),
                StatusCode::FORBIDDEN,
            ),
            (ApplicationError::not_found("notification"), StatusCode::NOT_FOUND),
            (
                ApplicationError::Repository(RepositoryError::Conflict),
                StatusCode::CONFLICT,
            ),
            (
                ApplicationError::Repository(RepositoryError::storage("connection reset")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status(), expected);
        }
    }

    #[test]
    fn storage_details_are_hidden_by_default() {
        let error = ApiError::from(ApplicationError::Repository(RepositoryError::storage(
            "password authentication failed for user postgres",
        )));
        assert_eq!(error.body.code, "INTERNAL_ERROR");
        assert!(!error.body.message.contains("postgres"));
    }
}
