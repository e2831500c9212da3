use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::delivery_log::DeliveryLogError;
use crate::directory::UserDirectoryError;
use crate::inbox::InboxError;
use crate::notification::NotifyError;
use crate::preference::PreferenceBackendError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<NotifyError> for AppError {
    fn from(err: NotifyError) -> Self {
        match err {
            NotifyError::UserNotFound(_) => AppError::NotFound(err.to_string()),
            NotifyError::UnknownChannel(_)
            | NotifyError::UnknownEventType(_)
            | NotifyError::ChannelNotRegistered(_) => AppError::Validation(err.to_string()),
            NotifyError::DeliveryLog(_) | NotifyError::Preference(_) | NotifyError::Directory(_) => {
                AppError::Storage(err.to_string())
            }
            NotifyError::TransientDelivery { .. }
            | NotifyError::TerminalDelivery { .. }
            | NotifyError::Queue(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<DeliveryLogError> for AppError {
    fn from(err: DeliveryLogError) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<UserDirectoryError> for AppError {
    fn from(err: UserDirectoryError) -> Self {
        match err {
            UserDirectoryError::UserNotFound(_) => AppError::NotFound(err.to_string()),
            _ => AppError::Storage(err.to_string()),
        }
    }
}

impl From<InboxError> for AppError {
    fn from(err: InboxError) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<PreferenceBackendError> for AppError {
    fn from(err: PreferenceBackendError) -> Self {
        AppError::Storage(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

fn masked(detail: &str, public: &str) -> String {
    if is_production() {
        public.to_string()
    } else {
        detail.to_string()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, client_message, log_message) = match &self {
            AppError::Config(e) => {
                let log_msg = e.to_string();
                let client_msg = masked(&log_msg, "Configuration error");
                (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR", client_msg, log_msg)
            }
            AppError::Auth(msg) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                msg.clone(),
                msg.clone(),
            ),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                msg.clone(),
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                msg.clone(),
                msg.clone(),
            ),
            AppError::Internal(e) => {
                let client_msg = masked(e, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", client_msg, e.clone())
            }
            AppError::Storage(e) => {
                let client_msg = masked(e, "Service temporarily unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, "STORAGE_ERROR", client_msg, e.clone())
            }
        };

        // Always log the detailed error server-side
        tracing::error!(
            code = %code,
            status = %status.as_u16(),
            message = %log_message,
            "API error"
        );

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: client_message,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_error_mapping() {
        let err: AppError = NotifyError::UserNotFound("u-9".to_string()).into();
        assert!(matches!(err, AppError::NotFound(_)));

        let err: AppError = NotifyError::UnknownChannel("pager".to_string()).into();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("pager")));
    }

    #[test]
    fn test_status_codes() {
        let response = AppError::Auth("missing token".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = AppError::Storage("pool timed out".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
