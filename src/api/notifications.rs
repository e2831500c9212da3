//! Authenticated user endpoints for the in-app inbox and delivery history.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::delivery_log::{DeliveryLogEntry, LogQuery};
use crate::dispatch::DispatchReport;
use crate::error::{AppError, Result};
use crate::events::SecurityEvent;
use crate::inbox::InAppNotification;
use crate::notification::EventType;
use crate::server::{AuthUser, AppState};

const DEFAULT_PAGE_SIZE: usize = 15;
const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
pub struct InboxQuery {
    #[serde(default)]
    pub unread_only: bool,
    #[serde(default = "default_page_size")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Serialize)]
pub struct InboxResponse {
    pub data: Vec<InAppNotification>,
    pub total: usize,
    pub unread_count: usize,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub message: String,
    pub marked: usize,
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub data: Vec<DeliveryLogEntry>,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Deserialize)]
pub struct TestEventRequest {
    pub event: EventType,
    /// Address reported for `login_from_new_ip`; defaults to the forwarded client address.
    #[serde(default)]
    pub ip_address: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TestEventResponse {
    pub message: String,
    pub dispatch: DispatchReport,
}

/// GET /api/v1/notifications
#[tracing::instrument(name = "http.list_notifications", skip(state, user), fields(user_id = %user.user_id()))]
pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<InboxQuery>,
) -> Result<Json<InboxResponse>> {
    let page = state
        .inbox
        .list(
            user.user_id(),
            query.unread_only,
            query.limit.min(MAX_PAGE_SIZE),
            query.offset,
        )
        .await?;

    Ok(Json(InboxResponse {
        data: page.items,
        total: page.total,
        unread_count: state.inbox.unread_count(user.user_id()).await?,
    }))
}

/// POST /api/v1/notifications/{id}/read
#[tracing::instrument(name = "http.mark_read", skip(state, user), fields(user_id = %user.user_id()))]
pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>> {
    if !state.inbox.mark_read(user.user_id(), id).await? {
        return Err(AppError::NotFound("Notification not found.".to_string()));
    }

    Ok(Json(MessageResponse {
        message: "Notification marked as read.".to_string(),
    }))
}

/// POST /api/v1/notifications/read-all
#[tracing::instrument(name = "http.mark_all_read", skip(state, user), fields(user_id = %user.user_id()))]
pub async fn mark_all_read(State(state): State<AppState>, user: AuthUser) -> Result<Json<MarkAllReadResponse>> {
    let marked = state.inbox.mark_all_read(user.user_id()).await?;

    Ok(Json(MarkAllReadResponse {
        message: "All notifications marked as read.".to_string(),
        marked,
    }))
}

/// GET /api/v1/notification-logs
#[tracing::instrument(name = "http.notification_logs", skip(state, user), fields(user_id = %user.user_id()))]
pub async fn notification_logs(
    State(state): State<AppState>,
    user: AuthUser,
    Query(mut query): Query<LogQuery>,
) -> Result<Json<LogsResponse>> {
    query.limit = query.limit.min(MAX_PAGE_SIZE);
    let data = state
        .delivery_logs
        .list_for_user(user.user_id(), &query)
        .await?;

    Ok(Json(LogsResponse {
        data,
        limit: query.limit,
        offset: query.offset,
    }))
}

/// POST /api/v1/notifications/test
///
/// Raise a security event for the caller to exercise the whole pipeline.
#[tracing::instrument(name = "http.trigger_test", skip(state, user, headers, request), fields(user_id = %user.user_id(), event = %request.event))]
pub async fn trigger_test(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    Json(request): Json<TestEventRequest>,
) -> Result<Json<TestEventResponse>> {
    let user_id = user.user_id().to_string();
    let event = match request.event {
        EventType::UserRegistered => SecurityEvent::UserRegistered { user_id },
        EventType::PasswordChanged => SecurityEvent::PasswordChanged { user_id },
        EventType::LoginFromNewIp => SecurityEvent::LoginFromNewIp {
            user_id,
            ip_address: request
                .ip_address
                .unwrap_or_else(|| client_ip(&headers)),
            user_agent: headers
                .get(axum::http::header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        },
    };

    let dispatch = state.events.handle(event).await?;

    Ok(Json(TestEventResponse {
        message: format!("Test event '{}' dispatched successfully.", request.event),
        dispatch,
    }))
}

/// First hop of `X-Forwarded-For`, or loopback when absent.
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .unwrap_or_else(|| "127.0.0.1".to_string())
}
