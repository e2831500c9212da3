//! Service endpoints used by the identity system (X-API-Key protected).

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::directory::DeviceRegistration;
use crate::dispatch::DispatchReport;
use crate::error::{AppError, Result};
use crate::events::{LoginOutcome, SecurityEvent};
use crate::notification::{DeviceToken, User};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct UpsertUserRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub device_tokens: Vec<DeviceToken>,
}

#[derive(Debug, Serialize)]
pub struct UpsertUserResponse {
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user_id: String,
    pub ip_address: String,
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// PUT /api/v1/users/{id}
#[tracing::instrument(name = "http.upsert_user", skip(state, request))]
pub async fn upsert_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpsertUserRequest>,
) -> Result<Json<UpsertUserResponse>> {
    if request.email.trim().is_empty() {
        return Err(AppError::Validation("email is required".to_string()));
    }
    for device in &request.device_tokens {
        DeviceRegistration::from(device)
            .validate()
            .map_err(AppError::Validation)?;
    }

    let user = User {
        id,
        name: request.name,
        email: request.email,
        phone: request.phone,
        device_tokens: request.device_tokens,
    };
    let user = state.users.upsert(user).await?;

    tracing::debug!(user_id = %user.id, devices = user.device_tokens.len(), "User synced");
    Ok(Json(UpsertUserResponse { user }))
}

/// POST /api/v1/events
#[tracing::instrument(
    name = "http.security_event",
    skip(state, event),
    fields(user_id = %event.user_id(), event_type = %event.event_type())
)]
pub async fn publish_event(
    State(state): State<AppState>,
    Json(event): Json<SecurityEvent>,
) -> Result<Json<DispatchReport>> {
    let report = state.events.handle(event).await?;
    Ok(Json(report))
}

/// POST /api/v1/logins
#[tracing::instrument(name = "http.record_login", skip(state, request), fields(user_id = %request.user_id))]
pub async fn record_login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginOutcome>> {
    if request.ip_address.trim().is_empty() {
        return Err(AppError::Validation("ip_address is required".to_string()));
    }

    let outcome = state
        .events
        .record_login(
            &request.user_id,
            &request.ip_address,
            request.user_agent.as_deref(),
        )
        .await?;
    Ok(Json(outcome))
}
