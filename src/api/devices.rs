//! Push device registration for the authenticated user.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::directory::DeviceRegistration;
use crate::error::{AppError, Result};
use crate::notification::DeviceToken;
use crate::server::{AppState, AuthUser};

use super::notifications::MessageResponse;

#[derive(Debug, Serialize)]
pub struct DeviceTokensResponse {
    pub device_tokens: Vec<DeviceToken>,
}

#[derive(Debug, Serialize)]
pub struct RegisterDeviceResponse {
    pub message: String,
    pub device_token: DeviceToken,
}

/// GET /api/v1/device-tokens
#[tracing::instrument(name = "http.list_device_tokens", skip(state, user), fields(user_id = %user.user_id()))]
pub async fn list_device_tokens(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<DeviceTokensResponse>> {
    let device_tokens = state.users.device_tokens(user.user_id()).await?;
    Ok(Json(DeviceTokensResponse { device_tokens }))
}

/// POST /api/v1/device-tokens
///
/// Registering a token the user already has updates it and reactivates it.
#[tracing::instrument(
    name = "http.register_device_token",
    skip(state, user, registration),
    fields(user_id = %user.user_id(), platform = registration.platform.as_str())
)]
pub async fn register_device_token(
    State(state): State<AppState>,
    user: AuthUser,
    Json(registration): Json<DeviceRegistration>,
) -> Result<(StatusCode, Json<RegisterDeviceResponse>)> {
    registration.validate().map_err(AppError::Validation)?;

    let device_token = state
        .users
        .register_device(user.user_id(), registration)
        .await?;
    tracing::info!(device_id = %device_token.id, "Device token registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterDeviceResponse {
            message: "Device token registered successfully.".to_string(),
            device_token,
        }),
    ))
}

/// DELETE /api/v1/device-tokens/{id}
#[tracing::instrument(name = "http.remove_device_token", skip(state, user), fields(user_id = %user.user_id()))]
pub async fn remove_device_token(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>> {
    if !state.users.remove_device(user.user_id(), id).await? {
        return Err(AppError::NotFound("Device token not found.".to_string()));
    }

    Ok(Json(MessageResponse {
        message: "Device token removed successfully.".to_string(),
    }))
}
