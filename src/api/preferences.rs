//! Preference endpoints for the authenticated user.

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::channel::ChannelDescriptor;
use crate::error::{AppError, Result};
use crate::notification::EventType;
use crate::preference::{Preference, PreferenceUpdate, RejectedUpdate};
use crate::server::{AuthUser, AppState};

#[derive(Debug, Serialize)]
pub struct PreferencesResponse {
    /// Explicit rows grouped by event type. Absent combinations are enabled.
    pub preferences: BTreeMap<EventType, Vec<Preference>>,
    pub channels: Vec<ChannelDescriptor>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePreferencesRequest {
    pub preferences: Vec<PreferenceUpdate>,
}

#[derive(Debug, Serialize)]
pub struct UpdatePreferencesResponse {
    pub message: String,
    pub applied: Vec<PreferenceUpdate>,
    pub rejected: Vec<RejectedUpdate>,
    pub preferences: Vec<Preference>,
}

/// GET /api/v1/preferences
#[tracing::instrument(name = "http.get_preferences", skip(state, user), fields(user_id = %user.user_id()))]
pub async fn get_preferences(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<PreferencesResponse>> {
    let rows = state.preferences.list(user.user_id()).await?;

    let mut preferences: BTreeMap<EventType, Vec<Preference>> = BTreeMap::new();
    for row in rows {
        preferences.entry(row.event_type).or_default().push(row);
    }

    Ok(Json(PreferencesResponse {
        preferences,
        channels: state.preferences.catalog().list(),
    }))
}

/// PUT /api/v1/preferences
#[tracing::instrument(name = "http.update_preferences", skip(state, user, request), fields(user_id = %user.user_id(), updates = request.preferences.len()))]
pub async fn update_preferences(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<UpdatePreferencesRequest>,
) -> Result<Json<UpdatePreferencesResponse>> {
    if request.preferences.is_empty() {
        return Err(AppError::Validation(
            "preferences must contain at least one entry".to_string(),
        ));
    }

    let result = state
        .preferences
        .bulk_update(user.user_id(), request.preferences)
        .await;
    let preferences = state.preferences.list(user.user_id()).await?;

    let message = if result.rejected.is_empty() {
        "Preferences updated successfully.".to_string()
    } else {
        format!(
            "{} preference(s) updated, {} rejected.",
            result.applied.len(),
            result.rejected.len()
        )
    };

    Ok(Json(UpdatePreferencesResponse {
        message,
        applied: result.applied,
        rejected: result.rejected,
        preferences,
    }))
}
