use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::directory::UserDirectory;
use crate::dispatch::{DispatchReport, NotificationDispatcher};
use crate::notification::{EventType, NotificationPayload, NotifyError, User};
use crate::preference::PreferenceService;

use super::login_history::{LoginHistory, LoginRecord};

/// Security-relevant account events raised by the identity system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecurityEvent {
    UserRegistered {
        user_id: String,
    },
    PasswordChanged {
        user_id: String,
    },
    LoginFromNewIp {
        user_id: String,
        ip_address: String,
        #[serde(default)]
        user_agent: Option<String>,
    },
}

impl SecurityEvent {
    pub fn user_id(&self) -> &str {
        match self {
            SecurityEvent::UserRegistered { user_id }
            | SecurityEvent::PasswordChanged { user_id }
            | SecurityEvent::LoginFromNewIp { user_id, .. } => user_id,
        }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            SecurityEvent::UserRegistered { .. } => EventType::UserRegistered,
            SecurityEvent::PasswordChanged { .. } => EventType::PasswordChanged,
            SecurityEvent::LoginFromNewIp { .. } => EventType::LoginFromNewIp,
        }
    }

    fn into_payload(self, user: &User) -> NotificationPayload {
        match self {
            SecurityEvent::UserRegistered { user_id } => NotificationPayload::UserRegistered {
                user_id,
                user_name: user.name.clone(),
            },
            SecurityEvent::PasswordChanged { user_id } => NotificationPayload::PasswordChanged {
                user_id,
                user_name: user.name.clone(),
            },
            SecurityEvent::LoginFromNewIp {
                user_id,
                ip_address,
                user_agent,
            } => NotificationPayload::LoginFromNewIp {
                user_id,
                user_name: user.name.clone(),
                ip_address,
                user_agent,
                occurred_at: Utc::now(),
            },
        }
    }
}

/// Outcome of recording a login.
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub login: LoginRecord,
    /// Present when the address was new and a notification was dispatched.
    pub dispatch: Option<DispatchReport>,
}

/// Turns security events into notifications.
pub struct SecurityEventHandler {
    users: Arc<dyn UserDirectory>,
    preferences: Arc<PreferenceService>,
    dispatcher: Arc<NotificationDispatcher>,
    logins: Arc<LoginHistory>,
}

impl SecurityEventHandler {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        preferences: Arc<PreferenceService>,
        dispatcher: Arc<NotificationDispatcher>,
        logins: Arc<LoginHistory>,
    ) -> Self {
        Self {
            users,
            preferences,
            dispatcher,
            logins,
        }
    }

    pub fn login_history(&self) -> &Arc<LoginHistory> {
        &self.logins
    }

    /// Dispatch the notification for `event`.
    ///
    /// Registration materializes the user's default preferences first. A
    /// failure there is logged and does not stop the welcome notification.
    #[tracing::instrument(
        name = "events.handle",
        skip(self, event),
        fields(event_type = %event.event_type(), user_id = %event.user_id())
    )]
    pub async fn handle(&self, event: SecurityEvent) -> Result<DispatchReport, NotifyError> {
        let user = self
            .users
            .find_by_id(event.user_id())
            .await?
            .ok_or_else(|| NotifyError::UserNotFound(event.user_id().to_string()))?;

        if matches!(event, SecurityEvent::UserRegistered { .. }) {
            match self.preferences.materialize_defaults(&user.id).await {
                Ok(created) => {
                    tracing::debug!(user_id = %user.id, created, "Default preferences materialized");
                }
                Err(e) => {
                    tracing::error!(
                        user_id = %user.id,
                        error = %e,
                        "Failed to materialize default preferences"
                    );
                }
            }
        }

        let payload = event.into_payload(&user);
        Ok(self.dispatcher.dispatch(&user.id, payload).await)
    }

    /// Record a successful login and notify when it came from an address the
    /// user never logged in from before.
    pub async fn record_login(
        &self,
        user_id: &str,
        ip_address: &str,
        user_agent: Option<&str>,
    ) -> Result<LoginOutcome, NotifyError> {
        if self.users.find_by_id(user_id).await?.is_none() {
            return Err(NotifyError::UserNotFound(user_id.to_string()));
        }

        let login = self.logins.record_login(user_id, ip_address, user_agent);
        if !login.is_new_ip {
            return Ok(LoginOutcome {
                login,
                dispatch: None,
            });
        }

        tracing::info!(user_id = %user_id, ip_address = %ip_address, "Login from new IP address");
        let report = self
            .handle(SecurityEvent::LoginFromNewIp {
                user_id: user_id.to_string(),
                ip_address: ip_address.to_string(),
                user_agent: user_agent.map(str::to_string),
            })
            .await?;

        Ok(LoginOutcome {
            login,
            dispatch: Some(report),
        })
    }
}
