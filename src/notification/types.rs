use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::NotifyError;
use super::render::{AppInfo, DatabaseRecord, MailMessage, PushMessage, Rendered};

/// Security-relevant account events that trigger notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    UserRegistered,
    PasswordChanged,
    LoginFromNewIp,
}

impl EventType {
    /// Every known event type, used for default preference materialization.
    pub const ALL: [EventType; 3] = [
        EventType::UserRegistered,
        EventType::PasswordChanged,
        EventType::LoginFromNewIp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::UserRegistered => "user_registered",
            EventType::PasswordChanged => "password_changed",
            EventType::LoginFromNewIp => "login_from_new_ip",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = NotifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user_registered" => Ok(EventType::UserRegistered),
            "password_changed" => Ok(EventType::PasswordChanged),
            "login_from_new_ip" => Ok(EventType::LoginFromNewIp),
            other => Err(NotifyError::UnknownEventType(other.to_string())),
        }
    }
}

/// Immutable notification content produced for a security event.
///
/// The payload is stored verbatim in the delivery log so that the recovery
/// sweep can rebuild it with all event-specific fields intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationPayload {
    UserRegistered {
        user_id: String,
        user_name: String,
    },
    PasswordChanged {
        user_id: String,
        user_name: String,
    },
    LoginFromNewIp {
        user_id: String,
        user_name: String,
        ip_address: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_agent: Option<String>,
        occurred_at: DateTime<Utc>,
    },
}

impl NotificationPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            NotificationPayload::UserRegistered { .. } => EventType::UserRegistered,
            NotificationPayload::PasswordChanged { .. } => EventType::PasswordChanged,
            NotificationPayload::LoginFromNewIp { .. } => EventType::LoginFromNewIp,
        }
    }

    /// Identifier of the payload variant, recorded alongside each log row.
    pub fn kind(&self) -> &'static str {
        self.event_type().as_str()
    }

    pub fn user_id(&self) -> &str {
        match self {
            NotificationPayload::UserRegistered { user_id, .. }
            | NotificationPayload::PasswordChanged { user_id, .. }
            | NotificationPayload::LoginFromNewIp { user_id, .. } => user_id,
        }
    }

    /// Render every representation this payload provides.
    pub fn render(&self, app: &AppInfo) -> Rendered {
        match self {
            NotificationPayload::UserRegistered { user_id, user_name } => Rendered {
                mail: Some(
                    MailMessage::new(format!("Welcome to {}", app.name))
                        .greeting(format!("Hello {}!", user_name))
                        .line(format!("Thank you for registering with {}.", app.name))
                        .line("Your account has been successfully created.")
                        .action("Visit Dashboard", &app.url)
                        .line("Welcome aboard!"),
                ),
                sms: Some(format!(
                    "Welcome to {}, {}! Your account is ready.",
                    app.name, user_name
                )),
                push: Some(PushMessage::new(
                    format!("Welcome to {}", app.name),
                    "Your account has been successfully created.",
                    self.event_type(),
                    user_id,
                )),
                database: Some(DatabaseRecord::new(
                    self.event_type(),
                    "Welcome!",
                    "Your account has been successfully created.",
                    user_id,
                )),
            },
            NotificationPayload::PasswordChanged { user_id, user_name } => Rendered {
                mail: Some(
                    MailMessage::new(format!("Password Changed - {}", app.name))
                        .greeting(format!("Hello {},", user_name))
                        .line("Your password was changed successfully.")
                        .line("If you did not make this change, please contact support immediately.")
                        .action("Contact Support", &app.url)
                        .line("Stay secure!"),
                ),
                sms: Some(format!(
                    "{} Security Alert: Your password was changed. If this wasn't you, contact support.",
                    app.name
                )),
                push: Some(PushMessage::new(
                    "Password Changed",
                    "Your password was changed successfully.",
                    self.event_type(),
                    user_id,
                )),
                database: Some(DatabaseRecord::new(
                    self.event_type(),
                    "Password Changed",
                    "Your password was changed successfully. If this was not you, contact support.",
                    user_id,
                )),
            },
            NotificationPayload::LoginFromNewIp {
                user_id,
                user_name,
                ip_address,
                user_agent,
                occurred_at,
            } => {
                let mut push = PushMessage::new(
                    "New Login Detected",
                    format!("Login from new IP: {}", ip_address),
                    self.event_type(),
                    user_id,
                );
                push.data.insert("ip_address".to_string(), ip_address.clone());

                let mut record = DatabaseRecord::new(
                    self.event_type(),
                    "New Login Detected",
                    format!("Login from new IP: {}", ip_address),
                    user_id,
                );
                record.ip_address = Some(ip_address.clone());
                record.user_agent = user_agent.clone();

                Rendered {
                    mail: Some(
                        MailMessage::new(format!("New Login Detected - {}", app.name))
                            .greeting(format!("Hello {},", user_name))
                            .line("We detected a login to your account from a new IP address.")
                            .line(format!("IP Address: {}", ip_address))
                            .line(format!(
                                "User Agent: {}",
                                user_agent.as_deref().unwrap_or("Unknown")
                            ))
                            .line(format!("Time: {}", occurred_at.format("%Y-%m-%d %H:%M:%S")))
                            .line("If this was not you, please change your password immediately.")
                            .action("Change Password", &app.url)
                            .line("Stay safe!"),
                    ),
                    sms: Some(format!(
                        "{} Alert: New login from IP {}. If this wasn't you, change your password.",
                        app.name, ip_address
                    )),
                    push: Some(push),
                    database: Some(record),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> AppInfo {
        AppInfo {
            name: "Acme".to_string(),
            url: "https://acme.test".to_string(),
        }
    }

    #[test]
    fn test_event_type_parse() {
        assert_eq!(
            "password_changed".parse::<EventType>().unwrap(),
            EventType::PasswordChanged
        );
        assert!(matches!(
            "account_deleted".parse::<EventType>(),
            Err(NotifyError::UnknownEventType(_))
        ));
    }

    #[test]
    fn test_event_type_serde_matches_as_str() {
        for event in EventType::ALL {
            let json = serde_json::to_string(&event).unwrap();
            assert_eq!(json, format!("\"{}\"", event.as_str()));
        }
    }

    #[test]
    fn test_payload_keeps_login_context_through_json() {
        let payload = NotificationPayload::LoginFromNewIp {
            user_id: "u-1".to_string(),
            user_name: "Ada".to_string(),
            ip_address: "203.0.113.7".to_string(),
            user_agent: Some("curl/8.0".to_string()),
            occurred_at: Utc::now(),
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["type"], "login_from_new_ip");
        assert_eq!(value["ip_address"], "203.0.113.7");

        let restored: NotificationPayload = serde_json::from_value(value).unwrap();
        assert_eq!(restored, payload);
    }

    #[test]
    fn test_registration_renders_welcome() {
        let payload = NotificationPayload::UserRegistered {
            user_id: "u-1".to_string(),
            user_name: "Ada".to_string(),
        };
        let rendered = payload.render(&app());

        let mail = rendered.mail.unwrap();
        assert_eq!(mail.subject, "Welcome to Acme");
        assert_eq!(
            rendered.sms.as_deref(),
            Some("Welcome to Acme, Ada! Your account is ready.")
        );
        assert_eq!(rendered.push.unwrap().title, "Welcome to Acme");
        assert_eq!(rendered.database.unwrap().title, "Welcome!");
    }

    #[test]
    fn test_new_ip_render_includes_address() {
        let payload = NotificationPayload::LoginFromNewIp {
            user_id: "u-1".to_string(),
            user_name: "Ada".to_string(),
            ip_address: "198.51.100.2".to_string(),
            user_agent: None,
            occurred_at: Utc::now(),
        };
        let rendered = payload.render(&app());

        assert!(rendered.sms.unwrap().contains("198.51.100.2"));
        assert!(rendered
            .mail
            .unwrap()
            .lines
            .iter()
            .any(|l| l == "User Agent: Unknown"));
        assert_eq!(
            rendered.push.unwrap().data.get("ip_address").map(String::as_str),
            Some("198.51.100.2")
        );
    }
}
