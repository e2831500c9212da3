//! Channel-specific representations of a notification payload.
//!
//! A payload declares which representations it provides by filling the
//! matching field of [`Rendered`]. Channels read only the field they need and
//! skip delivery when it is absent.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::EventType;

/// Application identity used inside rendered content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppInfo {
    pub name: String,
    pub url: String,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            name: "Ara".to_string(),
            url: "http://localhost".to_string(),
        }
    }
}

/// All representations a payload rendered into.
#[derive(Debug, Clone, Default)]
pub struct Rendered {
    pub mail: Option<MailMessage>,
    pub sms: Option<String>,
    pub push: Option<PushMessage>,
    pub database: Option<DatabaseRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MailAction {
    pub label: String,
    pub url: String,
}

/// Simple line-oriented mail body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MailMessage {
    pub subject: String,
    pub greeting: Option<String>,
    pub lines: Vec<String>,
    pub action: Option<MailAction>,
}

impl MailMessage {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            greeting: None,
            lines: Vec::new(),
            action: None,
        }
    }

    pub fn greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = Some(greeting.into());
        self
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    pub fn action(mut self, label: &str, url: &str) -> Self {
        self.action = Some(MailAction {
            label: label.to_string(),
            url: url.to_string(),
        });
        self
    }

    /// Plain-text body: greeting, lines, then the action link.
    pub fn text_body(&self) -> String {
        let mut parts = Vec::with_capacity(self.lines.len() + 2);
        if let Some(ref greeting) = self.greeting {
            parts.push(greeting.clone());
        }
        parts.extend(self.lines.iter().cloned());
        if let Some(ref action) = self.action {
            parts.push(format!("{}: {}", action.label, action.url));
        }
        parts.join("\n\n")
    }
}

/// Push notification title/body plus a flat data map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

impl PushMessage {
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        event_type: EventType,
        user_id: &str,
    ) -> Self {
        let mut data = BTreeMap::new();
        data.insert("type".to_string(), event_type.as_str().to_string());
        data.insert("user_id".to_string(), user_id.to_string());
        Self {
            title: title.into(),
            body: body.into(),
            data,
        }
    }
}

/// Structured record stored by the in-app channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseRecord {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub title: String,
    pub message: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl DatabaseRecord {
    pub fn new(
        event_type: EventType,
        title: impl Into<String>,
        message: impl Into<String>,
        user_id: &str,
    ) -> Self {
        Self {
            event_type,
            title: title.into(),
            message: message.into(),
            user_id: user_id.to_string(),
            ip_address: None,
            user_agent: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mail_text_body_order() {
        let mail = MailMessage::new("Subject")
            .greeting("Hi")
            .line("first")
            .action("Open", "https://x.test")
            .line("second");

        assert_eq!(
            mail.text_body(),
            "Hi\n\nfirst\n\nsecond\n\nOpen: https://x.test"
        );
    }

    #[test]
    fn test_rendered_default_is_empty() {
        let rendered = Rendered::default();
        assert!(rendered.mail.is_none());
        assert!(rendered.sms.is_none());
        assert!(rendered.push.is_none());
        assert!(rendered.database.is_none());
    }
}
