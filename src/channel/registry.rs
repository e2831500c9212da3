use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::notification::{EventType, NotifyError};

use super::NotificationChannel;

/// Active channels keyed by id.
///
/// Registration normally happens once during bootstrap. `DashMap` shard locks
/// keep a late `register` from racing with a concurrent `channels_for_event`.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: DashMap<String, Arc<dyn NotificationChannel>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel. A second registration under the same id wins.
    pub fn register(&self, id: impl Into<String>, channel: Arc<dyn NotificationChannel>) {
        let id = id.into();
        if self.channels.insert(id.clone(), channel).is_some() {
            tracing::warn!(channel = %id, "Replaced previously registered channel");
        } else {
            tracing::debug!(channel = %id, "Registered notification channel");
        }
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn NotificationChannel>, NotifyError> {
        self.channels
            .get(id)
            .map(|c| c.value().clone())
            .ok_or_else(|| NotifyError::ChannelNotRegistered(id.to_string()))
    }

    pub fn has(&self, id: &str) -> bool {
        self.channels.contains_key(id)
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.channels.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channels that support the event type, ordered by id.
    pub fn channels_for_event(
        &self,
        event_type: EventType,
    ) -> BTreeMap<String, Arc<dyn NotificationChannel>> {
        self.channels
            .iter()
            .filter(|entry| entry.value().supports(event_type))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelError;
    use crate::notification::{NotificationPayload, User};
    use async_trait::async_trait;

    struct StubChannel {
        id: &'static str,
        only: Option<EventType>,
    }

    #[async_trait]
    impl NotificationChannel for StubChannel {
        fn id(&self) -> &str {
            self.id
        }

        fn supports(&self, event_type: EventType) -> bool {
            self.only.map_or(true, |e| e == event_type)
        }

        async fn send(&self, _: &User, _: &NotificationPayload) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    fn stub(id: &'static str, only: Option<EventType>) -> Arc<dyn NotificationChannel> {
        Arc::new(StubChannel { id, only })
    }

    #[test]
    fn test_get_unregistered_fails() {
        let registry = ChannelRegistry::new();
        let err = registry.get("pager").err().unwrap();
        assert!(matches!(err, NotifyError::ChannelNotRegistered(ref id) if id == "pager"));
        assert!(!registry.has("pager"));
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = ChannelRegistry::new();
        registry.register("email", stub("email", None));
        registry.register("email", stub("email", Some(EventType::PasswordChanged)));

        assert_eq!(registry.len(), 1);
        let channel = registry.get("email").unwrap();
        assert!(!channel.supports(EventType::UserRegistered));
    }

    #[test]
    fn test_channels_for_event_filters_and_orders() {
        let registry = ChannelRegistry::new();
        registry.register("sms", stub("sms", None));
        registry.register("email", stub("email", None));
        registry.register("pager", stub("pager", Some(EventType::LoginFromNewIp)));

        let ids: Vec<String> = registry
            .channels_for_event(EventType::PasswordChanged)
            .into_keys()
            .collect();
        assert_eq!(ids, vec!["email".to_string(), "sms".to_string()]);

        let login = registry.channels_for_event(EventType::LoginFromNewIp);
        assert_eq!(login.len(), 3);
        assert_eq!(registry.ids(), vec!["email", "pager", "sms"]);
    }
}
