//! Channel descriptors and their activation flags.

use dashmap::DashMap;
use serde::Serialize;

use super::{DATABASE_CHANNEL, EMAIL_CHANNEL, PUSH_CHANNEL, SMS_CHANNEL};

/// Catalog entry for one delivery channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelDescriptor {
    pub slug: String,
    pub name: String,
    pub description: String,
    pub is_active: bool,
}

impl ChannelDescriptor {
    pub fn new(slug: &str, name: &str, description: &str) -> Self {
        Self {
            slug: slug.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            is_active: true,
        }
    }
}

/// Known channels. Inactive or unknown channels never deliver.
#[derive(Default)]
pub struct ChannelCatalog {
    channels: DashMap<String, ChannelDescriptor>,
}

impl ChannelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog seeded with the four built-in channels; slugs listed in
    /// `inactive` start deactivated.
    pub fn with_builtin(inactive: &[String]) -> Self {
        let catalog = Self::new();
        for mut descriptor in builtin_descriptors() {
            descriptor.is_active = !inactive.iter().any(|s| s == &descriptor.slug);
            catalog.upsert(descriptor);
        }
        catalog
    }

    pub fn upsert(&self, descriptor: ChannelDescriptor) {
        self.channels.insert(descriptor.slug.clone(), descriptor);
    }

    /// Toggle a channel. Returns `false` for unknown slugs.
    pub fn set_active(&self, slug: &str, active: bool) -> bool {
        match self.channels.get_mut(slug) {
            Some(mut descriptor) => {
                descriptor.is_active = active;
                tracing::info!(channel = %slug, active, "Channel activation changed");
                true
            }
            None => false,
        }
    }

    pub fn exists(&self, slug: &str) -> bool {
        self.channels.contains_key(slug)
    }

    pub fn is_active(&self, slug: &str) -> bool {
        self.channels
            .get(slug)
            .map(|d| d.is_active)
            .unwrap_or(false)
    }

    /// Slugs of active channels, sorted.
    pub fn active_slugs(&self) -> Vec<String> {
        let mut slugs: Vec<String> = self
            .channels
            .iter()
            .filter(|d| d.is_active)
            .map(|d| d.slug.clone())
            .collect();
        slugs.sort();
        slugs
    }

    pub fn list(&self) -> Vec<ChannelDescriptor> {
        let mut all: Vec<ChannelDescriptor> =
            self.channels.iter().map(|d| d.value().clone()).collect();
        all.sort_by(|a, b| a.slug.cmp(&b.slug));
        all
    }
}

fn builtin_descriptors() -> Vec<ChannelDescriptor> {
    vec![
        ChannelDescriptor::new(DATABASE_CHANNEL, "In-App", "In-app notifications stored per user"),
        ChannelDescriptor::new(EMAIL_CHANNEL, "Email", "Email notifications via the mail transport"),
        ChannelDescriptor::new(SMS_CHANNEL, "SMS", "SMS notifications via the configured SMS provider"),
        ChannelDescriptor::new(PUSH_CHANNEL, "Firebase Push", "Push notifications via Firebase Cloud Messaging"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog() {
        let catalog = ChannelCatalog::with_builtin(&["sms".to_string()]);

        assert_eq!(catalog.list().len(), 4);
        assert!(catalog.is_active("email"));
        assert!(!catalog.is_active("sms"));
        assert!(catalog.exists("sms"));
        assert_eq!(
            catalog.active_slugs(),
            vec!["database", "email", "firebase_push"]
        );
    }

    #[test]
    fn test_unknown_slug_is_inactive() {
        let catalog = ChannelCatalog::with_builtin(&[]);
        assert!(!catalog.is_active("pager"));
        assert!(!catalog.set_active("pager", true));
    }

    #[test]
    fn test_set_active() {
        let catalog = ChannelCatalog::with_builtin(&[]);
        assert!(catalog.set_active("email", false));
        assert!(!catalog.is_active("email"));
    }
}
