//! Per-user login history used for new-address detection.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

/// Logins kept per user for display; address detection is not bounded by it.
pub const MAX_RECENT_LOGINS: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct LoginRecord {
    pub ip_address: String,
    pub user_agent: Option<String>,
    /// Whether this address had never been seen for the user before.
    pub is_new_ip: bool,
    pub logged_in_at: DateTime<Utc>,
}

#[derive(Default)]
struct UserLogins {
    known_addresses: HashSet<String>,
    recent: VecDeque<LoginRecord>,
}

#[derive(Default)]
pub struct LoginHistory {
    users: DashMap<String, UserLogins>,
}

impl LoginHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a login and report whether its address is new for the user.
    ///
    /// The check and the insert happen under the same shard lock, so two
    /// concurrent first logins from one address yield one `is_new_ip`.
    /// A user's very first login counts as a new address.
    pub fn record_login(&self, user_id: &str, ip_address: &str, user_agent: Option<&str>) -> LoginRecord {
        let mut logins = self.users.entry(user_id.to_string()).or_default();
        let is_new_ip = logins.known_addresses.insert(ip_address.to_string());

        let record = LoginRecord {
            ip_address: ip_address.to_string(),
            user_agent: user_agent.map(str::to_string),
            is_new_ip,
            logged_in_at: Utc::now(),
        };
        if logins.recent.len() == MAX_RECENT_LOGINS {
            logins.recent.pop_front();
        }
        logins.recent.push_back(record.clone());
        record
    }

    /// A user's most recent logins, newest first.
    pub fn history(&self, user_id: &str) -> Vec<LoginRecord> {
        self.users
            .get(user_id)
            .map(|logins| logins.recent.iter().rev().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ip_detection() {
        let history = LoginHistory::new();

        assert!(history.record_login("u-1", "192.0.2.1", Some("curl")).is_new_ip);
        assert!(!history.record_login("u-1", "192.0.2.1", None).is_new_ip);
        assert!(history.record_login("u-1", "198.51.100.7", None).is_new_ip);
        // Addresses are tracked per user.
        assert!(history.record_login("u-2", "192.0.2.1", None).is_new_ip);

        let logins = history.history("u-1");
        assert_eq!(logins.len(), 3);
        assert_eq!(logins[0].ip_address, "198.51.100.7");
        assert!(history.history("nobody").is_empty());
    }

    #[test]
    fn test_history_is_capped_but_addresses_are_remembered() {
        let history = LoginHistory::new();
        history.record_login("u-1", "192.0.2.1", None);
        for i in 0..MAX_RECENT_LOGINS {
            history.record_login("u-1", &format!("10.0.0.{}", i % 5), None);
        }

        let logins = history.history("u-1");
        assert_eq!(logins.len(), MAX_RECENT_LOGINS);
        assert!(logins.iter().all(|l| l.ip_address != "192.0.2.1"));

        // Evicted from the recent list, still a known address.
        assert!(!history.record_login("u-1", "192.0.2.1", None).is_new_ip);
    }
}
