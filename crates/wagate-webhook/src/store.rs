// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session webhook configuration store.

use dashmap::DashMap;

use wagate_core::WebhookConfig;

/// Event names subscribed by default when a configure call omits them.
pub const DEFAULT_EVENTS: &[&str] = &["message_received", "message_sent"];

/// Holds at most one webhook configuration per session id.
pub struct WebhookStore {
    configs: DashMap<String, WebhookConfig>,
    default_retry_count: u32,
}

impl WebhookStore {
    pub fn new(default_retry_count: u32) -> Self {
        Self {
            configs: DashMap::new(),
            default_retry_count,
        }
    }

    /// Create or replace the configuration for a session.
    ///
    /// Replacing resets counters; the previous configuration is discarded.
    pub fn configure(
        &self,
        session_id: &str,
        url: &str,
        events: Option<Vec<String>>,
    ) -> WebhookConfig {
        let config = WebhookConfig {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            url: url.to_string(),
            events: events.unwrap_or_else(|| {
                DEFAULT_EVENTS.iter().map(|e| e.to_string()).collect()
            }),
            is_active: true,
            retry_count: self.default_retry_count,
            success_count: 0,
            failure_count: 0,
            last_trigger: None,
        };
        self.configs.insert(session_id.to_string(), config.clone());
        config
    }

    /// Snapshot of the configuration for a session, if any.
    pub fn get(&self, session_id: &str) -> Option<WebhookConfig> {
        self.configs.get(session_id).map(|c| c.clone())
    }

    /// Remove the configuration for a session (cascade on deletion).
    pub fn remove(&self, session_id: &str) -> Option<WebhookConfig> {
        self.configs.remove(session_id).map(|(_, c)| c)
    }

    /// Record a successful delivery for a session's webhook.
    pub fn record_success(&self, session_id: &str) {
        if let Some(mut config) = self.configs.get_mut(session_id) {
            config.success_count += 1;
            config.last_trigger = Some(chrono::Utc::now().to_rfc3339());
        }
    }

    /// Record a failed delivery (after retry exhaustion) for a session's webhook.
    pub fn record_failure(&self, session_id: &str) {
        if let Some(mut config) = self.configs.get_mut(session_id) {
            config.failure_count += 1;
            config.last_trigger = Some(chrono::Utc::now().to_rfc3339());
        }
    }

    /// Set the active flag without replacing the configuration.
    pub fn set_active(&self, session_id: &str, active: bool) {
        if let Some(mut config) = self.configs.get_mut(session_id) {
            config.is_active = active;
        }
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configure_uses_default_events_when_omitted() {
        let store = WebhookStore::new(0);
        let config = store.configure("s1", "http://example.com/hook", None);
        assert_eq!(config.events, vec!["message_received", "message_sent"]);
        assert!(config.is_active);
        assert_eq!(config.retry_count, 0);
    }

    #[test]
    fn configure_replaces_rather_than_appends() {
        let store = WebhookStore::new(0);
        let first = store.configure("s1", "http://a.example", None);
        store.record_success("s1");
        let second = store.configure(
            "s1",
            "http://b.example",
            Some(vec!["message_received".into()]),
        );

        assert_eq!(store.len(), 1);
        assert_ne!(first.id, second.id);
        let current = store.get("s1").unwrap();
        assert_eq!(current.url, "http://b.example");
        assert_eq!(current.success_count, 0);
    }

    #[test]
    fn counters_track_outcomes() {
        let store = WebhookStore::new(0);
        store.configure("s1", "http://example.com/hook", None);
        store.record_success("s1");
        store.record_success("s1");
        store.record_failure("s1");

        let config = store.get("s1").unwrap();
        assert_eq!(config.success_count, 2);
        assert_eq!(config.failure_count, 1);
        assert!(config.last_trigger.is_some());
    }

    #[test]
    fn remove_cascades_cleanly() {
        let store = WebhookStore::new(0);
        store.configure("s1", "http://example.com/hook", None);
        assert!(store.remove("s1").is_some());
        assert!(store.get("s1").is_none());
        assert!(store.remove("s1").is_none());
    }

    #[test]
    fn set_active_toggles_flag() {
        let store = WebhookStore::new(0);
        store.configure("s1", "http://example.com/hook", None);
        store.set_active("s1", false);
        assert!(!store.get("s1").unwrap().is_active);
    }
}
