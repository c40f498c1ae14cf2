// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded, most-recent-first activity log.
//!
//! Entries are prepended to a ring buffer; once capacity is exceeded the
//! oldest entries are evicted FIFO. Each recorded entry is re-published on
//! the event bus for live observers, and echoed to the tracing log at its
//! derived severity.

use std::collections::VecDeque;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use wagate_bus::EventBus;
use wagate_core::{ActivityEntry, BusEvent, Severity};

/// Default ring buffer capacity.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Filters for [`ActivityLog::query`]. All supplied filters must match.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    /// Exact match on the type tag.
    pub kind: Option<String>,
    /// Exact match on the session id.
    pub session_id: Option<String>,
    /// Maximum number of entries returned. `None` means 100.
    pub limit: Option<usize>,
}

/// Append-only, ring-buffered audit trail of system events.
pub struct ActivityLog {
    capacity: usize,
    entries: Mutex<VecDeque<ActivityEntry>>,
    bus: EventBus,
}

impl ActivityLog {
    pub fn new(capacity: usize, bus: EventBus) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
            bus,
        }
    }

    /// Record an event: build the entry, prepend it, evict beyond capacity,
    /// and re-publish it on the bus.
    pub async fn record(
        &self,
        kind: &str,
        message: impl Into<String>,
        session_id: Option<&str>,
        user_id: Option<&str>,
    ) -> ActivityEntry {
        let entry = ActivityEntry::new(kind, message, session_id, user_id);

        {
            let mut entries = self.entries.lock().await;
            entries.push_front(entry.clone());
            while entries.len() > self.capacity {
                entries.pop_back();
            }
        }

        match entry.severity {
            Severity::Error => error!(kind = %entry.kind, "{}", entry.message),
            Severity::Warning => warn!(kind = %entry.kind, "{}", entry.message),
            Severity::Info => info!(kind = %entry.kind, "{}", entry.message),
        }

        self.bus.publish(BusEvent::ActivityLog(entry.clone()));
        entry
    }

    /// Return the matching prefix of the buffer, most-recent-first.
    pub async fn query(&self, filter: &LogFilter) -> Vec<ActivityEntry> {
        let limit = filter.limit.unwrap_or(100);
        let entries = self.entries.lock().await;
        entries
            .iter()
            .filter(|e| filter.kind.as_deref().is_none_or(|k| e.kind == k))
            .filter(|e| {
                filter
                    .session_id
                    .as_deref()
                    .is_none_or(|s| e.session_id.as_deref() == Some(s))
            })
            .take(limit)
            .cloned()
            .collect()
    }

    /// Count all entries whose type tag is one of `kinds`.
    pub async fn count_by_kinds(&self, kinds: &[&str]) -> u64 {
        let entries = self.entries.lock().await;
        entries
            .iter()
            .filter(|e| kinds.contains(&e.kind.as_str()))
            .count() as u64
    }

    /// Count entries of the given kinds recorded today (UTC).
    pub async fn count_today_by_kinds(&self, kinds: &[&str]) -> u64 {
        let today = chrono::Utc::now().date_naive();
        let entries = self.entries.lock().await;
        entries
            .iter()
            .filter(|e| kinds.contains(&e.kind.as_str()))
            .filter(|e| {
                chrono::DateTime::parse_from_rfc3339(&e.timestamp)
                    .map(|t| t.date_naive() == today)
                    .unwrap_or(false)
            })
            .count() as u64
    }

    /// Current number of buffered entries.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_with_capacity(capacity: usize) -> ActivityLog {
        ActivityLog::new(capacity, EventBus::default())
    }

    #[tokio::test]
    async fn record_prepends_newest_first() {
        let log = log_with_capacity(10);
        log.record("session_created", "first", Some("s1"), None).await;
        log.record("message_sent", "second", Some("s1"), None).await;

        let entries = log.query(&LogFilter::default()).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, "message_sent");
        assert_eq!(entries[1].kind, "session_created");
    }

    #[tokio::test]
    async fn buffer_never_exceeds_capacity() {
        let log = log_with_capacity(1000);
        for i in 0..1001 {
            log.record("message_sent", format!("msg {i}"), None, None).await;
        }
        assert_eq!(log.len().await, 1000);

        let entries = log
            .query(&LogFilter {
                limit: Some(1000),
                ..Default::default()
            })
            .await;
        // Newest at the front, oldest (msg 0) evicted.
        assert_eq!(entries[0].message, "msg 1000");
        assert_eq!(entries.last().unwrap().message, "msg 1");
    }

    #[tokio::test]
    async fn query_filters_by_kind_and_session() {
        let log = log_with_capacity(100);
        log.record("message_sent", "a", Some("s1"), None).await;
        log.record("message_received", "b", Some("s1"), None).await;
        log.record("message_sent", "c", Some("s2"), None).await;

        let sent = log
            .query(&LogFilter {
                kind: Some("message_sent".into()),
                ..Default::default()
            })
            .await;
        assert_eq!(sent.len(), 2);

        let s1_sent = log
            .query(&LogFilter {
                kind: Some("message_sent".into()),
                session_id: Some("s1".into()),
                ..Default::default()
            })
            .await;
        assert_eq!(s1_sent.len(), 1);
        assert_eq!(s1_sent[0].message, "a");
    }

    #[tokio::test]
    async fn query_respects_limit() {
        let log = log_with_capacity(100);
        for i in 0..20 {
            log.record("message_sent", format!("msg {i}"), None, None).await;
        }
        let entries = log
            .query(&LogFilter {
                limit: Some(5),
                ..Default::default()
            })
            .await;
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0].message, "msg 19");
    }

    #[tokio::test]
    async fn recorded_entries_are_republished_on_the_bus() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let log = ActivityLog::new(10, bus);

        log.record("session_deleted", "gone", Some("s1"), None).await;

        let event = rx.recv().await.unwrap();
        match event {
            BusEvent::ActivityLog(entry) => {
                assert_eq!(entry.kind, "session_deleted");
                assert_eq!(entry.severity, Severity::Warning);
            }
            other => panic!("expected activity_log event, got {}", other.name()),
        }
    }

    #[tokio::test]
    async fn counts_by_kind() {
        let log = log_with_capacity(100);
        log.record("webhook_delivered", "ok", Some("s1"), None).await;
        log.record("webhook_failed", "500", Some("s1"), None).await;
        log.record("webhook_error", "refused", Some("s1"), None).await;

        assert_eq!(log.count_by_kinds(&["webhook_delivered"]).await, 1);
        assert_eq!(
            log.count_by_kinds(&["webhook_failed", "webhook_error"]).await,
            2
        );
        assert_eq!(
            log.count_today_by_kinds(&["webhook_delivered"]).await,
            1
        );
    }
}
