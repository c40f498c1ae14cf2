// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory message store keyed by session id.
//!
//! Messages are immutable once created except for delivery-status
//! progression, and are removed only via session cascade.

use dashmap::DashMap;

use wagate_core::{DeliveryStatus, Message, WagateError};

/// Per-session message history.
#[derive(Default)]
pub struct MessageStore {
    by_session: DashMap<String, Vec<Message>>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to its session's history.
    pub fn append(&self, message: Message) {
        self.by_session
            .entry(message.session_id.clone())
            .or_default()
            .push(message);
    }

    /// All messages for a session, oldest first. Empty for unknown sessions.
    pub fn list(&self, session_id: &str) -> Vec<Message> {
        self.by_session
            .get(session_id)
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Apply a delivery-status progression to one message.
    ///
    /// Regressions (e.g. `read -> delivered`) are rejected.
    pub fn progress(
        &self,
        session_id: &str,
        message_id: &str,
        status: DeliveryStatus,
    ) -> Result<Message, WagateError> {
        let mut messages =
            self.by_session
                .get_mut(session_id)
                .ok_or_else(|| WagateError::NotFound {
                    resource: "message".to_string(),
                    id: message_id.to_string(),
                })?;
        let message = messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| WagateError::NotFound {
                resource: "message".to_string(),
                id: message_id.to_string(),
            })?;
        if !message.status.can_progress_to(status) {
            return Err(WagateError::Precondition(format!(
                "delivery status cannot move from {} to {}",
                message.status, status
            )));
        }
        message.status = status;
        Ok(message.clone())
    }

    /// Drop all messages for a session (cascade on deletion).
    pub fn remove_session(&self, session_id: &str) {
        self.by_session.remove(session_id);
    }

    /// Total stored messages across all sessions.
    pub fn total(&self) -> usize {
        self.by_session.iter().map(|m| m.len()).sum()
    }
}
