// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed bus events with explicit names and payload shapes.
//!
//! This replaces implicit "emit anything" broadcasting: every event the bus
//! can carry is a tagged variant here, so observers (WebSocket push, webhook
//! dispatcher) and tests share one vocabulary.

use serde::Serialize;

use crate::types::{ActivityEntry, Message, Session};

/// An event published on the process-wide bus.
///
/// Serialization uses `{"type": <name>, "data": <payload>}`, which is the
/// frame shape pushed over the WebSocket channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BusEvent {
    /// A new activity log entry was recorded.
    ActivityLog(ActivityEntry),
    /// A QR payload became available for a connecting session.
    #[serde(rename_all = "camelCase")]
    SessionQr { session_id: String, qr_code: String },
    /// A session finished linking and is connected.
    #[serde(rename_all = "camelCase")]
    SessionConnected { session_id: String, session: Session },
    /// A session's transport disconnected.
    #[serde(rename_all = "camelCase")]
    SessionDisconnected { session_id: String, reason: String },
    /// A session was removed from the registry.
    #[serde(rename_all = "camelCase")]
    SessionDeleted { session_id: String },
    /// An inbound message was observed on a session.
    MessageReceived(Message),
    /// An outbound message was sent on a session.
    MessageSent(Message),
}

impl BusEvent {
    /// The stable wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            BusEvent::ActivityLog(_) => "activity_log",
            BusEvent::SessionQr { .. } => "session_qr",
            BusEvent::SessionConnected { .. } => "session_connected",
            BusEvent::SessionDisconnected { .. } => "session_disconnected",
            BusEvent::SessionDeleted { .. } => "session_deleted",
            BusEvent::MessageReceived(_) => "message_received",
            BusEvent::MessageSent(_) => "message_sent",
        }
    }

    /// The session this event concerns, if any.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            BusEvent::ActivityLog(entry) => entry.session_id.as_deref(),
            BusEvent::SessionQr { session_id, .. }
            | BusEvent::SessionConnected { session_id, .. }
            | BusEvent::SessionDisconnected { session_id, .. }
            | BusEvent::SessionDeleted { session_id } => Some(session_id),
            BusEvent::MessageReceived(msg) | BusEvent::MessageSent(msg) => {
                Some(&msg.session_id)
            }
        }
    }

    /// The payload as a JSON value, without the event tag.
    ///
    /// This is the `data` field of the webhook envelope.
    pub fn payload_json(&self) -> serde_json::Value {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(mut map)) => {
                map.remove("data").unwrap_or(serde_json::Value::Null)
            }
            _ => serde_json::Value::Null,
        }
    }
}
