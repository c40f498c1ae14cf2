// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model shared across the Wagate workspace.
//!
//! Wire names are camelCase to match the dashboard API surface.

use rand::Rng;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle status of a session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionStatus {
    Connecting,
    Connected,
    Disconnected,
    Error,
    Pending,
}

impl SessionStatus {
    /// Whether `self -> next` is a legal transition.
    ///
    /// The machine is `connecting -> connected | error | disconnected`,
    /// `connected -> disconnected | error`, with `disconnected` and `error`
    /// terminal. Recovery from a terminal state goes through deletion and
    /// re-creation, never an in-place transition.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Pending, Connecting)
                | (Connecting, Connected)
                | (Connecting, Error)
                | (Connecting, Disconnected)
                | (Connected, Disconnected)
                | (Connected, Error)
        )
    }
}

/// Device/client details reported by the transport once a session links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub platform: String,
    pub phone: String,
    pub pushname: String,
}

/// One logical messaging connection instance tracked by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Opaque immutable identifier (`session_<millis>_<rand>`).
    pub id: String,
    pub name: String,
    pub status: SessionStatus,
    /// QR data URL, present only while connecting and not yet linked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
    /// Populated once the session is connected. Mutually exclusive with
    /// `qr_code` across the lifecycle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_info: Option<ClientInfo>,
    pub messages_count: u64,
    /// RFC 3339 timestamp of the last observed activity.
    pub last_activity: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    pub is_active: bool,
}

impl Session {
    /// Create a fresh session record in the `connecting` state.
    pub fn new(id: String, name: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id,
            name,
            status: SessionStatus::Connecting,
            qr_code: None,
            client_info: None,
            messages_count: 0,
            last_activity: now.clone(),
            created_at: now,
            webhook_url: None,
            is_active: true,
        }
    }

    /// Allocate a fresh opaque session id.
    pub fn generate_id() -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(rand::distributions::Alphanumeric)
            .take(9)
            .map(|b| (b as char).to_ascii_lowercase())
            .collect();
        format!("session_{}_{}", chrono::Utc::now().timestamp_millis(), suffix)
    }
}

/// Content kind of a chat message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    Document,
}

/// Delivery status of a message.
///
/// Progression is monotonic: `sent -> delivered -> read`, never backwards.
/// `error` is terminal and reachable from any non-read state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Delivered,
    Read,
    Error,
}

impl DeliveryStatus {
    fn rank(self) -> u8 {
        match self {
            DeliveryStatus::Pending => 0,
            DeliveryStatus::Sent => 1,
            DeliveryStatus::Delivered => 2,
            DeliveryStatus::Read => 3,
            DeliveryStatus::Error => 4,
        }
    }

    /// Whether `self -> next` respects the monotonic progression.
    pub fn can_progress_to(self, next: DeliveryStatus) -> bool {
        if self == DeliveryStatus::Error {
            return false;
        }
        if next == DeliveryStatus::Error {
            return self != DeliveryStatus::Read;
        }
        next.rank() > self.rank()
    }
}

/// One inbound or outbound chat message tied to exactly one session.
///
/// Immutable once created except for delivery-status progression.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub session_id: String,
    pub from: String,
    pub to: String,
    pub body: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub timestamp: String,
    pub is_incoming: bool,
    pub status: DeliveryStatus,
}

/// Per-session outbound-notification target and its event subscription set.
///
/// A session has at most one configuration; configuring again replaces it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfig {
    pub id: String,
    pub session_id: String,
    pub url: String,
    pub events: Vec<String>,
    pub is_active: bool,
    /// Extra delivery attempts after the first, with exponential backoff.
    pub retry_count: u32,
    pub success_count: u64,
    pub failure_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_trigger: Option<String>,
}

/// Severity of an activity log entry, derived from its type tag.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Derive severity from a type tag by substring match:
    /// "error" -> error, "delete" -> warning, anything else -> info.
    pub fn derive(kind: &str) -> Self {
        if kind.contains("error") {
            Severity::Error
        } else if kind.contains("delete") {
            Severity::Warning
        } else {
            Severity::Info
        }
    }
}

/// One entry in the bounded activity log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub timestamp: String,
    pub severity: Severity,
}

impl ActivityEntry {
    /// Build an entry with a fresh id, current timestamp, and derived severity.
    pub fn new(
        kind: &str,
        message: impl Into<String>,
        session_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: kind.to_string(),
            message: message.into(),
            session_id: session_id.map(str::to_string),
            user_id: user_id.map(str::to_string),
            timestamp: chrono::Utc::now().to_rfc3339(),
            severity: Severity::derive(kind),
        }
    }
}
