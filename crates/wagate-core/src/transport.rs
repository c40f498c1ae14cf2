// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport adapter traits and lifecycle events.
//!
//! The transport is an external collaborator: it owns the actual messaging
//! protocol and QR-based device linking. The core never calls into transport
//! internals; it reacts to the immutable [`TransportEvent`]s the adapter
//! pushes on a channel, and invokes `send_message`/`destroy`.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::WagateError;
use crate::types::{ClientInfo, MessageKind};

/// A lifecycle event emitted by a transport adapter.
///
/// Events for a single session are delivered in emission order; the session
/// registry is the sole consumer that mutates state in response.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A QR payload for device linking (raw text, not yet rendered).
    Qr(String),
    /// The device link is confirmed and the session is usable.
    Ready(ClientInfo),
    /// The transport lost its connection.
    Disconnected { reason: String },
    /// An inbound chat message arrived.
    Message(IncomingMessage),
    /// A delivery receipt for a previously sent message.
    Ack {
        message_id: String,
        status: crate::types::DeliveryStatus,
    },
}

/// An inbound chat message as reported by the transport.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Transport-assigned message id.
    pub id: String,
    pub from: String,
    pub to: String,
    pub body: String,
    pub kind: MessageKind,
    /// RFC 3339 timestamp reported by the transport.
    pub timestamp: String,
}

/// Adapter for one session's messaging transport instance.
///
/// Exactly one adapter instance is associated with a session while it exists.
#[async_trait]
pub trait TransportAdapter: Send + Sync + 'static {
    /// Begin initialization, delivering lifecycle events on `events`.
    ///
    /// Must return promptly; linking and connection happen asynchronously and
    /// surface as [`TransportEvent`]s.
    async fn start(&self, events: mpsc::Sender<TransportEvent>) -> Result<(), WagateError>;

    /// Send a text message, returning the transport-assigned message id.
    async fn send_message(&self, to: &str, body: &str) -> Result<String, WagateError>;

    /// Tear down the transport instance, releasing its resources.
    async fn destroy(&self) -> Result<(), WagateError>;
}

/// Factory producing one transport adapter per session.
pub trait TransportFactory: Send + Sync + 'static {
    fn create(
        &self,
        session_id: &str,
    ) -> Result<std::sync::Arc<dyn TransportAdapter>, WagateError>;
}
