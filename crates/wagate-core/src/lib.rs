// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Wagate multi-session messaging gateway.
//!
//! This crate provides the error type, the domain model (sessions, messages,
//! webhook configurations, activity entries), the typed bus event enum, and
//! the transport adapter traits that the rest of the workspace builds on.

pub mod error;
pub mod event;
pub mod metrics;
pub mod transport;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::WagateError;
pub use event::BusEvent;
pub use transport::{IncomingMessage, TransportAdapter, TransportEvent, TransportFactory};
pub use types::{
    ActivityEntry, ClientInfo, DeliveryStatus, Message, MessageKind, Session, SessionStatus,
    Severity, WebhookConfig,
};
