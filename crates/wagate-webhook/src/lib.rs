// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook configuration store and outbound dispatcher.
//!
//! Each session holds at most one webhook target. The dispatcher subscribes
//! to the event bus and performs best-effort HTTP delivery: delivery never
//! blocks session processing, and its outcome is only visible through the
//! per-config counters and the activity log.

pub mod dispatcher;
pub mod store;

pub use dispatcher::{DispatchSettings, WebhookDispatcher};
pub use store::WebhookStore;
