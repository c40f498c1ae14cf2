// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session registry for the Wagate gateway.
//!
//! The registry is the single source of truth for session state. Transport
//! adapters push immutable lifecycle events onto a channel; one registry task
//! consumes them and is the sole mutator of session status, which keeps
//! per-session event ordering and removes shared-closure races. API handlers
//! mutate only through registry methods.

pub mod messages;
pub mod qr;
pub mod registry;

pub use messages::MessageStore;
pub use registry::{SessionRegistry, StatusChange};
