// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket gateway for the Wagate session registry.
//!
//! The gateway is a thin facade: handlers validate input, call registry and
//! store methods, and translate results into the `{success, data, error}`
//! envelope. All session state lives behind the registry; nothing here holds
//! state beyond the router's shared handles.

pub mod auth;
pub mod handlers;
pub mod server;
pub mod ws;

pub use auth::AuthConfig;
pub use server::{build_router, start_server, GatewayState, ServerConfig};
