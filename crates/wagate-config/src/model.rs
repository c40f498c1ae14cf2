// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Wagate gateway.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Wagate configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WagateConfig {
    /// HTTP server and authentication settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Webhook delivery settings.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Activity log settings.
    #[serde(default)]
    pub audit: AuditConfig,

    /// Transport backend settings.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Event bus settings.
    #[serde(default)]
    pub bus: BusConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address for the HTTP listener.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port for the HTTP listener.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Static bearer token for API and WebSocket auth.
    /// `None` leaves the server unreachable through authenticated routes.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Webhook delivery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_webhook_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra delivery attempts after the first, per webhook.
    #[serde(default)]
    pub default_retry_count: u32,

    /// Initial retry backoff in milliseconds; doubles per attempt.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_webhook_timeout_secs(),
            default_retry_count: 0,
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

fn default_webhook_timeout_secs() -> u64 {
    10
}

fn default_backoff_base_ms() -> u64 {
    500
}

/// Activity log configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Maximum retained activity entries; the oldest are evicted beyond this.
    #[serde(default = "default_audit_capacity")]
    pub capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            capacity: default_audit_capacity(),
        }
    }
}

fn default_audit_capacity() -> usize {
    1000
}

/// Transport backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    /// Transport backend to instantiate per session.
    /// `loopback` is the built-in development transport.
    #[serde(default = "default_transport_kind")]
    pub kind: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: default_transport_kind(),
        }
    }
}

fn default_transport_kind() -> String {
    "loopback".to_string()
}

/// Event bus configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    /// Broadcast channel capacity; slow subscribers lag past this.
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: default_bus_capacity(),
        }
    }
}

fn default_bus_capacity() -> usize {
    256
}
