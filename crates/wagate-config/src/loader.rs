// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./wagate.toml` > `~/.config/wagate/wagate.toml` >
//! `/etc/wagate/wagate.toml` with environment variable overrides via the
//! `WAGATE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::WagateConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/wagate/wagate.toml` (system-wide)
/// 3. `~/.config/wagate/wagate.toml` (user XDG config)
/// 4. `./wagate.toml` (local directory)
/// 5. `WAGATE_*` environment variables
pub fn load_config() -> Result<WagateConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WagateConfig::default()))
        .merge(Toml::file("/etc/wagate/wagate.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("wagate/wagate.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("wagate.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Useful for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<WagateConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WagateConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<WagateConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WagateConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `WAGATE_SERVER_BEARER_TOKEN` must map to
/// `server.bearer_token`, not `server.bearer.token`.
fn env_provider() -> Env {
    Env::prefixed("WAGATE_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("webhook_", "webhook.", 1)
            .replacen("audit_", "audit.", 1)
            .replacen("transport_", "transport.", 1)
            .replacen("bus_", "bus.", 1);
        mapped.into()
    })
}
