// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as valid bind addresses and sane capacities.

use crate::diagnostic::ConfigError;
use crate::model::WagateConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &WagateConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("server.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    if let Some(token) = &config.server.bearer_token {
        if token.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: "server.bearer_token must not be empty when set".to_string(),
            });
        }
    }

    if config.audit.capacity == 0 {
        errors.push(ConfigError::Validation {
            message: "audit.capacity must be at least 1".to_string(),
        });
    }

    if config.bus.capacity == 0 {
        errors.push(ConfigError::Validation {
            message: "bus.capacity must be at least 1".to_string(),
        });
    }

    if config.webhook.timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "webhook.timeout_secs must be at least 1".to_string(),
        });
    }

    if config.transport.kind.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "transport.kind must not be empty".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
