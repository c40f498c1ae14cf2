// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Wagate gateway.

use thiserror::Error;

/// The primary error type used across all Wagate crates.
///
/// The gateway boundary maps variants onto HTTP status classes: `Validation`
/// and `Precondition` become 400, `NotFound` becomes 404, everything else is
/// surfaced as a generic 500 with the original cause logged, never returned.
#[derive(Debug, Error)]
pub enum WagateError {
    /// A required field is missing or malformed in a request.
    #[error("{0}")]
    Validation(String),

    /// A referenced resource does not exist.
    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    /// The operation is not allowed in the current state
    /// (e.g. sending on a session that is not connected).
    #[error("{0}")]
    Precondition(String),

    /// Transport adapter errors (initialization, send, teardown).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Webhook delivery errors. Never surfaced to API callers.
    #[error("webhook error: {message}")]
    Webhook {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors (invalid TOML, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl WagateError {
    /// Shorthand for a session-not-found error.
    pub fn session_not_found(id: &str) -> Self {
        Self::NotFound {
            resource: "session".to_string(),
            id: id.to_string(),
        }
    }
}
