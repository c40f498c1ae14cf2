// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication middleware for the gateway.
//!
//! A single static bearer token guards the API (`Authorization: Bearer
//! <token>`). When no token is configured, all requests are rejected
//! (fail-closed).

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

/// Authentication configuration for the gateway.
#[derive(Clone)]
pub struct AuthConfig {
    /// Expected bearer token. `None` rejects every request.
    pub bearer_token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

impl AuthConfig {
    /// Whether a supplied token matches the configured one.
    ///
    /// Fail-closed: no configured token means nothing matches.
    pub fn token_matches(&self, supplied: Option<&str>) -> bool {
        match (&self.bearer_token, supplied) {
            (Some(expected), Some(token)) => expected == token,
            _ => false,
        }
    }
}

/// Middleware that validates the bearer token on API routes.
pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if auth.bearer_token.is_none() {
        tracing::error!("gateway has no auth configured -- rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let supplied = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if auth.token_matches(supplied) {
        Ok(next.run(request).await)
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_configured_token_matches_nothing() {
        let config = AuthConfig { bearer_token: None };
        assert!(!config.token_matches(None));
        assert!(!config.token_matches(Some("anything")));
    }

    #[test]
    fn configured_token_matches_exactly() {
        let config = AuthConfig {
            bearer_token: Some("secret-token".to_string()),
        };
        assert!(config.token_matches(Some("secret-token")));
        assert!(!config.token_matches(Some("wrong")));
        assert!(!config.token_matches(None));
    }

    #[test]
    fn auth_config_debug_redacts_token() {
        let config = AuthConfig {
            bearer_token: Some("secret-token".to_string()),
        };
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("secret-token"));
        assert!(debug_output.contains("[redacted]"));
    }
}
