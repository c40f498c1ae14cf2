// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use wagate_audit::ActivityLog;
use wagate_bus::EventBus;
use wagate_core::WagateError;
use wagate_session::SessionRegistry;
use wagate_webhook::WebhookStore;

use crate::auth::{auth_middleware, AuthConfig};
use crate::handlers;
use crate::ws;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Session registry, the single source of truth for session state.
    pub registry: Arc<SessionRegistry>,
    /// Per-session webhook configurations.
    pub webhooks: Arc<WebhookStore>,
    /// Bounded activity log.
    pub audit: Arc<ActivityLog>,
    /// Process-wide event bus, subscribed by WebSocket connections.
    pub bus: EventBus,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Process start time for uptime calculation.
    pub started_at: Instant,
}

/// Gateway server configuration (mirrors `[server]` from wagate-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

/// Build the full gateway router.
///
/// Routes:
/// - GET /health (public)
/// - /api/* (bearer auth via middleware)
/// - GET /ws (auth via `?token=` during handshake, not middleware)
pub fn build_router(state: GatewayState) -> Router {
    let auth_state = state.auth.clone();

    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route(
            "/api/sessions",
            post(handlers::post_sessions).get(handlers::get_sessions),
        )
        .route("/api/sessions/{id}/qr", get(handlers::get_session_qr))
        .route(
            "/api/sessions/{id}/messages",
            get(handlers::get_session_messages),
        )
        .route(
            "/api/sessions/{id}/send-text",
            post(handlers::post_send_text),
        )
        .route("/api/sessions/{id}", delete(handlers::delete_session))
        .route("/api/webhook/configure", post(handlers::post_webhook_configure))
        .route("/api/metrics", get(handlers::get_metrics))
        .route("/api/logs", get(handlers::get_logs))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state.clone());

    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(ws_routes)
        .layer(CorsLayer::permissive())
}

/// Start the gateway HTTP/WebSocket server and serve until cancelled.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), WagateError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener =
        tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| WagateError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| WagateError::Internal(format!("gateway server error: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wagate_test_utils::MockTransportFactory;

    #[test]
    fn gateway_state_is_clone() {
        let bus = EventBus::default();
        let audit = Arc::new(ActivityLog::new(10, bus.clone()));
        let webhooks = Arc::new(WebhookStore::new(0));
        let registry = Arc::new(SessionRegistry::new(
            Arc::new(MockTransportFactory::new()),
            bus.clone(),
            audit.clone(),
            webhooks.clone(),
        ));
        let state = GatewayState {
            registry,
            webhooks,
            audit,
            bus,
            auth: AuthConfig { bearer_token: None },
            started_at: Instant::now(),
        };
        let _cloned = state.clone();
    }

    #[test]
    fn server_config_debug() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("127.0.0.1"));
    }
}
