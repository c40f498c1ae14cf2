// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `wagate serve` command implementation.
//!
//! Wires the full stack: event bus, activity log, webhook store and
//! dispatcher, session registry over the configured transport, and the
//! HTTP/WebSocket gateway. Supports graceful shutdown via signal handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use wagate_audit::ActivityLog;
use wagate_bus::EventBus;
use wagate_config::WagateConfig;
use wagate_core::{metrics, WagateError};
use wagate_gateway::{start_server, AuthConfig, GatewayState, ServerConfig};
use wagate_session::SessionRegistry;
use wagate_webhook::{DispatchSettings, WebhookDispatcher, WebhookStore};

use crate::shutdown;
use crate::transport;

/// Runs the `wagate serve` command.
pub async fn run_serve(config: WagateConfig) -> Result<(), WagateError> {
    init_tracing(&config.server.log_level);

    info!("starting wagate serve");
    metrics::register_metrics();

    // Fail-closed: refuse to start with no auth configured, since every API
    // route would 401 anyway.
    if config.server.bearer_token.is_none() {
        return Err(WagateError::Config(
            "server.bearer_token is not set; the API would reject every request. \
             Set it in wagate.toml or via WAGATE_SERVER_BEARER_TOKEN."
                .to_string(),
        ));
    }

    let bus = EventBus::new(config.bus.capacity);
    let audit = Arc::new(ActivityLog::new(config.audit.capacity, bus.clone()));
    let webhooks = Arc::new(WebhookStore::new(config.webhook.default_retry_count));

    let factory = transport::build_factory(&config.transport.kind)?;
    info!(kind = config.transport.kind.as_str(), "transport factory ready");

    let registry = Arc::new(SessionRegistry::new(
        factory,
        bus.clone(),
        audit.clone(),
        webhooks.clone(),
    ));

    let cancel = shutdown::install_signal_handler();

    // Registry event loop: sole mutator of session status.
    let registry_task = tokio::spawn(registry.clone().run(cancel.clone()));

    // Webhook dispatch loop.
    let dispatcher = Arc::new(WebhookDispatcher::new(
        webhooks.clone(),
        audit.clone(),
        DispatchSettings {
            timeout: Duration::from_secs(config.webhook.timeout_secs),
            backoff_base: Duration::from_millis(config.webhook.backoff_base_ms),
        },
    )?);
    let dispatcher_task = dispatcher.spawn(&bus, cancel.clone());

    let state = GatewayState {
        registry: registry.clone(),
        webhooks,
        audit: audit.clone(),
        bus,
        auth: AuthConfig {
            bearer_token: config.server.bearer_token.clone(),
        },
        started_at: Instant::now(),
    };

    audit
        .record("system_started", "Wagate gateway started", None, None)
        .await;

    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };
    start_server(&server_config, state, cancel.clone()).await?;

    // Drain: stop the loops, then tear down live transports.
    cancel.cancel();
    let _ = registry_task.await;
    let _ = dispatcher_task.await;
    registry.shutdown_all().await;

    info!("wagate serve shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("wagate={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
