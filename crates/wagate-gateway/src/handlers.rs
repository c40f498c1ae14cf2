// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.
//!
//! Every response is wrapped in the `{success, data?, error?, message?}`
//! envelope the dashboard consumes. Domain errors map onto HTTP status
//! classes: validation and precondition failures are 400, unknown resources
//! are 404, everything else is a generic 500 with the cause logged.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rand::Rng;
use serde::{Deserialize, Serialize};

use wagate_audit::LogFilter;
use wagate_core::{ActivityEntry, Message, Session, WagateError, WebhookConfig};

use crate::server::GatewayState;

/// Uniform response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            message: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn ok_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            message: Some(message.into()),
        }
    }
}

/// Map a domain error onto an HTTP response with the failure envelope.
fn error_response(err: WagateError) -> Response {
    let (status, error) = match &err {
        WagateError::Validation(msg) | WagateError::Precondition(msg) => {
            (StatusCode::BAD_REQUEST, msg.clone())
        }
        WagateError::NotFound { resource, .. } => {
            (StatusCode::NOT_FOUND, format!("{} not found", capitalize(resource)))
        }
        _ => {
            tracing::error!(error = %err, "request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    };
    (status, Json(ApiResponse::<()>::fail(error))).into_response()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Request body for POST /api/sessions.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub name: String,
}

/// Request body for POST /api/sessions/{id}/send-text.
#[derive(Debug, Deserialize)]
pub struct SendTextRequest {
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub message: String,
}

/// Request body for POST /api/webhook/configure.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfigureRequest {
    pub session_id: String,
    pub url: String,
    #[serde(default)]
    pub events: Option<Vec<String>>,
}

/// Query parameters for GET /api/logs.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsQuery {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Response body for GET /api/metrics.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse {
    pub sessions_active: usize,
    pub sessions_total: usize,
    pub messages_today: u64,
    pub messages_total: u64,
    pub webhooks_delivered: u64,
    pub webhooks_failed: u64,
    /// Seconds since gateway start.
    pub uptime: u64,
    /// Resident memory of this process in MB.
    pub memory_usage: f64,
    /// Simulated; the dashboard expects a percentage but the gateway does not
    /// sample real per-process CPU.
    pub cpu_usage: f64,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// QR payload for GET /api/sessions/{id}/qr.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QrResponse {
    pub qr_code: String,
}

/// GET /health (unauthenticated, for load balancers and systemd).
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

/// POST /api/sessions
pub async fn post_sessions(
    State(state): State<GatewayState>,
    Json(body): Json<CreateSessionRequest>,
) -> Response {
    match state.registry.create(&body.name).await {
        Ok(session) => Json(ApiResponse::ok(session)).into_response(),
        Err(err) => error_response(err),
    }
}

/// GET /api/sessions
pub async fn get_sessions(State(state): State<GatewayState>) -> Json<ApiResponse<Vec<Session>>> {
    let mut sessions = state.registry.list();
    // Newest first, matching the dashboard ordering.
    sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(ApiResponse::ok(sessions))
}

/// GET /api/sessions/{id}/qr
///
/// A known session without a pending QR answers 200 with `success: false`;
/// the dashboard polls this until the code appears or the session connects.
pub async fn get_session_qr(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Response {
    match state.registry.get(&id) {
        Ok(session) => match session.qr_code {
            Some(qr_code) => Json(ApiResponse::ok(QrResponse { qr_code })).into_response(),
            None => Json(ApiResponse::<()>::fail("QR code not available")).into_response(),
        },
        Err(err) => error_response(err),
    }
}

/// GET /api/sessions/{id}/messages
pub async fn get_session_messages(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Response {
    match state.registry.messages(&id) {
        Ok(messages) => Json(ApiResponse::<Vec<Message>>::ok(messages)).into_response(),
        Err(err) => error_response(err),
    }
}

/// POST /api/sessions/{id}/send-text
pub async fn post_send_text(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<SendTextRequest>,
) -> Response {
    match state.registry.send_text(&id, &body.to, &body.message).await {
        Ok(message) => Json(ApiResponse::ok(message)).into_response(),
        Err(err @ WagateError::Transport { .. }) => {
            tracing::error!(session_id = %id, error = %err, "send failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::fail("Failed to send message")),
            )
                .into_response()
        }
        Err(err) => error_response(err),
    }
}

/// DELETE /api/sessions/{id}
///
/// Idempotent: deleting an unknown or already-deleted session still answers
/// 200, so dashboard retries converge.
pub async fn delete_session(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Json<ApiResponse<()>> {
    state.registry.delete(&id).await;
    Json(ApiResponse::ok_message("Session deleted successfully"))
}

/// POST /api/webhook/configure
pub async fn post_webhook_configure(
    State(state): State<GatewayState>,
    Json(body): Json<WebhookConfigureRequest>,
) -> Response {
    if body.url.trim().is_empty() {
        return error_response(WagateError::Validation(
            "Webhook URL is required".to_string(),
        ));
    }

    let session = match state.registry.get(&body.session_id) {
        Ok(session) => session,
        Err(err) => return error_response(err),
    };

    let config = state
        .webhooks
        .configure(&body.session_id, &body.url, body.events);
    if let Err(err) = state.registry.set_webhook_url(&body.session_id, &body.url) {
        return error_response(err);
    }

    state
        .audit
        .record(
            "webhook_configured",
            format!("Webhook configured for session {}", session.name),
            Some(&body.session_id),
            None,
        )
        .await;

    Json(ApiResponse::<WebhookConfig>::ok(config)).into_response()
}

/// GET /api/metrics
pub async fn get_metrics(State(state): State<GatewayState>) -> Json<ApiResponse<MetricsResponse>> {
    let (sessions_active, sessions_total, messages_total) = state.registry.counts();
    let messages_today = state
        .audit
        .count_today_by_kinds(&["message_sent", "message_received"])
        .await;
    let webhooks_delivered = state.audit.count_by_kinds(&["webhook_delivered"]).await;
    let webhooks_failed = state
        .audit
        .count_by_kinds(&["webhook_failed", "webhook_error"])
        .await;

    Json(ApiResponse::ok(MetricsResponse {
        sessions_active,
        sessions_total,
        messages_today,
        messages_total,
        webhooks_delivered,
        webhooks_failed,
        uptime: state.started_at.elapsed().as_secs(),
        memory_usage: process_memory_mb(),
        cpu_usage: rand::thread_rng().gen_range(0.0..100.0),
    }))
}

/// GET /api/logs?limit=&type=&sessionId=
pub async fn get_logs(
    State(state): State<GatewayState>,
    Query(query): Query<LogsQuery>,
) -> Json<ApiResponse<Vec<ActivityEntry>>> {
    let entries = state
        .audit
        .query(&LogFilter {
            kind: query.kind,
            session_id: query.session_id,
            limit: query.limit,
        })
        .await;
    Json(ApiResponse::ok(entries))
}

/// Resident memory of the current process in MB.
fn process_memory_mb() -> f64 {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return 0.0;
    };
    let mut sys = sysinfo::System::new();
    sys.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[pid]), true);
    sys.process(pid)
        .map(|p| p.memory() as f64 / (1024.0 * 1024.0))
        .unwrap_or(0.0)
}
