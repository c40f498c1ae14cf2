// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket event push.
//!
//! Connections subscribe to the process-wide event bus and receive every
//! published event as a JSON frame:
//!
//! ```json
//! {"type": "session_connected", "data": {"sessionId": "...", "session": {...}}}
//! ```
//!
//! The channel is push-only; client frames other than close are ignored.
//! Auth happens during the handshake via `?token=`, since browsers cannot
//! set an Authorization header on a WebSocket upgrade.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;

use crate::server::GatewayState;

/// Handshake query parameters.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    #[serde(default)]
    token: Option<String>,
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<GatewayState>,
) -> Response {
    if !state.auth.token_matches(params.token.as_deref()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Forward bus events to one WebSocket client until either side hangs up.
async fn handle_socket(socket: WebSocket, state: GatewayState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut events = state.bus.subscribe();

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    let frame = match serde_json::to_string(&event) {
                        Ok(frame) => frame,
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to serialize bus event");
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "WebSocket client lagged behind the bus");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // push-only channel; ignore client frames
                Some(Err(_)) => break,
            },
        }
    }

    tracing::debug!("WebSocket connection closed");
}
