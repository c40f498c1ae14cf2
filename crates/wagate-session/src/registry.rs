// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The session registry and its transport event loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use wagate_audit::ActivityLog;
use wagate_bus::EventBus;
use wagate_core::metrics;
use wagate_core::{
    BusEvent, ClientInfo, DeliveryStatus, IncomingMessage, Message, MessageKind, Session,
    SessionStatus, TransportAdapter, TransportEvent, TransportFactory, WagateError,
};
use wagate_webhook::WebhookStore;

use crate::messages::MessageStore;
use crate::qr;

/// A transport event tagged with its session and creation generation.
///
/// The generation lets the loop drop events from a transport that belonged
/// to a since-deleted session, so a late `ready` callback cannot resurrect
/// state after deletion.
struct TaggedEvent {
    session_id: String,
    generation: u64,
    event: TransportEvent,
}

/// Extra fields merged into a session record alongside a status transition.
#[derive(Debug, Clone, Default)]
pub struct StatusChange {
    pub qr_code: Option<String>,
    pub client_info: Option<ClientInfo>,
    /// Disconnect reason, surfaced on the `session_disconnected` event.
    pub reason: Option<String>,
}

/// Single source of truth for session state.
pub struct SessionRegistry {
    sessions: DashMap<String, Session>,
    transports: DashMap<String, Arc<dyn TransportAdapter>>,
    generations: DashMap<String, u64>,
    messages: MessageStore,
    factory: Arc<dyn TransportFactory>,
    bus: EventBus,
    audit: Arc<ActivityLog>,
    webhooks: Arc<WebhookStore>,
    events_tx: mpsc::Sender<TaggedEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<TaggedEvent>>>,
    next_generation: AtomicU64,
}

impl SessionRegistry {
    pub fn new(
        factory: Arc<dyn TransportFactory>,
        bus: EventBus,
        audit: Arc<ActivityLog>,
        webhooks: Arc<WebhookStore>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(512);
        Self {
            sessions: DashMap::new(),
            transports: DashMap::new(),
            generations: DashMap::new(),
            messages: MessageStore::new(),
            factory,
            bus,
            audit,
            webhooks,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Run the transport event loop until cancelled.
    ///
    /// This task is the sole mutator of session status; it must be spawned
    /// exactly once.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut rx = self
            .events_rx
            .lock()
            .await
            .take()
            .expect("registry event loop started twice");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = rx.recv() => match received {
                    Some(tagged) => self.handle_transport_event(tagged).await,
                    None => break,
                }
            }
        }
        debug!("session registry event loop stopped");
    }

    /// Create a session: allocate an id and record, build its transport, and
    /// begin initialization. Returns immediately; linking progresses through
    /// transport events.
    pub async fn create(&self, name: &str) -> Result<Session, WagateError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WagateError::Validation(
                "Session name is required".to_string(),
            ));
        }

        let id = Session::generate_id();
        let session = Session::new(id.clone(), name.to_string());
        self.sessions.insert(id.clone(), session.clone());

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        self.generations.insert(id.clone(), generation);

        let transport = match self.factory.create(&id) {
            Ok(transport) => transport,
            Err(e) => {
                self.sessions.remove(&id);
                self.generations.remove(&id);
                return Err(e);
            }
        };
        self.transports.insert(id.clone(), Arc::clone(&transport));

        // Per-session channel, forwarded into the shared loop with the
        // session/generation tag. The forwarder dies with the transport.
        let (tx, mut rx) = mpsc::channel::<TransportEvent>(64);
        let shared = self.events_tx.clone();
        let session_id = id.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let tagged = TaggedEvent {
                    session_id: session_id.clone(),
                    generation,
                    event,
                };
                if shared.send(tagged).await.is_err() {
                    break;
                }
            }
        });

        if let Err(e) = transport.start(tx).await {
            warn!(session_id = %id, error = %e, "transport initialization failed");
            let _ = self.update_status(&id, SessionStatus::Error, StatusChange::default());
            self.audit
                .record(
                    "session_error",
                    format!("Transport failed to initialize for session \"{name}\""),
                    Some(&id),
                    None,
                )
                .await;
        }

        self.audit
            .record(
                "session_created",
                format!("Session \"{name}\" created"),
                Some(&id),
                None,
            )
            .await;
        self.refresh_gauges();

        info!(session_id = %id, name, "session created");
        // Return the freshest record; the transport may already have failed.
        Ok(self.get(&id).unwrap_or(session))
    }

    /// Fetch one session record.
    pub fn get(&self, id: &str) -> Result<Session, WagateError> {
        self.sessions
            .get(id)
            .map(|s| s.clone())
            .ok_or_else(|| WagateError::session_not_found(id))
    }

    /// All session records. Callers re-sort; insertion order is irrelevant.
    pub fn list(&self) -> Vec<Session> {
        self.sessions.iter().map(|s| s.clone()).collect()
    }

    /// Apply a status transition and merge extra fields.
    ///
    /// Always refreshes the last-activity timestamp and publishes the
    /// corresponding bus event. Illegal transitions are rejected.
    pub fn update_status(
        &self,
        id: &str,
        status: SessionStatus,
        change: StatusChange,
    ) -> Result<Session, WagateError> {
        let snapshot = {
            let mut session = self
                .sessions
                .get_mut(id)
                .ok_or_else(|| WagateError::session_not_found(id))?;

            if !session.status.can_transition_to(status) {
                return Err(WagateError::Precondition(format!(
                    "illegal status transition {} -> {} for session {id}",
                    session.status, status
                )));
            }

            session.status = status;
            if let Some(qr_code) = change.qr_code {
                session.qr_code = Some(qr_code);
            }
            if let Some(client_info) = change.client_info {
                session.client_info = Some(client_info);
            }
            // QR exists only pre-connection; any departure from connecting
            // clears it.
            if status != SessionStatus::Connecting {
                session.qr_code = None;
            }
            session.last_activity = chrono::Utc::now().to_rfc3339();
            session.clone()
        };

        match status {
            SessionStatus::Connected => {
                self.bus.publish(BusEvent::SessionConnected {
                    session_id: id.to_string(),
                    session: snapshot.clone(),
                });
            }
            SessionStatus::Disconnected => {
                self.bus.publish(BusEvent::SessionDisconnected {
                    session_id: id.to_string(),
                    reason: change.reason.unwrap_or_else(|| "unknown".to_string()),
                });
            }
            _ => {}
        }
        self.refresh_gauges();
        Ok(snapshot)
    }

    /// Send a text message on a connected session.
    pub async fn send_text(
        &self,
        id: &str,
        to: &str,
        body: &str,
    ) -> Result<Message, WagateError> {
        if to.trim().is_empty() || body.is_empty() {
            return Err(WagateError::Validation(
                "Recipient and message are required".to_string(),
            ));
        }

        let session = self.get(id)?;
        let transport = self
            .transports
            .get(id)
            .map(|t| Arc::clone(&t))
            .ok_or_else(|| WagateError::session_not_found(id))?;

        if session.status != SessionStatus::Connected {
            return Err(WagateError::Precondition(
                "Session not connected".to_string(),
            ));
        }

        let message_id = match transport.send_message(to, body).await {
            Ok(message_id) => message_id,
            Err(e) => {
                self.audit
                    .record(
                        "message_error",
                        format!("Failed to send message to {to}"),
                        Some(id),
                        None,
                    )
                    .await;
                return Err(WagateError::Transport {
                    message: e.to_string(),
                    source: None,
                });
            }
        };

        let message = Message {
            id: message_id,
            session_id: id.to_string(),
            from: "me".to_string(),
            to: to.to_string(),
            body: body.to_string(),
            kind: MessageKind::Text,
            timestamp: chrono::Utc::now().to_rfc3339(),
            is_incoming: false,
            status: DeliveryStatus::Sent,
        };
        self.messages.append(message.clone());
        self.touch(id, 1);

        metrics::record_message("outgoing");
        self.bus.publish(BusEvent::MessageSent(message.clone()));
        self.audit
            .record("message_sent", format!("Message sent to {to}"), Some(id), None)
            .await;

        Ok(message)
    }

    /// Message history for a session, oldest first.
    pub fn messages(&self, id: &str) -> Result<Vec<Message>, WagateError> {
        // Distinguish "unknown session" from "no messages yet".
        self.get(id)?;
        Ok(self.messages.list(id))
    }

    /// Record the configured webhook URL on the session record.
    pub fn set_webhook_url(&self, id: &str, url: &str) -> Result<Session, WagateError> {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| WagateError::session_not_found(id))?;
        session.webhook_url = Some(url.to_string());
        Ok(session.clone())
    }

    /// Delete a session: tear down its transport (best-effort), remove the
    /// record, its webhook configuration, and its messages. Idempotent.
    pub async fn delete(&self, id: &str) {
        self.generations.remove(id);

        if let Some((_, transport)) = self.transports.remove(id) {
            if let Err(e) = transport.destroy().await {
                warn!(session_id = %id, error = %e, "transport teardown failed");
            }
        }

        if let Some((_, session)) = self.sessions.remove(id) {
            self.messages.remove_session(id);
            self.webhooks.remove(id);

            self.audit
                .record(
                    "session_deleted",
                    format!("Session \"{}\" deleted", session.name),
                    Some(id),
                    None,
                )
                .await;
            self.bus.publish(BusEvent::SessionDeleted {
                session_id: id.to_string(),
            });
            self.refresh_gauges();
        }
    }

    /// Destroy every live transport. Used during graceful shutdown.
    pub async fn shutdown_all(&self) {
        let ids: Vec<String> = self.transports.iter().map(|t| t.key().clone()).collect();
        for id in ids {
            if let Some((_, transport)) = self.transports.remove(&id) {
                if let Err(e) = transport.destroy().await {
                    warn!(session_id = %id, error = %e, "transport teardown failed");
                } else {
                    info!(session_id = %id, "transport closed");
                }
            }
        }
    }

    /// Aggregate counts for the metrics endpoint:
    /// (connected sessions, total sessions, total messages).
    pub fn counts(&self) -> (usize, usize, u64) {
        let active = self
            .sessions
            .iter()
            .filter(|s| s.status == SessionStatus::Connected)
            .count();
        let total = self.sessions.len();
        let messages: u64 = self.sessions.iter().map(|s| s.messages_count).sum();
        (active, total, messages)
    }

    /// Bump the message counter and refresh last-activity.
    fn touch(&self, id: &str, message_delta: u64) {
        if let Some(mut session) = self.sessions.get_mut(id) {
            session.messages_count += message_delta;
            session.last_activity = chrono::Utc::now().to_rfc3339();
        }
    }

    fn refresh_gauges(&self) {
        let (active, total, _) = self.counts();
        metrics::set_sessions_active(active as f64);
        metrics::set_sessions_total(total as f64);
    }

    /// Handle one tagged transport event; stale generations are dropped.
    async fn handle_transport_event(&self, tagged: TaggedEvent) {
        let TaggedEvent {
            session_id,
            generation,
            event,
        } = tagged;

        let current = self.generations.get(&session_id).map(|g| *g);
        if current != Some(generation) {
            debug!(
                session_id = %session_id,
                generation,
                "dropping stale transport event"
            );
            return;
        }

        match event {
            TransportEvent::Qr(payload) => self.handle_qr(&session_id, &payload).await,
            TransportEvent::Ready(client_info) => {
                self.handle_ready(&session_id, client_info).await
            }
            TransportEvent::Disconnected { reason } => {
                self.handle_disconnected(&session_id, reason).await
            }
            TransportEvent::Message(incoming) => {
                self.handle_incoming(&session_id, incoming).await
            }
            TransportEvent::Ack { message_id, status } => {
                if let Err(e) = self.messages.progress(&session_id, &message_id, status) {
                    debug!(session_id = %session_id, message_id, error = %e, "ack ignored");
                }
            }
        }
    }

    async fn handle_qr(&self, session_id: &str, payload: &str) {
        let data_url = match qr::to_data_url(payload) {
            Ok(url) => url,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "QR rendering failed");
                return;
            }
        };

        let name = {
            let Some(mut session) = self.sessions.get_mut(session_id) else {
                return;
            };
            // QR only exists while connecting and unlinked.
            if session.status != SessionStatus::Connecting {
                warn!(session_id = %session_id, status = %session.status, "QR event ignored");
                return;
            }
            session.qr_code = Some(data_url.clone());
            session.last_activity = chrono::Utc::now().to_rfc3339();
            session.name.clone()
        };

        self.bus.publish(BusEvent::SessionQr {
            session_id: session_id.to_string(),
            qr_code: data_url,
        });
        self.audit
            .record(
                "session_qr_generated",
                format!("QR code generated for session {name}"),
                Some(session_id),
                None,
            )
            .await;
    }

    async fn handle_ready(&self, session_id: &str, client_info: ClientInfo) {
        let change = StatusChange {
            client_info: Some(client_info),
            ..Default::default()
        };
        match self.update_status(session_id, SessionStatus::Connected, change) {
            Ok(session) => {
                self.audit
                    .record(
                        "session_connected",
                        format!("Session {} connected successfully", session.name),
                        Some(session_id),
                        None,
                    )
                    .await;
            }
            Err(e) => warn!(session_id = %session_id, error = %e, "ready event ignored"),
        }
    }

    async fn handle_disconnected(&self, session_id: &str, reason: String) {
        let change = StatusChange {
            reason: Some(reason.clone()),
            ..Default::default()
        };
        match self.update_status(session_id, SessionStatus::Disconnected, change) {
            Ok(session) => {
                self.audit
                    .record(
                        "session_disconnected",
                        format!("Session {} disconnected: {reason}", session.name),
                        Some(session_id),
                        None,
                    )
                    .await;
            }
            Err(e) => warn!(session_id = %session_id, error = %e, "disconnect event ignored"),
        }

        // The transport instance is spent; drop and tear it down best-effort.
        if let Some((_, transport)) = self.transports.remove(session_id) {
            if let Err(e) = transport.destroy().await {
                debug!(session_id = %session_id, error = %e, "post-disconnect teardown failed");
            }
        }
    }

    async fn handle_incoming(&self, session_id: &str, incoming: IncomingMessage) {
        if !self.sessions.contains_key(session_id) {
            return;
        }

        let message = Message {
            id: incoming.id,
            session_id: session_id.to_string(),
            from: incoming.from.clone(),
            to: incoming.to,
            body: incoming.body,
            kind: incoming.kind,
            timestamp: incoming.timestamp,
            is_incoming: true,
            status: DeliveryStatus::Delivered,
        };
        self.messages.append(message.clone());
        self.touch(session_id, 1);

        metrics::record_message("incoming");
        self.bus.publish(BusEvent::MessageReceived(message));
        self.audit
            .record(
                "message_received",
                format!("Message received from {}", incoming.from),
                Some(session_id),
                None,
            )
            .await;
    }
}
