// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event-driven webhook delivery.
//!
//! The dispatcher runs as a background task subscribed to the event bus. For
//! each dispatchable event it looks up the session's webhook configuration
//! and, if the event is subscribed, spawns a delivery task: one HTTP POST
//! with a `{event, timestamp, data}` JSON envelope and an `X-Webhook-Event`
//! header, plus up to `retry_count` extra attempts with exponential backoff.
//!
//! Delivery is fire-and-forget: session processing never waits on it, and a
//! session deletion does not cancel deliveries already in flight.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use wagate_audit::ActivityLog;
use wagate_bus::EventBus;
use wagate_core::{metrics, BusEvent, WagateError};

use crate::store::WebhookStore;

/// Delivery settings, mirroring the `[webhook]` config section.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Initial backoff between retry attempts; doubles per attempt.
    pub backoff_base: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            backoff_base: Duration::from_millis(500),
        }
    }
}

/// Outcome of a single delivery attempt that did not succeed.
enum AttemptFailure {
    /// Non-2xx response.
    Status(u16),
    /// Connection/transport error.
    Error(String),
}

/// Best-effort webhook deliverer.
pub struct WebhookDispatcher {
    store: Arc<WebhookStore>,
    audit: Arc<ActivityLog>,
    client: reqwest::Client,
    settings: DispatchSettings,
}

impl WebhookDispatcher {
    pub fn new(
        store: Arc<WebhookStore>,
        audit: Arc<ActivityLog>,
        settings: DispatchSettings,
    ) -> Result<Self, WagateError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| WagateError::Webhook {
                message: "failed to build webhook HTTP client".to_string(),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            store,
            audit,
            client,
            settings,
        })
    }

    /// Spawn the dispatch loop, consuming bus events until cancelled.
    pub fn spawn(self: Arc<Self>, bus: &EventBus, cancel: CancellationToken) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(event) => self.clone().handle_event(event),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(missed, "webhook dispatcher lagged behind the bus");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
            debug!("webhook dispatch loop stopped");
        })
    }

    /// Route one bus event; spawns a delivery task when the event is
    /// subscribed by the session's webhook.
    fn handle_event(self: Arc<Self>, event: BusEvent) {
        // Activity entries are never webhook material: delivering them would
        // feed the dispatcher's own logging back into itself.
        if matches!(event, BusEvent::ActivityLog(_)) {
            return;
        }
        let Some(session_id) = event.session_id().map(str::to_string) else {
            return;
        };
        let Some(config) = self.store.get(&session_id) else {
            return;
        };
        let name = event.name();
        if !config.is_active || !config.events.iter().any(|e| e == name) {
            return;
        }

        let payload = event.payload_json();
        tokio::spawn(async move {
            self.deliver(&session_id, &config.url, config.retry_count, name, payload)
                .await;
        });
    }

    /// Deliver one event: first attempt plus up to `retry_count` retries with
    /// exponential backoff. Counters and activity entries record the outcome.
    async fn deliver(
        &self,
        session_id: &str,
        url: &str,
        retry_count: u32,
        event: &'static str,
        payload: serde_json::Value,
    ) {
        let attempts = retry_count as u64 + 1;
        let mut backoff = self.settings.backoff_base;
        let mut last_failure = None;

        for attempt in 1..=attempts {
            match self.post(url, event, &payload).await {
                Ok(status) if (200..300).contains(&status) => {
                    self.store.record_success(session_id);
                    metrics::record_webhook("delivered");
                    self.audit
                        .record(
                            "webhook_delivered",
                            format!("Webhook delivered to {url}"),
                            Some(session_id),
                            None,
                        )
                        .await;
                    return;
                }
                Ok(status) => {
                    debug!(url, status, attempt, "webhook attempt returned non-2xx");
                    last_failure = Some(AttemptFailure::Status(status));
                }
                Err(e) => {
                    debug!(url, error = %e, attempt, "webhook attempt errored");
                    last_failure = Some(AttemptFailure::Error(e.to_string()));
                }
            }
            if attempt < attempts {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }

        self.store.record_failure(session_id);
        match last_failure {
            Some(AttemptFailure::Status(status)) => {
                metrics::record_webhook("failed");
                self.audit
                    .record(
                        "webhook_failed",
                        format!("Webhook failed to {url}: {status}"),
                        Some(session_id),
                        None,
                    )
                    .await;
            }
            Some(AttemptFailure::Error(message)) => {
                metrics::record_webhook("error");
                self.audit
                    .record(
                        "webhook_error",
                        format!("Webhook error to {url}: {message}"),
                        Some(session_id),
                        None,
                    )
                    .await;
            }
            None => {}
        }
    }

    /// One HTTP POST; returns the response status code.
    async fn post(
        &self,
        url: &str,
        event: &str,
        payload: &serde_json::Value,
    ) -> Result<u16, reqwest::Error> {
        let envelope = serde_json::json!({
            "event": event,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "data": payload,
        });
        let response = self
            .client
            .post(url)
            .header("X-Webhook-Event", event)
            .json(&envelope)
            .send()
            .await?;
        Ok(response.status().as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use wagate_core::{DeliveryStatus, Message, MessageKind};

    fn incoming_message(session_id: &str) -> Message {
        Message {
            id: "m1".into(),
            session_id: session_id.into(),
            from: "+1444".into(),
            to: "me".into(),
            body: "hi".into(),
            kind: MessageKind::Text,
            timestamp: chrono::Utc::now().to_rfc3339(),
            is_incoming: true,
            status: DeliveryStatus::Delivered,
        }
    }

    fn stack() -> (EventBus, Arc<WebhookStore>, Arc<ActivityLog>) {
        let bus = EventBus::default();
        let store = Arc::new(WebhookStore::new(0));
        let audit = Arc::new(ActivityLog::new(100, bus.clone()));
        (bus, store, audit)
    }

    fn fast_settings() -> DispatchSettings {
        DispatchSettings {
            timeout: Duration::from_secs(2),
            backoff_base: Duration::from_millis(10),
        }
    }

    async fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
        for _ in 0..200 {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn subscribed_event_triggers_exactly_one_post() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("X-Webhook-Event", "message_received"))
            .and(body_partial_json(serde_json::json!({
                "event": "message_received"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let (bus, store, audit) = stack();
        store.configure(
            "s1",
            &format!("{}/hook", server.uri()),
            Some(vec!["message_received".into()]),
        );

        let cancel = CancellationToken::new();
        let dispatcher = Arc::new(
            WebhookDispatcher::new(store.clone(), audit, fast_settings()).unwrap(),
        );
        let handle = dispatcher.spawn(&bus, cancel.clone());

        bus.publish(BusEvent::MessageReceived(incoming_message("s1")));

        let store_for_wait = store.clone();
        assert!(
            wait_until(move || {
                store_for_wait
                    .get("s1")
                    .map(|c| c.success_count == 1)
                    .unwrap_or(false)
            })
            .await,
            "delivery never recorded"
        );

        cancel.cancel();
        let _ = handle.await;
        server.verify().await;
    }

    #[tokio::test]
    async fn unsubscribed_event_is_a_noop() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (bus, store, audit) = stack();
        store.configure(
            "s1",
            &format!("{}/hook", server.uri()),
            Some(vec!["message_sent".into()]),
        );

        let cancel = CancellationToken::new();
        let dispatcher = Arc::new(
            WebhookDispatcher::new(store.clone(), audit, fast_settings()).unwrap(),
        );
        let handle = dispatcher.spawn(&bus, cancel.clone());

        bus.publish(BusEvent::MessageReceived(incoming_message("s1")));
        tokio::time::sleep(Duration::from_millis(200)).await;

        let config = store.get("s1").unwrap();
        assert_eq!(config.success_count, 0);
        assert_eq!(config.failure_count, 0);

        cancel.cancel();
        let _ = handle.await;
        server.verify().await;
    }

    #[tokio::test]
    async fn inactive_config_is_a_noop() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (bus, store, audit) = stack();
        store.configure(
            "s1",
            &format!("{}/hook", server.uri()),
            Some(vec!["message_received".into()]),
        );
        store.set_active("s1", false);

        let cancel = CancellationToken::new();
        let dispatcher = Arc::new(
            WebhookDispatcher::new(store.clone(), audit, fast_settings()).unwrap(),
        );
        let handle = dispatcher.spawn(&bus, cancel.clone());

        bus.publish(BusEvent::MessageReceived(incoming_message("s1")));
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(store.get("s1").unwrap().success_count, 0);
        cancel.cancel();
        let _ = handle.await;
        server.verify().await;
    }

    #[tokio::test]
    async fn non_2xx_increments_failure_and_logs_webhook_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let (bus, store, audit) = stack();
        store.configure(
            "s1",
            &format!("{}/hook", server.uri()),
            Some(vec!["message_received".into()]),
        );

        let cancel = CancellationToken::new();
        let dispatcher = Arc::new(
            WebhookDispatcher::new(store.clone(), audit.clone(), fast_settings()).unwrap(),
        );
        let handle = dispatcher.spawn(&bus, cancel.clone());

        bus.publish(BusEvent::MessageReceived(incoming_message("s1")));

        let store_for_wait = store.clone();
        assert!(
            wait_until(move || {
                store_for_wait
                    .get("s1")
                    .map(|c| c.failure_count == 1)
                    .unwrap_or(false)
            })
            .await
        );
        assert_eq!(audit.count_by_kinds(&["webhook_failed"]).await, 1);

        cancel.cancel();
        let _ = handle.await;
        server.verify().await;
    }

    #[tokio::test]
    async fn retry_count_governs_extra_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let (bus, _, audit) = stack();
        // Two extra attempts on top of the first.
        let store = Arc::new(WebhookStore::new(2));
        store.configure(
            "s1",
            &format!("{}/hook", server.uri()),
            Some(vec!["message_received".into()]),
        );

        let cancel = CancellationToken::new();
        let dispatcher = Arc::new(
            WebhookDispatcher::new(store.clone(), audit, fast_settings()).unwrap(),
        );
        let handle = dispatcher.spawn(&bus, cancel.clone());

        bus.publish(BusEvent::MessageReceived(incoming_message("s1")));

        let store_for_wait = store.clone();
        assert!(
            wait_until(move || {
                store_for_wait
                    .get("s1")
                    .map(|c| c.failure_count == 1)
                    .unwrap_or(false)
            })
            .await
        );

        cancel.cancel();
        let _ = handle.await;
        server.verify().await;
    }
}
