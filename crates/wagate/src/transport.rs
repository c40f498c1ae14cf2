// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in loopback transport.
//!
//! A development backend that plays out the full session lifecycle without
//! any external service: it emits a QR payload, links itself shortly after,
//! and echoes every outbound message back as an inbound one. Useful for
//! exercising the dashboard, webhooks, and WebSocket push end to end.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use wagate_core::{
    ClientInfo, IncomingMessage, MessageKind, TransportAdapter, TransportEvent, TransportFactory,
    WagateError,
};

/// Delay between the QR event and the simulated link.
const LINK_DELAY: Duration = Duration::from_secs(2);

/// Build the transport factory named by `transport.kind`.
pub fn build_factory(kind: &str) -> Result<Arc<dyn TransportFactory>, WagateError> {
    match kind {
        "loopback" => Ok(Arc::new(LoopbackFactory)),
        other => Err(WagateError::Config(format!(
            "unknown transport kind `{other}` (available: loopback)"
        ))),
    }
}

/// Factory for [`LoopbackTransport`]s.
pub struct LoopbackFactory;

impl TransportFactory for LoopbackFactory {
    fn create(&self, session_id: &str) -> Result<Arc<dyn TransportAdapter>, WagateError> {
        Ok(Arc::new(LoopbackTransport::new(session_id)))
    }
}

/// Self-contained transport that links itself and echoes sends.
pub struct LoopbackTransport {
    session_id: String,
    events: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    destroyed: Arc<AtomicBool>,
}

impl LoopbackTransport {
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            events: Mutex::new(None),
            destroyed: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl TransportAdapter for LoopbackTransport {
    async fn start(&self, events: mpsc::Sender<TransportEvent>) -> Result<(), WagateError> {
        *self.events.lock().await = Some(events.clone());

        let session_id = self.session_id.clone();
        let destroyed = Arc::clone(&self.destroyed);
        tokio::spawn(async move {
            let qr = TransportEvent::Qr(format!("wagate-loopback:{session_id}"));
            if events.send(qr).await.is_err() {
                return;
            }

            tokio::time::sleep(LINK_DELAY).await;
            if destroyed.load(Ordering::SeqCst) {
                return;
            }
            let ready = TransportEvent::Ready(ClientInfo {
                platform: "loopback".to_string(),
                phone: "0000000000".to_string(),
                pushname: "Loopback".to_string(),
            });
            let _ = events.send(ready).await;
        });

        Ok(())
    }

    async fn send_message(&self, to: &str, body: &str) -> Result<String, WagateError> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(WagateError::Transport {
                message: "loopback transport destroyed".to_string(),
                source: None,
            });
        }
        let events = self
            .events
            .lock()
            .await
            .clone()
            .ok_or_else(|| WagateError::Transport {
                message: "loopback transport not started".to_string(),
                source: None,
            })?;

        let message_id = uuid::Uuid::new_v4().to_string();

        // Echo the message back from the recipient, after acking delivery.
        let ack = TransportEvent::Ack {
            message_id: message_id.clone(),
            status: wagate_core::DeliveryStatus::Delivered,
        };
        let echo = TransportEvent::Message(IncomingMessage {
            id: uuid::Uuid::new_v4().to_string(),
            from: to.to_string(),
            to: "me".to_string(),
            body: body.to_string(),
            kind: MessageKind::Text,
            timestamp: chrono::Utc::now().to_rfc3339(),
        });
        tokio::spawn(async move {
            let _ = events.send(ack).await;
            let _ = events.send(echo).await;
        });

        Ok(message_id)
    }

    async fn destroy(&self) -> Result<(), WagateError> {
        self.destroyed.store(true, Ordering::SeqCst);
        debug!(session_id = %self.session_id, "loopback transport destroyed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emits_qr_then_links() {
        let transport = LoopbackTransport::new("session_1");
        let (tx, mut rx) = mpsc::channel(8);
        transport.start(tx).await.unwrap();

        match rx.recv().await.unwrap() {
            TransportEvent::Qr(payload) => {
                assert_eq!(payload, "wagate-loopback:session_1");
            }
            other => panic!("expected QR first, got {other:?}"),
        }

        match tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("link within the delay window")
            .unwrap()
        {
            TransportEvent::Ready(info) => assert_eq!(info.platform, "loopback"),
            other => panic!("expected ready, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_acks_and_echoes() {
        let transport = LoopbackTransport::new("session_1");
        let (tx, mut rx) = mpsc::channel(8);
        transport.start(tx).await.unwrap();
        let _qr = rx.recv().await;

        let id = transport.send_message("+1555", "hello").await.unwrap();

        let mut saw_ack = false;
        let mut saw_echo = false;
        for _ in 0..3 {
            match tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("event")
                .unwrap()
            {
                TransportEvent::Ack { message_id, .. } => {
                    assert_eq!(message_id, id);
                    saw_ack = true;
                }
                TransportEvent::Message(incoming) => {
                    assert_eq!(incoming.from, "+1555");
                    assert_eq!(incoming.body, "hello");
                    saw_echo = true;
                }
                TransportEvent::Ready(_) => {}
                other => panic!("unexpected event {other:?}"),
            }
            if saw_ack && saw_echo {
                break;
            }
        }
        assert!(saw_ack && saw_echo);
    }

    #[tokio::test]
    async fn destroyed_transport_rejects_sends() {
        let transport = LoopbackTransport::new("session_1");
        let (tx, _rx) = mpsc::channel(8);
        transport.start(tx).await.unwrap();
        transport.destroy().await.unwrap();

        let err = transport.send_message("+1555", "hello").await.unwrap_err();
        assert!(matches!(err, WagateError::Transport { .. }));
    }

    #[test]
    fn factory_rejects_unknown_kinds() {
        assert!(build_factory("loopback").is_ok());
        assert!(matches!(
            build_factory("carrier-pigeon"),
            Err(WagateError::Config(_))
        ));
    }
}
