// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process transport double.
//!
//! Tests drive the session lifecycle by emitting [`TransportEvent`]s through
//! the channel handed to `start`, and inspect outbound traffic through the
//! captured send log.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};

use wagate_core::{TransportAdapter, TransportEvent, TransportFactory, WagateError};

/// A scripted transport. `emit` pushes lifecycle events as if the remote
/// service produced them; sends are recorded rather than delivered.
#[derive(Default)]
pub struct MockTransport {
    events_tx: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    sent: Mutex<Vec<(String, String)>>,
    next_message_id: AtomicU64,
    fail_sends: AtomicBool,
    fail_destroy: AtomicBool,
    destroyed: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a lifecycle event as the remote service would.
    ///
    /// Panics if the transport was never started.
    pub async fn emit(&self, event: TransportEvent) {
        let guard = self.events_tx.lock().await;
        let tx = guard.as_ref().expect("mock transport not started");
        // The registry may have shut down already; that is fine.
        let _ = tx.send(event).await;
    }

    /// Outbound messages captured so far, as `(to, body)` pairs.
    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Make subsequent `send_message` calls fail.
    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    /// Make `destroy` return an error.
    pub fn fail_destroy(&self) {
        self.fail_destroy.store(true, Ordering::SeqCst);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportAdapter for MockTransport {
    async fn start(&self, events: mpsc::Sender<TransportEvent>) -> Result<(), WagateError> {
        *self.events_tx.lock().await = Some(events);
        Ok(())
    }

    async fn send_message(&self, to: &str, body: &str) -> Result<String, WagateError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(WagateError::Transport {
                message: "mock send failure".to_string(),
                source: None,
            });
        }
        self.sent
            .lock()
            .await
            .push((to.to_string(), body.to_string()));
        let n = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("mock-msg-{n}"))
    }

    async fn destroy(&self) -> Result<(), WagateError> {
        self.destroyed.store(true, Ordering::SeqCst);
        if self.fail_destroy.load(Ordering::SeqCst) {
            return Err(WagateError::Transport {
                message: "mock destroy failure".to_string(),
                source: None,
            });
        }
        Ok(())
    }
}

/// Factory that hands out [`MockTransport`]s and remembers every one it
/// created, so tests can reach a session's transport by id even after the
/// registry has dropped it.
#[derive(Default)]
pub struct MockTransportFactory {
    created: DashMap<String, Arc<MockTransport>>,
    fail_create: AtomicBool,
}

impl MockTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `create` calls fail.
    pub fn fail_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    /// Look up the transport created for a session id.
    pub async fn transport_for(&self, session_id: &str) -> Option<Arc<MockTransport>> {
        self.created.get(session_id).map(|t| Arc::clone(&t))
    }

    pub fn created_count(&self) -> usize {
        self.created.len()
    }
}

impl TransportFactory for MockTransportFactory {
    fn create(&self, session_id: &str) -> Result<Arc<dyn TransportAdapter>, WagateError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(WagateError::Transport {
                message: "mock factory failure".to_string(),
                source: None,
            });
        }
        let transport = Arc::new(MockTransport::new());
        self.created
            .insert(session_id.to_string(), Arc::clone(&transport));
        Ok(transport)
    }
}
