// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Full-stack wiring for scenario tests.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use wagate_audit::ActivityLog;
use wagate_bus::EventBus;
use wagate_session::SessionRegistry;
use wagate_webhook::WebhookStore;

use crate::mock_transport::MockTransportFactory;

/// Bus, audit log, webhook store, and a running session registry wired over a
/// [`MockTransportFactory`]. Dropping the stack cancels the registry loop.
pub struct TestStack {
    pub bus: EventBus,
    pub audit: Arc<ActivityLog>,
    pub webhooks: Arc<WebhookStore>,
    pub registry: Arc<SessionRegistry>,
    pub factory: Arc<MockTransportFactory>,
    pub cancel: CancellationToken,
}

impl TestStack {
    pub fn start() -> Self {
        let bus = EventBus::default();
        let audit = Arc::new(ActivityLog::new(1000, bus.clone()));
        let webhooks = Arc::new(WebhookStore::new(0));
        let factory = Arc::new(MockTransportFactory::new());
        let registry = Arc::new(SessionRegistry::new(
            factory.clone(),
            bus.clone(),
            audit.clone(),
            webhooks.clone(),
        ));
        let cancel = CancellationToken::new();
        tokio::spawn(registry.clone().run(cancel.clone()));
        Self {
            bus,
            audit,
            webhooks,
            registry,
            factory,
            cancel,
        }
    }
}

impl Drop for TestStack {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
