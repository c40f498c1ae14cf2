// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Full-stack scenarios: registry, bus, dispatcher, and webhook receiver.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wagate_core::{ClientInfo, IncomingMessage, MessageKind, SessionStatus, TransportEvent};
use wagate_test_utils::{wait_until, TestStack};
use wagate_webhook::{DispatchSettings, WebhookDispatcher};

fn fast_settings() -> DispatchSettings {
    DispatchSettings {
        timeout: Duration::from_secs(2),
        backoff_base: Duration::from_millis(10),
    }
}

fn spawn_dispatcher(stack: &TestStack) -> CancellationToken {
    let cancel = CancellationToken::new();
    let dispatcher = Arc::new(
        WebhookDispatcher::new(stack.webhooks.clone(), stack.audit.clone(), fast_settings())
            .expect("dispatcher"),
    );
    dispatcher.spawn(&stack.bus, cancel.clone());
    cancel
}

fn client_info() -> ClientInfo {
    ClientInfo {
        platform: "android".into(),
        phone: "15550001111".into(),
        pushname: "Support".into(),
    }
}

async fn connect(stack: &TestStack, id: &str) {
    let transport = stack.factory.transport_for(id).await.expect("transport");
    transport.emit(TransportEvent::Ready(client_info())).await;
    let registry = stack.registry.clone();
    let id = id.to_string();
    assert!(
        wait_until(move || {
            registry
                .get(&id)
                .map(|s| s.status == SessionStatus::Connected)
                .unwrap_or(false)
        })
        .await,
        "session never connected"
    );
}

#[tokio::test]
async fn incoming_message_is_delivered_to_the_webhook() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("X-Webhook-Event", "message_received"))
        .and(body_partial_json(serde_json::json!({
            "event": "message_received",
            "data": {"body": "hello there"}
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let stack = TestStack::start();
    let cancel = spawn_dispatcher(&stack);

    let session = stack.registry.create("Support").await.unwrap();
    stack
        .webhooks
        .configure(&session.id, &format!("{}/hook", server.uri()), None);
    connect(&stack, &session.id).await;

    let transport = stack.factory.transport_for(&session.id).await.unwrap();
    transport
        .emit(TransportEvent::Message(IncomingMessage {
            id: "wa-msg-1".into(),
            from: "+1444".into(),
            to: "me".into(),
            body: "hello there".into(),
            kind: MessageKind::Text,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }))
        .await;

    let webhooks = stack.webhooks.clone();
    let id = session.id.clone();
    assert!(
        wait_until(move || {
            webhooks
                .get(&id)
                .map(|c| c.success_count == 1)
                .unwrap_or(false)
        })
        .await,
        "delivery never recorded"
    );

    let mut delivered = 0;
    for _ in 0..200 {
        delivered = stack.audit.count_by_kinds(&["webhook_delivered"]).await;
        if delivered == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(delivered, 1, "delivery never audited");

    cancel.cancel();
    server.verify().await;
}

#[tokio::test]
async fn outbound_sends_trigger_message_sent_deliveries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("X-Webhook-Event", "message_sent"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let stack = TestStack::start();
    let cancel = spawn_dispatcher(&stack);

    let session = stack.registry.create("Support").await.unwrap();
    stack.webhooks.configure(
        &session.id,
        &format!("{}/hook", server.uri()),
        Some(vec!["message_sent".into()]),
    );
    connect(&stack, &session.id).await;

    stack
        .registry
        .send_text(&session.id, "+1555", "hi")
        .await
        .unwrap();

    let webhooks = stack.webhooks.clone();
    let id = session.id.clone();
    assert!(
        wait_until(move || {
            webhooks
                .get(&id)
                .map(|c| c.success_count == 1)
                .unwrap_or(false)
        })
        .await
    );

    cancel.cancel();
    server.verify().await;
}

#[tokio::test]
async fn session_deletion_stops_future_deliveries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let stack = TestStack::start();
    let cancel = spawn_dispatcher(&stack);

    let session = stack.registry.create("Support").await.unwrap();
    stack
        .webhooks
        .configure(&session.id, &format!("{}/hook", server.uri()), None);
    let transport = stack.factory.transport_for(&session.id).await.unwrap();

    stack.registry.delete(&session.id).await;
    assert!(stack.webhooks.get(&session.id).is_none());

    // Stale transport traffic after deletion reaches neither the registry
    // nor the webhook.
    transport
        .emit(TransportEvent::Message(IncomingMessage {
            id: "late".into(),
            from: "+1444".into(),
            to: "me".into(),
            body: "too late".into(),
            kind: MessageKind::Text,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }))
        .await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    cancel.cancel();
    server.verify().await;
}

#[tokio::test]
async fn failed_deliveries_are_audited_with_error_severity() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let stack = TestStack::start();
    let cancel = spawn_dispatcher(&stack);

    let session = stack.registry.create("Support").await.unwrap();
    stack
        .webhooks
        .configure(&session.id, &format!("{}/hook", server.uri()), None);
    connect(&stack, &session.id).await;

    let transport = stack.factory.transport_for(&session.id).await.unwrap();
    transport
        .emit(TransportEvent::Message(IncomingMessage {
            id: "wa-msg-1".into(),
            from: "+1444".into(),
            to: "me".into(),
            body: "hello".into(),
            kind: MessageKind::Text,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }))
        .await;

    let mut failed = 0;
    for _ in 0..200 {
        failed = stack.audit.count_by_kinds(&["webhook_failed"]).await;
        if failed == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(failed, 1, "failure never audited");

    cancel.cancel();
    server.verify().await;
}
