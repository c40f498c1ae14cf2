// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder can collect these metrics.

use metrics::{describe_counter, describe_gauge};

/// Register all Wagate metric descriptions.
///
/// Called once at startup.
pub fn register_metrics() {
    describe_counter!("wagate_messages_total", "Total messages observed");
    describe_gauge!("wagate_sessions_active", "Sessions currently connected");
    describe_gauge!("wagate_sessions_total", "Sessions tracked by the registry");
    describe_counter!(
        "wagate_webhook_deliveries_total",
        "Webhook delivery attempts by outcome"
    );
}

/// Record an observed message.
pub fn record_message(direction: &'static str) {
    metrics::counter!("wagate_messages_total", "direction" => direction).increment(1);
}

/// Set the number of connected sessions.
pub fn set_sessions_active(count: f64) {
    metrics::gauge!("wagate_sessions_active").set(count);
}

/// Set the total number of tracked sessions.
pub fn set_sessions_total(count: f64) {
    metrics::gauge!("wagate_sessions_total").set(count);
}

/// Record a webhook delivery outcome ("delivered", "failed", or "error").
pub fn record_webhook(outcome: &'static str) {
    metrics::counter!("wagate_webhook_deliveries_total", "outcome" => outcome).increment(1);
}
