// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide publish/subscribe fan-out for [`BusEvent`]s.
//!
//! A single-writer, multi-reader channel: `publish` delivers to every
//! observer subscribed at publish time; observers that subscribe later see
//! nothing from before their subscription (no buffering or replay). Ordering
//! is guaranteed per publish call, not across different event names from
//! different publishers.

use tokio::sync::broadcast;
use tracing::trace;

use wagate_core::BusEvent;

/// Default capacity of the underlying broadcast channel.
pub const DEFAULT_CAPACITY: usize = 256;

/// The in-process event bus.
///
/// Cheap to clone; all clones publish into the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BusEvent>,
}

impl EventBus {
    /// Create a bus with the given channel capacity.
    ///
    /// Slow observers that fall more than `capacity` events behind observe a
    /// `Lagged` error and skip ahead; they are never blocked on.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Returns the number of observers the event was delivered to. Publishing
    /// with no subscribers is a silent no-op.
    pub fn publish(&self, event: BusEvent) -> usize {
        let name = event.name();
        match self.tx.send(event) {
            Ok(count) => {
                trace!(event = name, observers = count, "bus publish");
                count
            }
            Err(_) => 0,
        }
    }

    /// Subscribe to all events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
