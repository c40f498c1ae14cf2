// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test doubles and wiring helpers shared across Wagate crates.

pub mod harness;
pub mod mock_transport;

pub use harness::TestStack;
pub use mock_transport::{MockTransport, MockTransportFactory};

use std::time::Duration;

/// Poll `check` every 10ms until it returns true or two seconds pass.
pub async fn wait_until<F>(check: F) -> bool
where
    F: Fn() -> bool,
{
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
