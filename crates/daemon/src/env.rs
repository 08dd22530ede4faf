// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::time::Duration;

/// Control connection read timeout override
pub fn read_timeout() -> Duration {
    std::env::var("MCMDD_READ_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(crate::protocol::READ_TIMEOUT)
}

/// Stop-to-kill poll interval override
pub fn stop_poll_interval() -> Duration {
    std::env::var("MCMDD_STOP_POLL_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(100))
}
