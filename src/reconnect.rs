use std::time::Duration;

use log::{error, info};

/// Bounded retry of client initialization after a connectivity fault.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 3;
/// Single-shot delay before each attempt.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Tracks reconnect attempts. The counter resets only on an explicit
/// successful connect; after the bound is hit the supervisor stays in the
/// terminal failed state until then.
#[derive(Debug, Default)]
pub struct ReconnectSupervisor {
    attempts: u32,
}

impl ReconnectSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the next attempt slot, or `None` once the bound is exhausted.
    pub fn next_attempt(&mut self) -> Option<u32> {
        if self.attempts >= MAX_RECONNECT_ATTEMPTS {
            error!("Max reconnection attempts reached");
            return None;
        }
        self.attempts += 1;
        info!(
            "Attempting to reconnect to Spotify (attempt {}/{})",
            self.attempts, MAX_RECONNECT_ATTEMPTS
        );
        Some(self.attempts)
    }

    pub fn exhausted(&self) -> bool {
        self.attempts >= MAX_RECONNECT_ATTEMPTS
    }

    pub fn record_success(&mut self) {
        self.attempts = 0;
    }
}
