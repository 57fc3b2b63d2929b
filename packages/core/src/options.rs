//! Tunables for lease expiry and polling.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::QueueError;

/// Configuration for dequeue behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueOptions {
    /// Milliseconds a lease hides an entry before it becomes eligible again.
    pub invisibility_timeout_ms: u64,
    /// Milliseconds to wait between scans when no entry is eligible.
    pub poll_interval_ms: u64,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            invisibility_timeout_ms: 300_000, // 5 minutes
            poll_interval_ms: 200,
        }
    }
}

impl QueueOptions {
    /// Set the invisibility window.
    pub fn with_invisibility_timeout(mut self, timeout: Duration) -> Self {
        self.invisibility_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// The invisibility window.
    pub fn invisibility_timeout(&self) -> Duration {
        Duration::from_millis(self.invisibility_timeout_ms)
    }

    /// The polling interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), QueueError> {
        if self.poll_interval_ms == 0 {
            return Err(QueueError::InvalidArgument {
                name: "poll_interval_ms",
                reason: "polling interval must be positive",
            });
        }
        Ok(())
    }
}
