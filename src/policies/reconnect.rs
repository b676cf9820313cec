//! # Reconnect policy for realtime channels.
//!
//! [`ReconnectPolicy`] decides **whether** a failed channel may try again and
//! **how long** it waits first.
//!
//! ```text
//! failure ──► fatal?            ──► rest in `error` (manual reconnect only)
//!         └─► attempts == max?  ──► rest in `disconnected` (polling takes over)
//!         └─► attempts += 1     ──► sleep(delay(attempts - 1, smart)) ──► connect
//! ```
//!
//! Smart reconnect uses the configured jitter; without it the same curve is
//! followed deterministically.

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Attempt budget and delay curve of a channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReconnectPolicy {
    /// Reconnect attempts allowed after a drop (`0` = give up immediately).
    pub max_attempts: u32,
    /// Delay curve.
    pub backoff: BackoffPolicy,
}

impl Default for ReconnectPolicy {
    /// `max_attempts = 5`, [`BackoffPolicy::default`].
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl ReconnectPolicy {
    /// Returns a copy with a different attempt budget.
    #[inline]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Returns `true` if another attempt is allowed after `attempts_used`.
    #[inline]
    pub fn allows(&self, attempts_used: u32) -> bool {
        attempts_used < self.max_attempts
    }

    /// Delay before the reconnect attempt with 0-based index `attempt`.
    pub fn delay(&self, attempt: u32, smart: bool) -> Duration {
        if smart {
            self.backoff.next(attempt)
        } else {
            self.backoff.without_jitter().next(attempt)
        }
    }
}
