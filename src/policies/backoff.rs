//! # Backoff policy for reconnect attempts.
//!
//! [`BackoffPolicy`] controls how the delay before a reconnect attempt grows
//! after repeated channel failures:
//! - [`BackoffPolicy::first`] the delay before the first reconnect;
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::max`] the maximum delay cap.
//!
//! The delay for attempt `n` (0-indexed) is `first × factor^n`, clamped to `max`,
//! then jitter is applied. The base is derived from the attempt number only, so
//! jitter never feeds back into later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use votesync::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(500),
//!     max: Duration::from_secs(5),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(500));
//! assert_eq!(backoff.next(2), Duration::from_secs(2));
//! assert_eq!(backoff.next(8), Duration::from_secs(5));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Reconnect backoff policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first reconnect attempt.
    pub first: Duration,
    /// Maximum delay cap.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Jitter policy to spread reconnects of many clients.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Returns exponential backoff with:
    /// - `first = 1s`;
    /// - `factor = 2.0`;
    /// - `max = 30s`;
    /// - `jitter = Equal`.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(1),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::Equal,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay for the given attempt number (0-indexed).
    ///
    /// The base delay is `first × factor^attempt`, clamped to [`BackoffPolicy::max`];
    /// non-finite or negative intermediate values clamp to `max` as well.
    pub fn next(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let clamped_exp = attempt.min(i32::MAX as u32) as i32;
        let unclamped_secs = self.first.as_secs_f64() * self.factor.powi(clamped_exp);

        let base =
            if !unclamped_secs.is_finite() || unclamped_secs < 0.0 || unclamped_secs > max_secs {
                self.max
            } else {
                Duration::from_secs_f64(unclamped_secs)
            };

        match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.first.min(self.max), base, self.max)
            }
            _ => self.jitter.apply(base),
        }
    }

    /// Same growth curve with jitter disabled (deterministic delays).
    #[inline]
    pub fn without_jitter(self) -> Self {
        Self {
            jitter: JitterPolicy::None,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact(first_ms: u64, max_ms: u64, factor: f64) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(first_ms),
            max: Duration::from_millis(max_ms),
            factor,
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn test_doubles_per_attempt_until_cap() {
        let policy = exact(250, 3_000, 2.0);
        let delays: Vec<u128> = (0..6).map(|n| policy.next(n).as_millis()).collect();
        assert_eq!(delays, vec![250, 500, 1_000, 2_000, 3_000, 3_000]);
    }

    #[test]
    fn test_constant_factor_keeps_first() {
        let policy = exact(700, 10_000, 1.0);
        assert!((0..20).all(|n| policy.next(n) == Duration::from_millis(700)));
    }

    #[test]
    fn test_first_above_max_is_capped() {
        assert_eq!(exact(9_000, 4_000, 2.0).next(0), Duration::from_millis(4_000));
    }

    #[test]
    fn test_overflowing_exponent_clamps_to_max() {
        assert_eq!(exact(100, 60_000, 2.0).next(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_equal_jitter_stays_in_upper_half() {
        let policy = BackoffPolicy::default();
        for attempt in 0..12 {
            let base = policy.without_jitter().next(attempt);
            let delay = policy.next(attempt);
            assert!(delay <= base, "attempt {attempt}: {delay:?} > {base:?}");
            assert!(delay >= base / 2, "attempt {attempt}: {delay:?} < half of {base:?}");
        }
    }

    #[test]
    fn test_without_jitter_is_deterministic() {
        let policy = BackoffPolicy::default().without_jitter();
        assert_eq!(policy.jitter, JitterPolicy::None);
        assert_eq!(policy.next(3), policy.next(3));
        assert_eq!(policy.next(3), Duration::from_secs(8));
    }
}
