//! # Connection manager configuration.
//!
//! [`ManagerConfig`] holds the settings shared by every channel a
//! [`ConnectionManager`](crate::ConnectionManager) opens.
//!
//! ## Sentinel values
//! - `connect_timeout = 0s` → connect attempts are not bounded
//! - `bus_capacity` and `listener_capacity` are clamped to at least 1

use std::time::Duration;

use crate::policies::ReconnectPolicy;

/// Settings of the realtime connection layer.
///
/// ## Field semantics
/// - `bus_capacity`: event bus ring buffer size
/// - `listener_capacity`: suggested queue size for listener channels
/// - `connect_timeout`: bound on a single connect attempt (`0s` = unbounded)
/// - `reconnect`: default attempt budget and delay curve; a subscriber may
///   request a different attempt budget when it opens a channel
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// Capacity of the event bus broadcast channel.
    ///
    /// Subscribers lagging more than this many events skip older ones.
    pub bus_capacity: usize,

    /// Queue size callers should use for listener channels.
    pub listener_capacity: usize,

    /// Upper bound on one connect attempt. A timeout counts as a network error.
    pub connect_timeout: Duration,

    /// Default reconnect policy for channels.
    pub reconnect: ReconnectPolicy,
}

impl ManagerConfig {
    /// Returns the connect timeout as an `Option` (`None` when zero).
    #[inline]
    pub fn connect_timeout(&self) -> Option<Duration> {
        if self.connect_timeout == Duration::ZERO {
            None
        } else {
            Some(self.connect_timeout)
        }
    }

    /// Bus capacity clamped to at least 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Listener capacity clamped to at least 1.
    #[inline]
    pub fn listener_capacity_clamped(&self) -> usize {
        self.listener_capacity.max(1)
    }
}

impl Default for ManagerConfig {
    /// Default configuration:
    /// - `bus_capacity = 1024`
    /// - `listener_capacity = 256`
    /// - `connect_timeout = 10s`
    /// - `reconnect = ReconnectPolicy::default()` (5 attempts, 1s..30s backoff)
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            listener_capacity: 256,
            connect_timeout: Duration::from_secs(10),
            reconnect: ReconnectPolicy::default(),
        }
    }
}
