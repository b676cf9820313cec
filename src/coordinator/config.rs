//! # Coordinator configuration and observer callbacks.
//!
//! ## Sentinel values
//! - `polling_interval = 0s` → polling disabled
//! - `status_debounce = 0s` → statuses commit immediately
//! - `event_throttle = 0s` → every event merges immediately
//! - `load_timeout = 0s` → fetches are not bounded

use std::time::Duration;

use crate::error::SyncError;
use crate::model::{ConnectionStatus, VoteId, VoteItem};

/// Settings of one [`SyncCoordinator`](crate::SyncCoordinator).
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Vote whose leaderboard is synchronized.
    pub vote_id: VoteId,
    /// Optional artist vote channel opened alongside.
    pub artist_vote_id: Option<i64>,
    /// Start synchronizing immediately.
    pub enabled: bool,
    /// Base polling interval.
    pub polling_interval: Duration,
    /// Re-fetch authoritative data after a channel reconnects.
    pub enable_data_sync: bool,
    /// Reconnect attempts requested for channels this coordinator opens.
    pub max_retries: u32,
    pub enable_smart_reconnect: bool,
    /// Suspend channels while the page is hidden and slow polling on low battery.
    pub enable_battery_saver: bool,
    /// Use realtime channels (`false` = polling only).
    pub realtime: bool,
    /// Window collapsing bursts of status changes.
    pub status_debounce: Duration,
    /// Per-item window coalescing vote events.
    pub event_throttle: Duration,
    /// Upper bound on one fetch.
    pub load_timeout: Duration,
}

impl SyncConfig {
    /// Default configuration for `vote_id`:
    /// - enabled, realtime with smart reconnect and data sync
    /// - battery saver on
    /// - `polling_interval = 30s`, `max_retries = 5`
    /// - `status_debounce = 500ms`, `event_throttle = 1s`, `load_timeout = 10s`
    pub fn new(vote_id: VoteId) -> Self {
        Self {
            vote_id,
            artist_vote_id: None,
            enabled: true,
            polling_interval: Duration::from_secs(30),
            enable_data_sync: true,
            max_retries: 5,
            enable_smart_reconnect: true,
            enable_battery_saver: true,
            realtime: true,
            status_debounce: Duration::from_millis(500),
            event_throttle: Duration::from_secs(1),
            load_timeout: Duration::from_secs(10),
        }
    }

    #[inline]
    pub fn status_debounce(&self) -> Option<Duration> {
        non_zero(self.status_debounce)
    }

    #[inline]
    pub fn event_throttle(&self) -> Option<Duration> {
        non_zero(self.event_throttle)
    }

    #[inline]
    pub fn load_timeout(&self) -> Option<Duration> {
        non_zero(self.load_timeout)
    }
}

fn non_zero(d: Duration) -> Option<Duration> {
    (!d.is_zero()).then_some(d)
}

/// Callbacks of a coordinator. All methods default to no-ops.
///
/// Callbacks run on the coordinator task: keep them short. A panicking
/// callback is caught and logged.
pub trait SyncObserver: Send + Sync + 'static {
    /// Canonical items after an accepted realtime update.
    fn on_vote_update(&self, _items: &[VoteItem]) {}

    /// Debounced connection status changed.
    fn on_connection_status_change(&self, _status: ConnectionStatus) {}

    /// A fetch failed or a channel reported an error.
    fn on_error(&self, _error: &SyncError) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SyncObserver for NoopObserver {}
