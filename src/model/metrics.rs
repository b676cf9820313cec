use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Diagnostic counters exposed next to the sync snapshot.
///
/// `render_count` and `last_render_time` come from the presentation layer
/// (see [`SyncCoordinator::record_render`](crate::SyncCoordinator::record_render));
/// `memory_usage` is an estimate of the leaderboard footprint in bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub render_count: u64,
    pub memory_usage: Option<u64>,
    pub event_count: u64,
    pub last_render_time: Option<Duration>,
}
