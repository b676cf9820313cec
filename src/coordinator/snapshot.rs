//! Read surface of a coordinator.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::SyncError;
use crate::model::{ConnectionStatus, RankedVoteItem, SystemStatus, VoteItem};

/// Everything the presentation layer reads, published after every change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncSnapshot {
    /// Canonical items; `None` until the first load.
    pub vote_items: Option<Vec<VoteItem>>,
    /// Items ranked by descending total.
    pub leaderboard: Vec<RankedVoteItem>,
    /// Sum of `vote_total` over `vote_items`.
    pub total_votes: u64,
    pub is_loading: bool,
    /// Debounced status of the vote channel.
    pub connection_status: ConnectionStatus,
    #[serde(serialize_with = "error_message")]
    pub error: Option<SyncError>,
    /// Accepted realtime events.
    pub event_count: u64,
    pub last_event: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
    pub system_status: SystemStatus,
    pub smart_reconnect: bool,
    pub battery_saver: bool,
    pub polling_active: bool,
}

impl Default for SyncSnapshot {
    fn default() -> Self {
        Self {
            vote_items: None,
            leaderboard: Vec::new(),
            total_votes: 0,
            is_loading: false,
            connection_status: ConnectionStatus::Disconnected,
            error: None,
            event_count: 0,
            last_event: None,
            last_updated: None,
            system_status: SystemStatus::default(),
            smart_reconnect: false,
            battery_saver: false,
            polling_active: false,
        }
    }
}

fn error_message<S: serde::Serializer>(err: &Option<SyncError>, s: S) -> Result<S::Ok, S::Error> {
    match err {
        Some(e) => s.serialize_some(&e.to_string()),
        None => s.serialize_none(),
    }
}
