//! Data model shared by every component.
//!
//! ## Contents
//! - [`VoteItem`], [`RankedVoteItem`], [`Artist`], [`VoteResults`] leaderboard data
//! - [`ConnectionStatus`], [`ConnectionInfo`] realtime channel state
//! - [`SystemStatus`], [`BatteryStatus`], [`ConnectionType`] host environment snapshot
//! - [`PerformanceMetrics`] diagnostic counters (never used for correctness)

mod connection;
mod metrics;
mod system;
mod vote;

pub use connection::{ConnectionInfo, ConnectionStatus};
pub use metrics::PerformanceMetrics;
pub use system::{BatteryStatus, ConnectionType, SystemStatus};
pub use vote::{Artist, ArtistId, GroupId, ItemId, RankedVoteItem, VoteId, VoteItem, VoteResults};
