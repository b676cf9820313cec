//! # votesync
//!
//! **votesync** keeps a live vote leaderboard in sync with its backend.
//!
//! It combines push updates from realtime channels with polling and
//! on-demand fetches, merges both into one canonical list of vote items, and
//! degrades to polling when realtime is unavailable. The host application
//! supplies the transport, the results API and (optionally) host signals;
//! the crate owns the state machines, the merge rules and the scheduling.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   Transport (user)          VoteResultsSource (user)        HostProbe / HostSignal (user)
//!        │                            │                                │
//!        ▼                            │                                ▼
//! ┌───────────────────────────┐       │                     ┌──────────────────────┐
//! │ ConnectionManager         │       │                     │ SystemStatusMonitor  │
//! │ - one ChannelActor/topic  │       │                     │ (watch<SystemStatus>)│
//! │ - leases (refcounted)     │       │                     └──────────┬───────────┘
//! │ - listener tables         │       │                                │
//! └──────┬─────────┬──────────┘       │                                │
//!        │ events  │ statuses         │ fetches                        │
//!        ▼         ▼                  ▼                                ▼
//! ┌───────────────────────────────────────────────────────────────────────────────┐
//! │ SyncCoordinator (one task per vote)                                           │
//! │ - throttled merge (monotonic totals)    - debounced status                    │
//! │ - PollingFallback (single flight)       - battery saver / suspension          │
//! │ - ArtistCache enrichment                - SyncObserver callbacks              │
//! └──────────────────────────────────┬────────────────────────────────────────────┘
//!                                    ▼
//!                           watch<SyncSnapshot>  ──► presentation layer
//!
//! every component ──► Bus (broadcast Event) ──► subscriber_listener ──► SubscriberSet ──► Subscribe::on_event
//! ```
//!
//! ### Merge rules
//! - A realtime update never lowers an item's total.
//! - Polls add and update items, never remove them.
//! - Initial loads, refreshes and resyncs replace membership; surviving
//!   items keep the highest total seen.
//! - Results of a request older than the last applied one are dropped.
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                                   |
//! |-------------------|----------------------------------------------------------|------------------------------------------------------|
//! | **Realtime**      | Refcounted channels with reconnection state machines.    | [`ConnectionManager`], [`Transport`], [`ChannelLease`]|
//! | **Coordination**  | One canonical leaderboard per vote.                      | [`SyncCoordinator`], [`SyncSnapshot`], [`SyncObserver`]|
//! | **Policies**      | Reconnect budget, backoff and jitter.                    | [`ReconnectPolicy`], [`BackoffPolicy`], [`JitterPolicy`]|
//! | **Host state**    | Online, network type, visibility and battery.            | [`SystemStatusMonitor`], [`HostProbe`], [`HostSignal`]|
//! | **Events**        | Diagnostic event stream for logging and metrics.         | [`Bus`], [`Event`], [`Subscribe`]                    |
//! | **Errors**        | One cloneable error type.                                | [`SyncError`]                                        |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] subscriber.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use votesync::{
//!     ChannelRx, ConnectionManager, SyncConfig, SyncCoordinator, SyncError, Topic, Transport,
//!     VoteId, VoteItem, VoteResults, VoteResultsSource,
//! };
//!
//! struct Offline;
//!
//! #[async_trait]
//! impl Transport for Offline {
//!     async fn open(&self, _topic: &Topic) -> Result<ChannelRx, SyncError> {
//!         Err(SyncError::network("no socket in this example"))
//!     }
//! }
//!
//! struct Api;
//!
//! #[async_trait]
//! impl VoteResultsSource for Api {
//!     async fn load_vote_results(&self, vote_id: VoteId) -> Result<VoteResults, SyncError> {
//!         Ok(VoteResults::from_items(vec![VoteItem::new(1, vote_id, 42)]))
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), SyncError> {
//!     let manager = ConnectionManager::builder(Arc::new(Offline)).build();
//!     let sync = SyncCoordinator::builder(manager, Arc::new(Api), SyncConfig::new(7)).build();
//!
//!     sync.refresh_data().await?;
//!     assert_eq!(sync.snapshot().total_votes, 42);
//!
//!     sync.shutdown().await;
//!     Ok(())
//! }
//! ```
mod cache;
mod config;
mod coordinator;
mod error;
mod events;
mod fetch;
mod model;
mod observers;
mod policies;
mod polling;
mod ranking;
mod realtime;
mod scheduler;
mod subscribers;
mod system;

#[cfg(test)]
mod fakes;

// ---- Public re-exports ----

pub use cache::{ArtistCache, ArtistDirectory};
pub use config::ManagerConfig;
pub use coordinator::{
    NoopObserver, SyncConfig, SyncCoordinator, SyncCoordinatorBuilder, SyncObserver, SyncSnapshot,
};
pub use error::SyncError;
pub use events::{Bus, Event, EventCategory, EventKind};
pub use fetch::{FetchKind, FetchOutcome, VoteResultsSource};
pub use model::{
    Artist, ArtistId, BatteryStatus, ConnectionInfo, ConnectionStatus, ConnectionType, GroupId,
    ItemId, PerformanceMetrics, RankedVoteItem, SystemStatus, VoteId, VoteItem, VoteResults,
};
pub use observers::ListenerHandle;
pub use policies::{BackoffPolicy, JitterPolicy, ReconnectPolicy};
pub use polling::PollPlan;
pub use ranking::rank;
pub use realtime::{
    ChannelLease, ChannelMessage, ChannelRx, ConnectionManager, ConnectionManagerBuilder,
    DataSync, StatusNotice, SubscribeOptions, Topic, Transport, VoteEvent, VoteEventKind,
    WirePayload,
};
pub use subscribers::{Subscribe, SubscriberSet};
pub use system::{HostProbe, HostSignal, NoProbe, SystemStatusMonitor};

// Optional: expose a simple built-in logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
