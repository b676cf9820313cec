//! # SyncCoordinator: one vote's canonical leaderboard.
//!
//! A coordinator combines the realtime channels of a [`ConnectionManager`]
//! with polling and on-demand fetches of a [`VoteResultsSource`] into one
//! [`SyncSnapshot`], published on a `watch` channel after every change.
//!
//! ```text
//! SyncCoordinator (handle) ──Command──► CoordinatorActor (task) ──► watch<SyncSnapshot>
//!        │                                   ▲        ▲
//!        │                 ConnectionManager ┘        └ PollingFallback / fetches
//!        └── snapshot() / watch() / performance_metrics()
//! ```
//!
//! Dropping the handle (or [`SyncCoordinator::shutdown`]) stops the task,
//! releases its channel leases and unregisters its listeners. No observer
//! callback runs after that.

mod actor;
mod config;
mod snapshot;
mod state;

#[cfg(test)]
mod tests;

pub use config::{NoopObserver, SyncConfig, SyncObserver};
pub use snapshot::SyncSnapshot;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::{ArtistCache, ArtistDirectory};
use crate::error::SyncError;
use crate::fetch::VoteResultsSource;
use crate::model::{PerformanceMetrics, RankedVoteItem};
use crate::realtime::ConnectionManager;
use crate::system::{HostProbe, HostSignal, NoProbe, SystemStatusMonitor};

use actor::{Collaborators, Command, CoordinatorActor};

const COMMAND_CAPACITY: usize = 32;

#[derive(Default)]
struct RenderStats {
    count: u64,
    last: Option<Duration>,
}

/// Handle of a running coordinator.
pub struct SyncCoordinator {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<SyncSnapshot>,
    renders: Mutex<RenderStats>,
    token: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl SyncCoordinator {
    /// Starts building a coordinator for `cfg.vote_id`.
    pub fn builder(
        manager: ConnectionManager,
        source: Arc<dyn VoteResultsSource>,
        cfg: SyncConfig,
    ) -> SyncCoordinatorBuilder {
        SyncCoordinatorBuilder {
            manager,
            source,
            cfg,
            observer: Arc::new(NoopObserver),
            probe: Arc::new(NoProbe),
            signals: None,
            artists: None,
        }
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SyncSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified on every published snapshot.
    pub fn watch(&self) -> watch::Receiver<SyncSnapshot> {
        self.snapshot.clone()
    }

    /// Diagnostic counters. Never used for correctness.
    pub fn performance_metrics(&self) -> PerformanceMetrics {
        let renders = self.renders.lock().unwrap_or_else(PoisonError::into_inner);
        let snap = self.snapshot.borrow();
        let memory = snap.leaderboard.len() * std::mem::size_of::<RankedVoteItem>();
        PerformanceMetrics {
            render_count: renders.count,
            memory_usage: Some(memory as u64),
            event_count: snap.event_count,
            last_render_time: renders.last,
        }
    }

    /// Records one render of the presentation layer.
    pub fn record_render(&self, took: Duration) {
        let mut renders = self.renders.lock().unwrap_or_else(PoisonError::into_inner);
        renders.count += 1;
        renders.last = Some(took);
    }

    /// Restarts every channel of this coordinator with a fresh attempt budget.
    pub async fn manual_reconnect(&self) -> Result<(), SyncError> {
        self.send(Command::ManualReconnect).await
    }

    /// Fetches authoritative results now and replaces the item set with them.
    ///
    /// A fetch already in flight completes first; the refresh request is
    /// issued right after it. Concurrent calls share one refresh request.
    ///
    /// # Errors
    /// - the fetch error
    /// - [`SyncError::Disabled`] while sync is disabled
    /// - [`SyncError::Closed`] after shutdown
    pub async fn refresh_data(&self) -> Result<(), SyncError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Refresh(tx)).await?;
        rx.await.map_err(|_| SyncError::Closed)?
    }

    /// Flips smart reconnect; returns the new setting.
    pub async fn toggle_smart_reconnect(&self) -> Result<bool, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::ToggleSmartReconnect(tx)).await?;
        rx.await.map_err(|_| SyncError::Closed)
    }

    /// Flips battery saver; returns the new setting.
    ///
    /// Fails with [`SyncError::Unsupported`] and changes nothing when the
    /// host reports no battery.
    pub async fn toggle_battery_saver(&self) -> Result<bool, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::ToggleBatterySaver(tx)).await?;
        rx.await.map_err(|_| SyncError::Closed)?
    }

    /// Enables or disables sync. Disabling releases channels and stops polling.
    pub async fn set_enabled(&self, enabled: bool) -> Result<(), SyncError> {
        self.send(Command::SetEnabled(enabled)).await
    }

    /// Stops the coordinator and waits for its task to finish.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                tracing::error!(error = %e, "coordinator task failed");
            }
        }
    }

    async fn send(&self, cmd: Command) -> Result<(), SyncError> {
        self.commands.send(cmd).await.map_err(|_| SyncError::Closed)
    }
}

impl Drop for SyncCoordinator {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Builder for a [`SyncCoordinator`].
pub struct SyncCoordinatorBuilder {
    manager: ConnectionManager,
    source: Arc<dyn VoteResultsSource>,
    cfg: SyncConfig,
    observer: Arc<dyn SyncObserver>,
    probe: Arc<dyn HostProbe>,
    signals: Option<mpsc::Receiver<HostSignal>>,
    artists: Option<(Arc<ArtistCache>, Arc<dyn ArtistDirectory>)>,
}

impl SyncCoordinatorBuilder {
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Host capabilities read once at start.
    pub fn with_probe(mut self, probe: Arc<dyn HostProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Stream of host changes (online, network type, visibility, battery).
    pub fn with_host_signals(mut self, signals: mpsc::Receiver<HostSignal>) -> Self {
        self.signals = Some(signals);
        self
    }

    /// Enriches items with artist profiles from `directory`, cached in `cache`.
    pub fn with_artists(
        mut self,
        cache: Arc<ArtistCache>,
        directory: Arc<dyn ArtistDirectory>,
    ) -> Self {
        self.artists = Some((cache, directory));
        self
    }

    /// Spawns the coordinator. Must be called from within a tokio runtime.
    pub fn build(self) -> SyncCoordinator {
        let token = CancellationToken::new();
        let monitor = SystemStatusMonitor::new(self.probe.as_ref(), self.manager.bus().clone());
        let system = monitor.subscribe();
        let monitor = match self.signals {
            Some(signals) => {
                monitor.spawn_listener(signals, token.clone());
                None
            }
            None => Some(monitor),
        };

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (snap_tx, snap_rx) = watch::channel(SyncSnapshot::default());
        let actor = CoordinatorActor::new(
            self.cfg,
            Collaborators {
                manager: self.manager,
                source: self.source,
                observer: self.observer,
                artists: self.artists,
            },
            system,
            monitor,
            cmd_rx,
            snap_tx,
            token.clone(),
        );
        let join = tokio::spawn(actor.run());

        SyncCoordinator {
            commands: cmd_tx,
            snapshot: snap_rx,
            renders: Mutex::new(RenderStats::default()),
            token,
            join: Some(join),
        }
    }
}
