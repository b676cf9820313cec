//! # CoordinatorActor: single writer of the sync state.
//!
//! Every input of a coordinator (commands, realtime events, status notices,
//! fetch outcomes, timers, host changes) arrives at one task and is handled
//! sequentially, so merges never race.
//!
//! ## Inputs
//! ```text
//! SyncCoordinator ──Command──────────────┐
//! ConnectionManager ──VoteEvent──────────┤
//!                   ──StatusNotice───────┤ (errors)
//!                   ──watch<Info>────────┤ (status)
//!                   ──DataSync───────────┤
//! Fetcher (initial/refresh/poll/resync) ─┼──► next_input() ──► handler ──► SyncState ──► watch<SyncSnapshot>
//! ArtistResolver ──(id, Option<Artist>)──┤
//! Scheduler ──Timer (throttle/debounce)──┤
//! SystemStatusMonitor ──watch────────────┘
//! ```
//!
//! ## Session
//! Enabling builds a `Session`: listener handles, channel leases, the poller,
//! the artist resolver, the timers and the receivers of everything above.
//! Disabling (or shutting down) drops it in one step, which unregisters every
//! listener, releases every lease and cancels every timer and fetch. Inputs
//! queued for a dropped session are discarded with its receivers.
//!
//! ## Status
//! The committed status follows the vote channel's `watch<ConnectionInfo>`,
//! which always holds the latest state even when notices were dropped. Status
//! notices are only used to report channel errors.
//!
//! ## Authoritative fetches
//! At most one fetch runs at a time. A refresh or resync that finds one in
//! flight is queued and issued as soon as it completes; refresh waiters are
//! answered only by the outcome of a refresh request.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::select;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::cache::{ArtistCache, ArtistDirectory, ArtistResolver};
use crate::coordinator::state::{Merge, SyncState};
use crate::coordinator::{SyncConfig, SyncObserver, SyncSnapshot};
use crate::error::SyncError;
use crate::events::{Bus, Event, EventKind};
use crate::fetch::{FetchKind, FetchOutcome, VoteResultsSource};
use crate::model::{
    Artist, ArtistId, ConnectionInfo, ConnectionStatus, ItemId, SystemStatus, VoteItem,
};
use crate::observers::ListenerHandle;
use crate::polling::{Fetcher, PollPlan, PollingFallback};
use crate::realtime::{
    ChannelLease, ConnectionManager, DataSync, StatusNotice, SubscribeOptions, Topic, VoteEvent,
};
use crate::scheduler::Scheduler;
use crate::subscribers::panic_message;
use crate::system::SystemStatusMonitor;

/// Request from a [`SyncCoordinator`](crate::SyncCoordinator) handle.
pub(crate) enum Command {
    ManualReconnect,
    Refresh(oneshot::Sender<Result<(), SyncError>>),
    ToggleSmartReconnect(oneshot::Sender<bool>),
    ToggleBatterySaver(oneshot::Sender<Result<bool, SyncError>>),
    SetEnabled(bool),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Timer {
    Throttle(ItemId),
    StatusDebounce,
}

enum Input {
    Command(Command),
    Event(VoteEvent),
    Notice(StatusNotice),
    Status,
    DataSync(DataSync),
    Fetched(FetchOutcome),
    Artist(ArtistId, Option<Artist>),
    Timer(Timer),
    System,
    Stop,
}

/// Collaborators handed over by the builder.
pub(crate) struct Collaborators {
    pub manager: ConnectionManager,
    pub source: Arc<dyn VoteResultsSource>,
    pub observer: Arc<dyn SyncObserver>,
    pub artists: Option<(Arc<ArtistCache>, Arc<dyn ArtistDirectory>)>,
}

/// Everything that exists only while sync is enabled.
struct Session {
    events: mpsc::Receiver<VoteEvent>,
    notices: mpsc::Receiver<StatusNotice>,
    status: Option<watch::Receiver<ConnectionInfo>>,
    data_sync: mpsc::Receiver<DataSync>,
    fetched: mpsc::Receiver<FetchOutcome>,
    artists: mpsc::Receiver<(ArtistId, Option<Artist>)>,
    timers: Scheduler<Timer>,
    throttled: HashMap<ItemId, (VoteItem, DateTime<Utc>)>,
    seen_status: ConnectionStatus,
    pending_status: Option<ConnectionStatus>,
    refresh_waiters: Vec<oneshot::Sender<Result<(), SyncError>>>,
    refresh_request: Option<u64>,
    queued: Option<FetchKind>,
    polling: PollingFallback,
    resolver: Option<ArtistResolver>,
    leases: Vec<ChannelLease>,
    event_handle: Option<ListenerHandle>,
    _handles: Vec<ListenerHandle>,
    token: CancellationToken,
}

impl Session {
    /// Starts an authoritative fetch, or queues it behind the one in flight.
    ///
    /// A queued refresh absorbs a queued resync.
    fn start_fetch(&mut self, kind: FetchKind) {
        match self.polling.fetch_now(kind) {
            Some(request) if kind == FetchKind::Refresh => self.refresh_request = Some(request),
            Some(_) => {}
            None if self.queued == Some(FetchKind::Refresh) => {}
            None => self.queued = Some(kind),
        }
    }

    fn refresh_pending(&self) -> bool {
        self.refresh_request.is_some() || self.queued == Some(FetchKind::Refresh)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

pub(crate) struct CoordinatorActor {
    cfg: SyncConfig,
    topic: Topic,
    name: Arc<str>,
    deps: Collaborators,
    bus: Bus,
    state: SyncState,
    committed: ConnectionStatus,
    smart: bool,
    battery_saver: bool,
    suspended: bool,
    system_status: SystemStatus,
    system: watch::Receiver<SystemStatus>,
    _monitor: Option<SystemStatusMonitor>,
    session: Option<Session>,
    commands: mpsc::Receiver<Command>,
    snapshot: watch::Sender<SyncSnapshot>,
    token: CancellationToken,
}

impl CoordinatorActor {
    pub fn new(
        cfg: SyncConfig,
        deps: Collaborators,
        system: watch::Receiver<SystemStatus>,
        monitor: Option<SystemStatusMonitor>,
        commands: mpsc::Receiver<Command>,
        snapshot: watch::Sender<SyncSnapshot>,
        token: CancellationToken,
    ) -> Self {
        let topic = Topic::Vote(cfg.vote_id);
        let system_status = system.borrow().clone();
        Self {
            topic,
            name: Arc::from(topic.to_string()),
            bus: deps.manager.bus().clone(),
            state: SyncState::new(cfg.vote_id),
            committed: ConnectionStatus::Disconnected,
            smart: cfg.enable_smart_reconnect,
            battery_saver: cfg.enable_battery_saver,
            suspended: false,
            system_status,
            system,
            _monitor: monitor,
            session: None,
            commands,
            snapshot,
            token,
            deps,
            cfg,
        }
    }

    /// Runs until the handle is dropped or shut down.
    pub async fn run(mut self) {
        self.apply_suspension();
        if self.cfg.enabled {
            self.enable();
        }
        self.publish();

        loop {
            match self.next_input().await {
                Input::Stop => break,
                Input::Command(cmd) => self.on_command(cmd),
                Input::Event(ev) => self.on_event(ev),
                Input::Notice(notice) => self.on_notice(notice),
                Input::Status => self.on_status(),
                Input::DataSync(DataSync::Resync { .. }) => self.on_resync(),
                Input::Fetched(outcome) => self.on_fetched(outcome),
                Input::Artist(id, artist) => self.on_artist(id, artist),
                Input::Timer(timer) => self.on_timer(timer),
                Input::System => self.on_system(),
            }
        }
        self.session = None;
        tracing::debug!(topic = %self.name, "coordinator stopped");
    }

    async fn next_input(&mut self) -> Input {
        let Some(s) = self.session.as_mut() else {
            return select! {
                biased;
                _ = self.token.cancelled() => Input::Stop,
                cmd = self.commands.recv() => cmd.map_or(Input::Stop, Input::Command),
                Ok(()) = self.system.changed() => Input::System,
            };
        };
        select! {
            biased;
            _ = self.token.cancelled() => Input::Stop,
            cmd = self.commands.recv() => cmd.map_or(Input::Stop, Input::Command),
            Some(timer) = s.timers.expired(), if !s.timers.is_empty() => Input::Timer(timer),
            Ok(()) = changed(&mut s.status) => Input::Status,
            Some(notice) = s.notices.recv() => Input::Notice(notice),
            Some(ev) = s.events.recv() => Input::Event(ev),
            Some(outcome) = s.fetched.recv() => Input::Fetched(outcome),
            Some(req) = s.data_sync.recv() => Input::DataSync(req),
            Some((id, artist)) = s.artists.recv() => Input::Artist(id, artist),
            Ok(()) = self.system.changed() => Input::System,
        }
    }

    // ---- lifecycle ----

    fn enable(&mut self) {
        let manager = &self.deps.manager;
        let cap = manager.listener_capacity();
        let token = self.token.child_token();
        let (ev_tx, events) = mpsc::channel(cap);
        let (st_tx, notices) = mpsc::channel(cap);
        let (ds_tx, data_sync) = mpsc::channel(cap);
        let (fetch_tx, fetched) = mpsc::channel(cap);
        let (artist_tx, artists) = mpsc::channel(cap);

        let mut handles = Vec::new();
        let mut leases = Vec::new();
        let mut event_handle = None;
        let mut status = None;
        if self.cfg.realtime {
            event_handle = Some(manager.add_event_listener(Some(self.topic), ev_tx));
            handles.push(manager.add_status_listener(Some(self.topic), st_tx));
            if self.cfg.enable_data_sync {
                handles.push(manager.add_data_sync_callback(self.cfg.vote_id, ds_tx));
            }
            let opts = SubscribeOptions {
                max_reconnect_attempts: Some(self.cfg.max_retries),
                smart_reconnect: self.smart,
            };
            leases.push(manager.subscribe_to_vote(self.cfg.vote_id, opts));
            status = manager.watch_status(&self.topic);
            if let Some(rx) = status.as_mut() {
                rx.mark_changed();
            }
            if let Some(id) = self.cfg.artist_vote_id {
                leases.push(manager.subscribe_to_artist_vote(id, opts));
            }
            for lease in &leases {
                if !self.system_status.is_online {
                    lease.network_changed(false);
                }
                if self.suspended {
                    lease.suspend();
                }
            }
        }

        let fetcher = Fetcher::new(
            Arc::clone(&self.deps.source),
            self.cfg.vote_id,
            self.cfg.load_timeout(),
            fetch_tx,
            self.bus.clone(),
            token.clone(),
        );
        let polling = PollingFallback::spawn(fetcher);
        let resolver = self.deps.artists.as_ref().map(|(cache, directory)| {
            ArtistResolver::new(
                Arc::clone(cache),
                Arc::clone(directory),
                artist_tx,
                token.clone(),
            )
        });

        self.state = SyncState::new(self.cfg.vote_id);
        self.state.is_loading = polling.fetch_now(FetchKind::Initial).is_some();
        self.committed = ConnectionStatus::Disconnected;
        self.session = Some(Session {
            events,
            notices,
            status,
            data_sync,
            fetched,
            artists,
            timers: Scheduler::new(),
            throttled: HashMap::new(),
            seen_status: ConnectionStatus::Disconnected,
            pending_status: None,
            refresh_waiters: Vec::new(),
            refresh_request: None,
            queued: None,
            polling,
            resolver,
            leases,
            event_handle,
            _handles: handles,
            token,
        });
        self.replan();
        tracing::debug!(topic = %self.name, realtime = self.cfg.realtime, "sync enabled");
    }

    fn disable(&mut self) {
        if let Some(mut s) = self.session.take() {
            for waiter in std::mem::take(&mut s.refresh_waiters) {
                let _ = waiter.send(Err(SyncError::Disabled));
            }
        }
        self.state = SyncState::new(self.cfg.vote_id);
        self.committed = ConnectionStatus::Disconnected;
        tracing::debug!(topic = %self.name, "sync disabled");
    }

    // ---- handlers ----

    fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::ManualReconnect => {
                for lease in self.leases() {
                    lease.reconnect();
                }
                self.state.error = None;
            }
            Command::Refresh(reply) => {
                let Some(s) = self.session.as_mut() else {
                    let _ = reply.send(Err(SyncError::Disabled));
                    return;
                };
                // one refresh request answers every waiter that arrived before it completed
                if !s.refresh_pending() {
                    s.start_fetch(FetchKind::Refresh);
                }
                s.refresh_waiters.push(reply);
                self.state.is_loading = true;
            }
            Command::ToggleSmartReconnect(reply) => {
                self.smart = !self.smart;
                for lease in self.leases() {
                    lease.set_smart_reconnect(self.smart);
                }
                let _ = reply.send(self.smart);
            }
            Command::ToggleBatterySaver(reply) => {
                if !self.system_status.battery.is_supported() {
                    let _ = reply.send(Err(SyncError::Unsupported {
                        capability: "battery",
                    }));
                    return;
                }
                self.battery_saver = !self.battery_saver;
                self.apply_suspension();
                self.replan();
                let _ = reply.send(Ok(self.battery_saver));
            }
            Command::SetEnabled(on) => match (on, self.session.is_some()) {
                (true, false) => self.enable(),
                (false, true) => self.disable(),
                _ => {}
            },
        }
        self.publish();
    }

    fn on_event(&mut self, ev: VoteEvent) {
        if ev.topic != self.topic || ev.item.vote_id != self.cfg.vote_id {
            tracing::trace!(topic = %ev.topic, item = ev.item.id, "event for another vote ignored");
            return;
        }
        let Some(s) = self.session.as_mut() else {
            return;
        };
        if s.event_handle.as_ref().is_some_and(ListenerHandle::take_overflow) {
            tracing::warn!(topic = %self.name, "vote events dropped, resyncing");
            s.start_fetch(FetchKind::Resync);
        }
        let Some(window) = self.cfg.event_throttle() else {
            self.merge(ev.item, ev.received_at);
            return;
        };
        let id = ev.item.id;
        if s.timers.schedule_if_absent(Timer::Throttle(id), window) {
            self.merge(ev.item, ev.received_at);
            return;
        }
        match s.throttled.get_mut(&id) {
            Some((held, _)) if ev.item.vote_total < held.vote_total => {}
            Some(slot) => *slot = (ev.item, ev.received_at),
            None => {
                s.throttled.insert(id, (ev.item, ev.received_at));
            }
        }
    }

    fn on_notice(&mut self, notice: StatusNotice) {
        let error_bearing = matches!(
            notice.status,
            ConnectionStatus::Error | ConnectionStatus::NetworkError
        );
        if let Some(err) = notice.info.last_error.filter(|_| error_bearing) {
            self.notify("on_error", |o| o.on_error(&err));
            self.state.error = Some(err);
            self.publish();
        }
    }

    fn on_status(&mut self) {
        let Some(s) = self.session.as_mut() else {
            return;
        };
        let Some(info) = s.status.as_mut().map(|rx| rx.borrow_and_update().clone()) else {
            return;
        };
        if info.status == s.seen_status {
            return;
        }
        s.seen_status = info.status;
        if info.status == ConnectionStatus::Disconnected && info.attempts_exhausted() {
            tracing::info!(
                topic = %self.name,
                attempts = info.reconnect_attempts,
                "realtime gave up, polling takes over"
            );
        }

        match self.cfg.status_debounce() {
            Some(window) => {
                s.pending_status = Some(info.status);
                s.timers.schedule(Timer::StatusDebounce, window);
            }
            None => self.commit_status(info.status),
        }
    }

    fn on_timer(&mut self, timer: Timer) {
        let Some(s) = self.session.as_mut() else {
            return;
        };
        match timer {
            Timer::StatusDebounce => {
                if let Some(status) = s.pending_status.take() {
                    self.commit_status(status);
                }
            }
            Timer::Throttle(id) => {
                let Some((item, at)) = s.throttled.remove(&id) else {
                    return;
                };
                if let Some(window) = self.cfg.event_throttle() {
                    s.timers.schedule_if_absent(Timer::Throttle(id), window);
                }
                self.merge(item, at);
            }
        }
    }

    fn on_resync(&mut self) {
        if !self.cfg.enable_data_sync {
            return;
        }
        if let Some(s) = self.session.as_mut() {
            s.start_fetch(FetchKind::Resync);
        }
    }

    fn on_fetched(&mut self, outcome: FetchOutcome) {
        let FetchOutcome {
            request,
            kind,
            result,
        } = outcome;
        let reply = result.as_ref().map(|_| ()).map_err(Clone::clone);
        let answers = self.session.as_mut().is_some_and(|s| {
            let own = s.refresh_request == Some(request);
            if own {
                s.refresh_request = None;
            }
            own
        });

        if !self.state.accept_request(request) {
            self.bus.publish(
                Event::new(EventKind::StaleResultDropped)
                    .with_topic(Arc::clone(&self.name))
                    .with_request(request),
            );
        } else {
            match result {
                Ok(results) => {
                    self.state.apply_results(kind, results);
                    self.bus.publish(
                        Event::new(EventKind::SnapshotApplied)
                            .with_topic(Arc::clone(&self.name))
                            .with_request(request)
                            .with_reason(kind.as_str()),
                    );
                    self.enrich();
                }
                Err(err) => {
                    self.bus.publish(
                        Event::new(EventKind::FetchFailed)
                            .with_topic(Arc::clone(&self.name))
                            .with_request(request)
                            .with_reason(err.to_string()),
                    );
                    self.notify("on_error", |o| o.on_error(&err));
                    self.state.fail(err);
                }
            }
        }
        if let Some(s) = self.session.as_mut() {
            if let Some(kind) = s.queued.take() {
                s.start_fetch(kind);
            }
            if s.refresh_pending() {
                self.state.is_loading = true;
            }
        }
        self.publish();

        if let Some(s) = self.session.as_mut().filter(|_| answers) {
            for waiter in s.refresh_waiters.drain(..) {
                let _ = waiter.send(reply.clone());
            }
        }
    }

    fn on_artist(&mut self, id: ArtistId, artist: Option<Artist>) {
        if let Some(resolver) = self.session.as_mut().and_then(|s| s.resolver.as_mut()) {
            resolver.finish(id);
        }
        if artist.is_some_and(|artist| self.state.set_artist(id, &artist)) {
            self.publish();
        }
    }

    fn on_system(&mut self) {
        let status = self.system.borrow_and_update().clone();
        let online_changed = status.is_online != self.system_status.is_online;
        self.system_status = status;
        if online_changed {
            for lease in self.leases() {
                lease.network_changed(self.system_status.is_online);
            }
        }
        self.apply_suspension();
        self.replan();
        self.publish();
    }

    // ---- helpers ----

    fn merge(&mut self, item: VoteItem, at: DateTime<Utc>) {
        let (id, total) = (item.id, item.vote_total);
        match self.state.merge_event(item, at) {
            Merge::Applied => {
                self.bus.publish(
                    Event::new(EventKind::VoteMerged)
                        .with_topic(Arc::clone(&self.name))
                        .with_vote(id, total),
                );
                self.enrich();
                self.publish();
                let items = self.state.items();
                self.notify("on_vote_update", |o| o.on_vote_update(items));
            }
            Merge::Regressed { current } => {
                self.bus.publish(
                    Event::new(EventKind::VoteDiscarded)
                        .with_topic(Arc::clone(&self.name))
                        .with_vote(id, total)
                        .with_reason(format!("below merged total {current}")),
                );
            }
            Merge::Foreign => {}
        }
    }

    fn commit_status(&mut self, status: ConnectionStatus) {
        if status == self.committed {
            return;
        }
        self.committed = status;
        self.bus.publish(
            Event::new(EventKind::StatusCommitted)
                .with_topic(Arc::clone(&self.name))
                .with_reason(status.as_str()),
        );
        self.notify("on_connection_status_change", |o| {
            o.on_connection_status_change(status)
        });
        self.replan();
        self.publish();
    }

    /// Resolves missing artist profiles; cached ones attach immediately.
    fn enrich(&mut self) {
        let Some(resolver) = self.session.as_mut().and_then(|s| s.resolver.as_mut()) else {
            return;
        };
        for id in self.state.missing_artists() {
            if let Some(artist) = resolver.resolve(id) {
                self.state.set_artist(id, &artist);
            }
        }
    }

    fn saver_active(&self) -> bool {
        self.battery_saver && self.system_status.battery.is_supported()
    }

    fn apply_suspension(&mut self) {
        let suspend = self.saver_active() && !self.system_status.is_page_visible;
        if suspend == self.suspended {
            return;
        }
        self.suspended = suspend;
        for lease in self.leases() {
            if suspend {
                lease.suspend();
            } else {
                lease.resume();
            }
        }
    }

    fn replan(&self) {
        let Some(s) = &self.session else {
            return;
        };
        let wanted = !self.cfg.realtime || self.committed.is_degraded();
        s.polling.set_plan(PollPlan::compute(
            self.cfg.polling_interval,
            wanted,
            &self.system_status,
            self.saver_active(),
            self.suspended,
        ));
    }

    fn leases(&self) -> &[ChannelLease] {
        self.session.as_ref().map_or(&[], |s| s.leases.as_slice())
    }

    fn publish(&self) {
        let next = SyncSnapshot {
            vote_items: self.state.vote_items().map(<[VoteItem]>::to_vec),
            leaderboard: self.state.leaderboard.clone(),
            total_votes: self.state.total_votes,
            is_loading: self.state.is_loading,
            connection_status: self.committed,
            error: self.state.error.clone(),
            event_count: self.state.event_count,
            last_event: self.state.last_event,
            last_updated: self.state.last_updated,
            system_status: self.system_status.clone(),
            smart_reconnect: self.smart,
            battery_saver: self.saver_active(),
            polling_active: self
                .session
                .as_ref()
                .is_some_and(|s| s.polling.plan().active),
        };
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    /// Runs an observer callback, containing panics.
    fn notify(&self, callback: &'static str, f: impl FnOnce(&dyn SyncObserver)) {
        let observer = self.deps.observer.as_ref();
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| f(observer))) {
            let info = panic_message(panic.as_ref());
            tracing::error!(topic = %self.name, callback, %info, "sync observer panicked");
        }
    }
}

/// Resolves on the next status change; never resolves without a receiver.
async fn changed(
    rx: &mut Option<watch::Receiver<ConnectionInfo>>,
) -> Result<(), watch::error::RecvError> {
    match rx {
        Some(rx) => rx.changed().await,
        None => std::future::pending().await,
    }
}
