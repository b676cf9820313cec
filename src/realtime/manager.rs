//! # ConnectionManager: reference-counted realtime channels.
//!
//! The manager owns one [`ChannelActor`] per [`Topic`] and hands out
//! [`ChannelLease`]s. The first lease on a topic spawns its actor; dropping the
//! last lease cancels it.
//!
//! ## Architecture
//! ```text
//! subscribe_to_vote(7) ──► channels[vote:7] (refs += 1) ──► ChannelActor::run(child_token)
//!                                  │                                │
//!                                  │ cmds (mpsc)                    ├──► events    listeners
//!                                  │ info (watch)                   ├──► statuses  listeners
//!                                  ▼                                └──► data_sync listeners
//!                            ChannelLease ──drop──► refs -= 1 ──(0)──► token.cancel()
//!
//! Bus ──► subscriber_listener ──► SubscriberSet (LogWriter, metrics, ...)
//! ```
//!
//! Listener registrations return a [`ListenerHandle`]; leases and handles are
//! independent, so a coordinator can drop them in any order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::config::ManagerConfig;
use crate::events::{Bus, Event, EventKind};
use crate::model::{ConnectionInfo, VoteId};
use crate::observers::ListenerHandle;
use crate::realtime::channel::{
    ChannelActor, ChannelCommand, ChannelParams, DataSync, Notifiers, StatusNotice,
};
use crate::realtime::{Topic, Transport, VoteEvent};
use crate::subscribers::{Subscribe, SubscriberSet};

const COMMAND_QUEUE: usize = 32;

/// Options of a channel subscription.
///
/// Options only take effect for the lease that opens the channel; later
/// leases on the same topic share the running channel as it is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Reconnect budget (`None` = the manager's default).
    pub max_reconnect_attempts: Option<u32>,
    /// Jittered, network-aware reconnection.
    pub smart_reconnect: bool,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: None,
            smart_reconnect: true,
        }
    }
}

struct ChannelEntry {
    refs: usize,
    cmds: mpsc::Sender<ChannelCommand>,
    info: watch::Receiver<ConnectionInfo>,
    token: CancellationToken,
}

struct Inner {
    transport: Arc<dyn Transport>,
    cfg: ManagerConfig,
    bus: Bus,
    notifiers: Arc<Notifiers>,
    channels: Mutex<HashMap<Topic, ChannelEntry>>,
    token: CancellationToken,
    _subs: Arc<SubscriberSet>,
}

impl Inner {
    fn channels(&self) -> MutexGuard<'_, HashMap<Topic, ChannelEntry>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, topic: Topic) {
        let mut channels = self.channels();
        let Some(entry) = channels.get_mut(&topic) else {
            return;
        };
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs > 0 {
            return;
        }
        if let Some(entry) = channels.remove(&topic) {
            entry.token.cancel();
            self.bus
                .publish(Event::new(EventKind::ChannelClosed).with_topic(topic.to_string()));
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Owner of every realtime channel of the process.
///
/// Cheap to clone; clones share the same channels and listeners.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Starts building a manager over `transport`.
    pub fn builder(transport: Arc<dyn Transport>) -> ConnectionManagerBuilder {
        ConnectionManagerBuilder {
            transport,
            cfg: ManagerConfig::default(),
            subscribers: Vec::new(),
        }
    }

    /// Opens (or joins) the channel of a vote.
    pub fn subscribe_to_vote(&self, vote_id: VoteId, opts: SubscribeOptions) -> ChannelLease {
        self.subscribe(Topic::Vote(vote_id), opts)
    }

    /// Opens (or joins) the channel of an artist vote.
    pub fn subscribe_to_artist_vote(&self, id: i64, opts: SubscribeOptions) -> ChannelLease {
        self.subscribe(Topic::ArtistVote(id), opts)
    }

    /// Opens (or joins) the channel of `topic`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe(&self, topic: Topic, opts: SubscribeOptions) -> ChannelLease {
        let mut channels = self.inner.channels();
        if let Some(entry) = channels.get_mut(&topic) {
            entry.refs += 1;
            return self.lease(topic, entry.cmds.clone());
        }

        let defaults = self.inner.cfg.reconnect;
        let policy =
            defaults.with_max_attempts(opts.max_reconnect_attempts.unwrap_or(defaults.max_attempts));
        let (info_tx, info_rx) = watch::channel(ConnectionInfo::new(policy.max_attempts));
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE);
        let token = self.inner.token.child_token();

        let actor = ChannelActor::new(
            ChannelParams {
                topic,
                policy,
                connect_timeout: self.inner.cfg.connect_timeout(),
                smart: opts.smart_reconnect,
            },
            Arc::clone(&self.inner.transport),
            Arc::clone(&self.inner.notifiers),
            info_tx,
            cmd_rx,
            self.inner.bus.clone(),
        );
        tokio::spawn(actor.run(token.clone()));
        self.inner
            .bus
            .publish(Event::new(EventKind::ChannelOpened).with_topic(topic.to_string()));

        channels.insert(
            topic,
            ChannelEntry {
                refs: 1,
                cmds: cmd_tx.clone(),
                info: info_rx,
                token,
            },
        );
        self.lease(topic, cmd_tx)
    }

    /// Releases a lease; same as dropping it.
    pub fn unsubscribe(&self, lease: ChannelLease) {
        drop(lease);
    }

    /// Manual reconnect of every channel not currently connected.
    pub fn manual_reconnect(&self) {
        for (topic, entry) in self.inner.channels().iter() {
            send(topic, &entry.cmds, ChannelCommand::Reconnect);
        }
    }

    /// Manual reconnect of one channel. Returns `false` if it is not open.
    pub fn reconnect(&self, topic: &Topic) -> bool {
        match self.inner.channels().get(topic) {
            Some(entry) => {
                send(topic, &entry.cmds, ChannelCommand::Reconnect);
                true
            }
            None => false,
        }
    }

    /// Forwards a host connectivity change to every channel.
    pub fn network_changed(&self, online: bool) {
        for (topic, entry) in self.inner.channels().iter() {
            send(topic, &entry.cmds, ChannelCommand::Network { online });
        }
    }

    /// Current state of a channel, `None` if it is not open.
    pub fn connection_status(&self, topic: &Topic) -> Option<ConnectionInfo> {
        self.inner
            .channels()
            .get(topic)
            .map(|entry| entry.info.borrow().clone())
    }

    /// Watch receiver following a channel's state.
    pub fn watch_status(&self, topic: &Topic) -> Option<watch::Receiver<ConnectionInfo>> {
        self.inner.channels().get(topic).map(|entry| entry.info.clone())
    }

    /// Registers a receiver of decoded vote events (`None` = every topic).
    pub fn add_event_listener(
        &self,
        scope: Option<Topic>,
        tx: mpsc::Sender<VoteEvent>,
    ) -> ListenerHandle {
        self.inner.notifiers.events.register(scope, tx)
    }

    /// Registers a receiver of connection state changes (`None` = every topic).
    pub fn add_status_listener(
        &self,
        scope: Option<Topic>,
        tx: mpsc::Sender<StatusNotice>,
    ) -> ListenerHandle {
        self.inner.notifiers.statuses.register(scope, tx)
    }

    /// Registers a receiver of resync requests for one vote channel.
    pub fn add_data_sync_callback(
        &self,
        vote_id: VoteId,
        tx: mpsc::Sender<DataSync>,
    ) -> ListenerHandle {
        self.inner
            .notifiers
            .data_sync
            .register(Some(Topic::Vote(vote_id)), tx)
    }

    /// Closes every channel. Outstanding leases become inert.
    pub fn disconnect(&self) {
        let drained: Vec<(Topic, ChannelEntry)> = self.inner.channels().drain().collect();
        for (topic, entry) in drained {
            entry.token.cancel();
            self.inner
                .bus
                .publish(Event::new(EventKind::ChannelClosed).with_topic(topic.to_string()));
        }
        tracing::debug!("connection manager disconnected");
    }

    /// Number of open channels.
    pub fn channel_count(&self) -> usize {
        self.inner.channels().len()
    }

    /// Total number of registered listeners across all tables.
    pub fn listener_count(&self) -> usize {
        let n = &self.inner.notifiers;
        n.events.len() + n.statuses.len() + n.data_sync.len()
    }

    /// Suggested queue size for listener channels.
    pub fn listener_capacity(&self) -> usize {
        self.inner.cfg.listener_capacity_clamped()
    }

    /// Event bus shared by the manager and coordinators built on it.
    pub fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    fn lease(&self, topic: Topic, cmds: mpsc::Sender<ChannelCommand>) -> ChannelLease {
        ChannelLease {
            topic,
            cmds,
            manager: Arc::downgrade(&self.inner),
        }
    }
}

fn send(topic: &Topic, cmds: &mpsc::Sender<ChannelCommand>, cmd: ChannelCommand) {
    if let Err(e) = cmds.try_send(cmd) {
        tracing::warn!(%topic, ?cmd, "channel command dropped: {e}");
    }
}

/// Shared ownership of one open channel.
///
/// Dropping the lease releases the reference; the last release closes the channel.
#[must_use = "dropping the lease releases the channel"]
pub struct ChannelLease {
    topic: Topic,
    cmds: mpsc::Sender<ChannelCommand>,
    manager: Weak<Inner>,
}

impl ChannelLease {
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Manual reconnect of this channel.
    pub fn reconnect(&self) {
        send(&self.topic, &self.cmds, ChannelCommand::Reconnect);
    }

    /// Closes the transport and rests in `suspended`.
    pub fn suspend(&self) {
        send(&self.topic, &self.cmds, ChannelCommand::Suspend);
    }

    /// Leaves `suspended` through a manual reconnect.
    pub fn resume(&self) {
        send(&self.topic, &self.cmds, ChannelCommand::Resume);
    }

    pub fn set_smart_reconnect(&self, on: bool) {
        send(&self.topic, &self.cmds, ChannelCommand::SmartReconnect(on));
    }

    /// Reports host connectivity to this channel.
    pub fn network_changed(&self, online: bool) {
        send(&self.topic, &self.cmds, ChannelCommand::Network { online });
    }

    /// Current state of the channel, `None` once the manager closed it.
    pub fn status(&self) -> Option<ConnectionInfo> {
        let inner = self.manager.upgrade()?;
        let channels = inner.channels();
        channels.get(&self.topic).map(|e| e.info.borrow().clone())
    }
}

impl Drop for ChannelLease {
    fn drop(&mut self) {
        if let Some(inner) = self.manager.upgrade() {
            inner.release(self.topic);
        }
    }
}

impl std::fmt::Debug for ChannelLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelLease").field("topic", &self.topic).finish()
    }
}

/// Builder for a [`ConnectionManager`].
pub struct ConnectionManagerBuilder {
    transport: Arc<dyn Transport>,
    cfg: ManagerConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl ConnectionManagerBuilder {
    pub fn with_config(mut self, cfg: ManagerConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets event subscribers (logging, metrics, ...).
    ///
    /// Each subscriber gets a dedicated worker with a bounded queue.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the manager. Must be called from within a tokio runtime.
    pub fn build(self) -> ConnectionManager {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let token = CancellationToken::new();

        if !subs.is_empty() {
            subscriber_listener(&bus, Arc::clone(&subs), token.clone());
        }

        ConnectionManager {
            inner: Arc::new(Inner {
                transport: self.transport,
                notifiers: Arc::new(Notifiers::new(&bus)),
                cfg: self.cfg,
                bus,
                channels: Mutex::new(HashMap::new()),
                token,
                _subs: subs,
            }),
        }
    }
}

/// Forwards bus events to the subscriber set until `token` is cancelled.
fn subscriber_listener(bus: &Bus, set: Arc<SubscriberSet>, token: CancellationToken) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                ev = rx.recv() => match ev {
                    Ok(ev) => set.emit(&ev),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "subscriber listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    });
}
