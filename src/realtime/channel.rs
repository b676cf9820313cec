//! # ChannelActor: one realtime channel and its state machine.
//!
//! Each open topic is driven by one actor task. The actor owns the receiving
//! side of the transport, decodes payloads and walks the connection state
//! machine, publishing every transition to the status listeners and the bus.
//!
//! ## State machine
//! ```text
//!                  ┌──────────── manual reconnect / resume ─────────────┐
//!                  ▼                                                    │
//! disconnected ─► connecting ──ok──► connected ──drop──► reconnecting   │
//!                  │                    ▲                    │          │
//!                  │                    └───────ok───────────┤          │
//!                  │                                         │          │
//!                  └──err──► error / network_error ──────────┤          │
//!                                                            │          │
//!             fatal (auth) ──► error (parked) ───────────────┼──────────┤
//!             attempts == max ──► disconnected (parked) ─────┘──────────┤
//!             suspend ──► suspended (parked) ───────────────────────────┘
//! ```
//!
//! ## Phases
//! The actor loop moves between four phases:
//! - `Connect`: one bounded `Transport::open` attempt;
//! - `Live`: reading the open channel;
//! - `Backoff`: waiting before the next attempt;
//! - `Parked`: idle until a command moves it (fatal, exhausted, suspended, offline).
//!
//! Commands are accepted in every phase, so suspend and manual reconnect never
//! wait for a pending connect or sleep.
//!
//! ## Rules
//! - `reconnect_attempts` never exceeds the policy budget.
//! - A manual reconnect or resume resets `reconnect_attempts` to 0.
//! - A fatal error stays parked through suspend and resume; only a manual
//!   reconnect leaves it.
//! - Smart reconnect parks the channel while the host is offline instead of
//!   spending attempts; coming back online reconnects it immediately.
//! - After any successful reconnect, data-sync listeners get a
//!   [`DataSync::Resync`] because updates may have been missed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::{
    select,
    sync::{mpsc, watch},
    time,
};
use tokio_util::sync::CancellationToken;

use crate::error::SyncError;
use crate::events::{Bus, Event, EventKind};
use crate::model::{ConnectionInfo, ConnectionStatus};
use crate::observers::Listeners;
use crate::policies::ReconnectPolicy;
use crate::realtime::{ChannelMessage, ChannelRx, Topic, Transport, VoteEvent};

/// A connection state change of one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusNotice {
    pub topic: Topic,
    pub status: ConnectionStatus,
    /// Full channel state after the change.
    pub info: ConnectionInfo,
}

/// Request to re-fetch authoritative data for a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSync {
    /// The channel reconnected and may have missed updates.
    Resync { topic: Topic },
}

/// Listener tables shared by the manager and its channel actors.
pub(crate) struct Notifiers {
    pub events: Listeners<Topic, VoteEvent>,
    pub statuses: Listeners<Topic, StatusNotice>,
    pub data_sync: Listeners<Topic, DataSync>,
}

impl Notifiers {
    pub fn new(bus: &Bus) -> Self {
        Self {
            events: Listeners::new("vote_events", bus.clone()),
            statuses: Listeners::new("status_notices", bus.clone()),
            data_sync: Listeners::new("data_sync", bus.clone()),
        }
    }
}

/// Command sent to a channel actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChannelCommand {
    /// Manual reconnect: reset attempts and connect now.
    Reconnect,
    /// Close the channel and rest in `suspended`.
    Suspend,
    /// Leave `suspended` through the manual reconnect path.
    Resume,
    /// Toggle jittered, network-aware reconnection.
    SmartReconnect(bool),
    /// Host connectivity changed.
    Network { online: bool },
}

/// Per-channel parameters.
#[derive(Clone, Debug)]
pub(crate) struct ChannelParams {
    pub topic: Topic,
    pub policy: ReconnectPolicy,
    pub connect_timeout: Option<Duration>,
    pub smart: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Park {
    Fatal,
    Exhausted,
    Suspended,
    Offline,
}

enum Phase {
    Connect,
    Live(ChannelRx),
    Backoff(Duration),
    Parked(Park),
}

/// Drives one realtime channel.
pub(crate) struct ChannelActor {
    topic: Topic,
    name: Arc<str>,
    policy: ReconnectPolicy,
    connect_timeout: Option<Duration>,
    smart: bool,
    online: bool,
    connected_once: bool,
    transport: Arc<dyn Transport>,
    notifiers: Arc<Notifiers>,
    info: watch::Sender<ConnectionInfo>,
    cmds: mpsc::Receiver<ChannelCommand>,
    bus: Bus,
}

impl ChannelActor {
    pub fn new(
        params: ChannelParams,
        transport: Arc<dyn Transport>,
        notifiers: Arc<Notifiers>,
        info: watch::Sender<ConnectionInfo>,
        cmds: mpsc::Receiver<ChannelCommand>,
        bus: Bus,
    ) -> Self {
        Self {
            topic: params.topic,
            name: Arc::from(params.topic.to_string()),
            policy: params.policy,
            connect_timeout: params.connect_timeout,
            smart: params.smart,
            online: true,
            connected_once: false,
            transport,
            notifiers,
            info,
            cmds,
            bus,
        }
    }

    /// Runs the channel until `token` is cancelled or the command sender is dropped.
    pub async fn run(mut self, token: CancellationToken) {
        let mut phase = Phase::Connect;
        loop {
            let next = match phase {
                Phase::Connect => self.connect(&token).await,
                Phase::Live(rx) => self.live(rx, &token).await,
                Phase::Backoff(delay) => self.backoff(delay, &token).await,
                Phase::Parked(park) => self.parked(park, &token).await,
            };
            match next {
                Some(p) => phase = p,
                None => break,
            }
        }
        self.info
            .send_modify(|info| info.status = ConnectionStatus::Disconnected);
    }

    async fn connect(&mut self, token: &CancellationToken) -> Option<Phase> {
        let attempt = self.info.borrow().reconnect_attempts;
        if attempt == 0 {
            self.transition(ConnectionStatus::Connecting, |_| {});
        }
        self.publish(Event::new(EventKind::ChannelConnecting).with_attempt(attempt));

        let open = open_channel(Arc::clone(&self.transport), self.topic, self.connect_timeout);
        tokio::pin!(open);
        loop {
            select! {
                _ = token.cancelled() => return None,
                res = &mut open => {
                    return Some(match res {
                        Ok(rx) => self.on_connected(rx),
                        Err(e) => self.on_failure(e),
                    });
                }
                cmd = self.cmds.recv() => match cmd? {
                    ChannelCommand::Reconnect => return Some(self.manual_reconnect()),
                    ChannelCommand::Suspend => return Some(self.suspend()),
                    other => self.absorb(other),
                },
            }
        }
    }

    async fn live(&mut self, mut rx: ChannelRx, token: &CancellationToken) -> Option<Phase> {
        loop {
            select! {
                _ = token.cancelled() => return None,
                msg = rx.recv() => match msg {
                    Some(ChannelMessage::Payload(raw)) => self.deliver(raw),
                    Some(ChannelMessage::Error(e)) => return Some(self.on_failure(e)),
                    None => return Some(self.on_failure(SyncError::transport("channel closed"))),
                },
                cmd = self.cmds.recv() => match cmd? {
                    ChannelCommand::Suspend => return Some(self.suspend()),
                    other => self.absorb(other),
                },
            }
        }
    }

    async fn backoff(&mut self, delay: Duration, token: &CancellationToken) -> Option<Phase> {
        let sleep = time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            select! {
                _ = token.cancelled() => return None,
                _ = &mut sleep => return Some(Phase::Connect),
                cmd = self.cmds.recv() => match cmd? {
                    ChannelCommand::Reconnect => return Some(self.manual_reconnect()),
                    ChannelCommand::Suspend => return Some(self.suspend()),
                    ChannelCommand::Network { online: false } if self.smart => {
                        self.online = false;
                        return Some(self.park_offline());
                    }
                    other => self.absorb(other),
                },
            }
        }
    }

    async fn parked(&mut self, park: Park, token: &CancellationToken) -> Option<Phase> {
        loop {
            select! {
                _ = token.cancelled() => return None,
                cmd = self.cmds.recv() => match (cmd?, park) {
                    (ChannelCommand::Reconnect, _) => return Some(self.manual_reconnect()),
                    (ChannelCommand::Resume, Park::Suspended) => return Some(self.manual_reconnect()),
                    // a fatal channel is already closed and only leaves through manual reconnect
                    (ChannelCommand::Suspend, p) if !matches!(p, Park::Suspended | Park::Fatal) => {
                        return Some(self.suspend());
                    }
                    (ChannelCommand::Network { online: true }, Park::Offline | Park::Exhausted)
                        if self.smart =>
                    {
                        self.online = true;
                        return Some(self.manual_reconnect());
                    }
                    (ChannelCommand::SmartReconnect(false), Park::Offline) => {
                        self.smart = false;
                        return Some(self.manual_reconnect());
                    }
                    (other, _) => self.absorb(other),
                },
            }
        }
    }

    /// Applies a command that does not change the phase.
    fn absorb(&mut self, cmd: ChannelCommand) {
        match cmd {
            ChannelCommand::SmartReconnect(on) => self.smart = on,
            ChannelCommand::Network { online } => self.online = online,
            ChannelCommand::Reconnect | ChannelCommand::Resume | ChannelCommand::Suspend => {}
        }
    }

    fn deliver(&self, raw: serde_json::Value) {
        match VoteEvent::decode(self.topic, raw) {
            Ok(ev) => self.notifiers.events.emit(&self.topic, &ev),
            Err(e) => self.publish(Event::new(EventKind::PayloadRejected).with_reason(e.to_string())),
        }
    }

    fn on_connected(&mut self, rx: ChannelRx) -> Phase {
        let resync = self.connected_once;
        self.connected_once = true;
        self.transition(ConnectionStatus::Connected, |info| {
            info.reconnect_attempts = 0;
            info.last_connected = Some(Utc::now());
            info.last_error = None;
        });
        self.publish(Event::new(EventKind::ChannelConnected));
        if resync {
            self.notifiers
                .data_sync
                .emit(&self.topic, &DataSync::Resync { topic: self.topic });
        }
        Phase::Live(rx)
    }

    fn on_failure(&mut self, err: SyncError) -> Phase {
        let used = self.info.borrow().reconnect_attempts;
        self.publish(
            Event::new(EventKind::ChannelFailed)
                .with_reason(err.to_string())
                .with_attempt(used),
        );

        let status = if err.is_network() {
            ConnectionStatus::NetworkError
        } else {
            ConnectionStatus::Error
        };
        let fatal = err.is_fatal();
        let reason = err.to_string();
        self.transition(status, |info| info.last_error = Some(err));

        if fatal {
            self.publish(Event::new(EventKind::ChannelFatal).with_reason(reason));
            return Phase::Parked(Park::Fatal);
        }
        if self.smart && !self.online {
            return self.park_offline();
        }
        if !self.policy.allows(used) {
            self.transition(ConnectionStatus::Disconnected, |_| {});
            self.publish(Event::new(EventKind::ReconnectExhausted).with_attempt(used));
            return Phase::Parked(Park::Exhausted);
        }

        let attempt = used + 1;
        let delay = self.policy.delay(used, self.smart);
        self.transition(ConnectionStatus::Reconnecting, |info| {
            info.reconnect_attempts = attempt;
        });
        self.publish(
            Event::new(EventKind::ReconnectScheduled)
                .with_attempt(attempt)
                .with_delay(delay)
                .with_reason(reason),
        );
        Phase::Backoff(delay)
    }

    fn manual_reconnect(&mut self) -> Phase {
        self.info.send_modify(|info| {
            info.reconnect_attempts = 0;
            info.last_error = None;
        });
        Phase::Connect
    }

    fn suspend(&mut self) -> Phase {
        self.transition(ConnectionStatus::Suspended, |_| {});
        self.publish(Event::new(EventKind::ChannelSuspended));
        Phase::Parked(Park::Suspended)
    }

    fn park_offline(&mut self) -> Phase {
        self.transition(ConnectionStatus::NetworkError, |info| {
            info.last_error = Some(SyncError::network("host offline"));
        });
        Phase::Parked(Park::Offline)
    }

    /// Updates the shared info and notifies status listeners.
    fn transition(&self, status: ConnectionStatus, apply: impl FnOnce(&mut ConnectionInfo)) {
        self.info.send_modify(|info| {
            info.status = status;
            apply(info);
        });
        let info = self.info.borrow().clone();
        self.notifiers.statuses.emit(
            &self.topic,
            &StatusNotice {
                topic: self.topic,
                status,
                info,
            },
        );
    }

    fn publish(&self, ev: Event) {
        self.bus.publish(ev.with_topic(Arc::clone(&self.name)));
    }
}

/// One bounded connect attempt.
async fn open_channel(
    transport: Arc<dyn Transport>,
    topic: Topic,
    timeout: Option<Duration>,
) -> Result<ChannelRx, SyncError> {
    match timeout {
        Some(limit) => match time::timeout(limit, transport.open(&topic)).await {
            Ok(res) => res,
            Err(_elapsed) => Err(SyncError::Timeout { timeout: limit }),
        },
        None => transport.open(&topic).await,
    }
}
