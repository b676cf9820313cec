//! # Runtime events emitted by the sync engine.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Channel events**: realtime state machine (connecting, connected, failed, backoff, exhausted)
//! - **Merge events**: vote updates accepted or discarded by the coordinator
//! - **Fetch events**: polling/refresh outcomes (applied, skipped, failed, stale)
//! - **Subscriber events**: delivery problems of observers and subscribers
//!
//! The [`Event`] struct carries additional metadata such as timestamps, topic,
//! reasons, attempt numbers and backoff delays.
//!
//! ## Ordering guarantees
//! Each event gets a sequence number from the [`Bus`](crate::events::Bus) it is
//! published on. The sequence increases monotonically per bus; use it to restore
//! publish order when subscribers observe events out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use votesync::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ReconnectScheduled)
//!     .with_topic("vote:7")
//!     .with_reason("socket reset")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_secs(4));
//!
//! assert_eq!(ev.kind, EventKind::ReconnectScheduled);
//! assert_eq!(ev.topic.as_deref(), Some("vote:7"));
//! assert_eq!(ev.delay_ms, Some(4_000));
//! ```

use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `topic`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `topic`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    /// A registered listener could not take a notification (queue full).
    ///
    /// Sets:
    /// - `topic`: listener table name
    /// - `reason`: reason string
    ListenerOverflow,

    // === Channel lifecycle ===
    /// First lease on a topic opened its channel.
    ///
    /// Sets: `topic`
    ChannelOpened,

    /// Last lease released; the channel actor was stopped.
    ///
    /// Sets: `topic`
    ChannelClosed,

    /// Connect attempt started.
    ///
    /// Sets: `topic`, `attempt` (reconnect attempt, 0 for the first connect)
    ChannelConnecting,

    /// Channel is live.
    ///
    /// Sets: `topic`
    ChannelConnected,

    /// Channel failed (open error, channel error or unexpected close).
    ///
    /// Sets: `topic`, `reason`, `attempt`
    ChannelFailed,

    /// Next reconnect attempt scheduled.
    ///
    /// Sets: `topic`, `attempt` (the attempt about to run), `delay_ms`, `reason`
    ReconnectScheduled,

    /// Reconnect attempts exhausted; channel rests in `disconnected`.
    ///
    /// Sets: `topic`, `attempt`
    ReconnectExhausted,

    /// Fatal failure; channel rests in `error` until a manual reconnect.
    ///
    /// Sets: `topic`, `reason`
    ChannelFatal,

    /// Channel suspended (page hidden with battery saver).
    ///
    /// Sets: `topic`
    ChannelSuspended,

    /// Payload rejected by the decoder and discarded.
    ///
    /// Sets: `topic`, `reason`
    PayloadRejected,

    // === Merge events ===
    /// Vote update merged into the canonical list.
    ///
    /// Sets: `topic`, `item`, `total`
    VoteMerged,

    /// Vote update discarded by the monotonic guard.
    ///
    /// Sets: `topic`, `item`, `total` (incoming), `reason`
    VoteDiscarded,

    // === Fetch events ===
    /// Aggregate fetch result applied.
    ///
    /// Sets: `topic`, `request`, `reason` (fetch kind)
    SnapshotApplied,

    /// Aggregate fetch failed; last-known-good state kept.
    ///
    /// Sets: `topic`, `request`, `reason`
    FetchFailed,

    /// Fetch result superseded by a newer request and dropped.
    ///
    /// Sets: `topic`, `request`
    StaleResultDropped,

    /// Poll tick skipped because a fetch was still in flight.
    ///
    /// Sets: `topic`
    PollSkipped,

    // === Coordinator events ===
    /// Debounced connection status became observable.
    ///
    /// Sets: `topic`, `reason` (status name)
    StatusCommitted,

    /// Host environment changed.
    ///
    /// Sets: `reason` (short description)
    SystemStatusChanged,
}

impl EventKind {
    /// Area of the engine the event comes from.
    pub fn category(&self) -> EventCategory {
        use EventKind::*;
        match self {
            SubscriberPanicked | SubscriberOverflow | ListenerOverflow => EventCategory::Delivery,
            ChannelOpened | ChannelClosed | ChannelConnecting | ChannelConnected | ChannelFailed
            | ReconnectScheduled | ReconnectExhausted | ChannelFatal | ChannelSuspended
            | PayloadRejected | StatusCommitted => EventCategory::Channel,
            VoteMerged | VoteDiscarded => EventCategory::Merge,
            SnapshotApplied | FetchFailed | StaleResultDropped | PollSkipped => {
                EventCategory::Fetch
            }
            SystemStatusChanged => EventCategory::Host,
        }
    }
}

/// Coarse grouping of [`EventKind`]s used to route events to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    /// Observer and subscriber delivery problems.
    Delivery,
    /// Realtime channel lifecycle and committed statuses.
    Channel,
    /// Realtime vote merges.
    Merge,
    /// Polls, refreshes and resyncs.
    Fetch,
    /// Host environment.
    Host,
}

impl EventCategory {
    pub const ALL: &'static [EventCategory] = &[
        EventCategory::Delivery,
        EventCategory::Channel,
        EventCategory::Merge,
        EventCategory::Fetch,
        EventCategory::Host,
    ];
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic per-bus sequence for ordering (assigned on publish)
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Monotonically increasing sequence number, assigned by the bus.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Channel topic (`vote:7`, `artist_vote:3`) or subscriber name.
    pub topic: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Attempt count.
    pub attempt: Option<u32>,
    /// Backoff delay before next attempt in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Vote item the event refers to.
    pub item: Option<i64>,
    /// Vote total carried by the update.
    pub total: Option<u64>,
    /// Fetch request id.
    pub request: Option<u64>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: 0,
            at: SystemTime::now(),
            kind,
            topic: None,
            reason: None,
            attempt: None,
            delay_ms: None,
            item: None,
            total: None,
            request: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a topic (or subscriber) name.
    #[inline]
    pub fn with_topic(mut self, topic: impl Into<Arc<str>>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches the vote item id and total of an update.
    #[inline]
    pub fn with_vote(mut self, item: i64, total: u64) -> Self {
        self.item = Some(item);
        self.total = Some(total);
        self
    }

    /// Attaches a fetch request id.
    #[inline]
    pub fn with_request(mut self, request: u64) -> Self {
        self.request = Some(request);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_topic(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_topic(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}
