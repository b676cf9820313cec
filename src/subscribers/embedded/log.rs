//! # LogWriter: event renderer over `tracing`
//!
//! A minimal subscriber that renders incoming [`Event`]s as `tracing` records.
//! Noisy per-update events are logged at `debug`, state-machine transitions at
//! `info`, failures at `warn`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO  votesync: [connected] topic=vote:7
//! WARN  votesync: [failed] topic=vote:7 attempt=0 err="socket reset"
//! INFO  votesync: [backoff] topic=vote:7 delay_ms=1000 attempt=1
//! DEBUG votesync: [merged] topic=vote:7 item=3 total=120
//! WARN  votesync: [exhausted] topic=vote:7 attempts=5
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let topic = e.topic.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::ChannelOpened => tracing::info!(seq = e.seq, "[opened] topic={topic}"),
            EventKind::ChannelClosed => tracing::info!(seq = e.seq, "[closed] topic={topic}"),
            EventKind::ChannelConnecting => {
                tracing::debug!(seq = e.seq, "[connecting] topic={topic} attempt={:?}", e.attempt)
            }
            EventKind::ChannelConnected => tracing::info!(seq = e.seq, "[connected] topic={topic}"),
            EventKind::ChannelFailed => tracing::warn!(
                seq = e.seq,
                "[failed] topic={topic} attempt={:?} err={reason:?}",
                e.attempt
            ),
            EventKind::ReconnectScheduled => tracing::info!(
                seq = e.seq,
                "[backoff] topic={topic} delay_ms={:?} attempt={:?}",
                e.delay_ms,
                e.attempt
            ),
            EventKind::ReconnectExhausted => {
                tracing::warn!(seq = e.seq, "[exhausted] topic={topic} attempts={:?}", e.attempt)
            }
            EventKind::ChannelFatal => {
                tracing::error!(seq = e.seq, "[fatal] topic={topic} err={reason:?}")
            }
            EventKind::ChannelSuspended => tracing::info!(seq = e.seq, "[suspended] topic={topic}"),
            EventKind::PayloadRejected => {
                tracing::warn!(seq = e.seq, "[rejected] topic={topic} err={reason:?}")
            }
            EventKind::VoteMerged => tracing::debug!(
                seq = e.seq,
                "[merged] topic={topic} item={:?} total={:?}",
                e.item,
                e.total
            ),
            EventKind::VoteDiscarded => tracing::debug!(
                seq = e.seq,
                "[discarded] topic={topic} item={:?} total={:?} why={reason}",
                e.item,
                e.total
            ),
            EventKind::SnapshotApplied => tracing::debug!(
                seq = e.seq,
                "[snapshot] topic={topic} request={:?} kind={reason}",
                e.request
            ),
            EventKind::FetchFailed => tracing::warn!(
                seq = e.seq,
                "[fetch-failed] topic={topic} request={:?} err={reason:?}",
                e.request
            ),
            EventKind::StaleResultDropped => tracing::debug!(
                seq = e.seq,
                "[stale] topic={topic} request={:?}",
                e.request
            ),
            EventKind::PollSkipped => tracing::debug!(seq = e.seq, "[poll-skipped] topic={topic}"),
            EventKind::StatusCommitted => {
                tracing::info!(seq = e.seq, "[status] topic={topic} status={reason}")
            }
            EventKind::SystemStatusChanged => tracing::debug!(seq = e.seq, "[system] {reason}"),
            EventKind::SubscriberOverflow | EventKind::ListenerOverflow => {
                tracing::warn!(seq = e.seq, "[overflow] who={topic} reason={reason}")
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(seq = e.seq, "[subscriber-panicked] subscriber={topic} info={reason}")
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
