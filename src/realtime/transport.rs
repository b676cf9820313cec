//! # Realtime transport seam.
//!
//! The engine does not speak any push protocol itself. The embedding
//! application implements [`Transport`] over whatever it uses (websocket,
//! SSE, a hosted realtime service) and hands the manager a boxed instance.
//!
//! ```text
//! Transport::open(topic) ──► ChannelRx ──► Payload(json) ... Error(e) ... (end = closed)
//! ```
//!
//! A successful `open` means the subscription is live. The receiver yielding
//! `None` means the server or network closed the channel.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::SyncError;
use crate::model::VoteId;

/// Subscription target of a realtime channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Item updates of one vote.
    Vote(VoteId),
    /// Item updates of one artist vote.
    ArtistVote(i64),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Vote(id) => write!(f, "vote:{id}"),
            Topic::ArtistVote(id) => write!(f, "artist_vote:{id}"),
        }
    }
}

/// One message delivered by an open channel.
#[derive(Debug, Clone)]
pub enum ChannelMessage {
    /// Raw event payload, decoded by the channel actor.
    Payload(serde_json::Value),
    /// Channel-level failure; the channel is considered dead afterwards.
    Error(SyncError),
}

/// Receiving side of an open channel.
pub type ChannelRx = mpsc::Receiver<ChannelMessage>;

/// Opens push subscriptions.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Opens a subscription for `topic`.
    ///
    /// Errors should be classified: [`SyncError::Auth`] stops reconnection,
    /// [`SyncError::Network`] and [`SyncError::Transport`] are retried.
    async fn open(&self, topic: &Topic) -> Result<ChannelRx, SyncError>;
}
