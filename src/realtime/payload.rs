//! # Realtime payload decoding.
//!
//! Channel payloads are tagged JSON objects:
//!
//! ```json
//! {"type": "vote_item_updated", "payload": {"id": 3, "vote_id": 7, "vote_total": 120}}
//! ```
//!
//! Anything that does not decode into a known event becomes a
//! [`SyncError::Data`]; the channel actor publishes it as `PayloadRejected` and
//! moves on without touching its state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::model::VoteItem;
use crate::realtime::Topic;

/// Wire form of a channel payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum WirePayload {
    /// A vote item row changed.
    VoteItemUpdated(VoteItem),
}

/// Kind of a decoded realtime event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteEventKind {
    VoteItemUpdated,
}

/// A decoded realtime event.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteEvent {
    pub kind: VoteEventKind,
    /// Channel the event arrived on.
    pub topic: Topic,
    pub item: VoteItem,
    /// Local receive time.
    pub received_at: DateTime<Utc>,
}

impl VoteEvent {
    /// Decodes a raw payload received on `topic`.
    pub fn decode(topic: Topic, raw: serde_json::Value) -> Result<Self, SyncError> {
        let payload: WirePayload =
            serde_json::from_value(raw).map_err(|e| SyncError::data(e.to_string()))?;
        Ok(match payload {
            WirePayload::VoteItemUpdated(item) => Self {
                kind: VoteEventKind::VoteItemUpdated,
                topic,
                item,
                received_at: Utc::now(),
            },
        })
    }
}
