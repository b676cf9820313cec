//! Realtime channels: transport seam, payload decoding, per-topic actors and
//! the reference-counting manager.

mod channel;
mod manager;
mod payload;
mod transport;

pub use channel::{DataSync, StatusNotice};
pub use manager::{ChannelLease, ConnectionManager, ConnectionManagerBuilder, SubscribeOptions};
pub use payload::{VoteEvent, VoteEventKind, WirePayload};
pub use transport::{ChannelMessage, ChannelRx, Topic, Transport};
