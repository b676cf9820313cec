//! # Core subscriber trait
//!
//! `Subscribe` is the extension point for plugging custom handlers for runtime
//! [`Event`]s into the engine (metrics, audit, alerting). Each subscriber is
//! driven by a dedicated worker loop fed by a bounded queue that is owned by the
//! [`SubscriberSet`](crate::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow (I/O, batching, retries); they do **not** block
//!   the publisher nor other subscribers.
//! - Each subscriber **declares** its preferred queue capacity via
//!   [`Subscribe::queue_capacity`]. If a queue overflows, events for that
//!   subscriber are **dropped** (reported as `SubscriberOverflow`).
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use votesync::{Event, EventCategory, EventKind, Subscribe};
//!
//! #[derive(Default)]
//! struct Discards(AtomicU64);
//!
//! #[async_trait::async_trait]
//! impl Subscribe for Discards {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::VoteDiscarded {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!     fn name(&self) -> &'static str { "discards" }
//!     fn categories(&self) -> &'static [EventCategory] { &[EventCategory::Merge] }
//! }
//! ```

use crate::events::{Event, EventCategory};
use async_trait::async_trait;

/// Contract for event subscribers.
///
/// Called from a subscriber-dedicated worker task. Implementations should avoid
/// blocking the async runtime (prefer async I/O and cooperative waits).
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event for this subscriber.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    ///
    /// On overflow, events for this subscriber are **dropped**.
    fn queue_capacity(&self) -> usize {
        1024
    }

    /// Categories this subscriber receives; events of other categories never
    /// reach its queue.
    fn categories(&self) -> &'static [EventCategory] {
        EventCategory::ALL
    }
}
