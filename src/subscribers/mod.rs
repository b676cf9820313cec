//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`] that
//! fans runtime events broadcast through the [`Bus`](crate::events::Bus) out to
//! user subscribers.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   ChannelActor / Coordinator ── publish(Event) ──► Bus ──► subscriber_listener
//!                                                              │
//!                                                              ▼
//!                                                SubscriberSet::emit (by EventCategory)
//!                                                    ┌────────┬────────┬───────┐
//!                                                    ▼        ▼        ▼       ▼
//!                                                LogWriter  Metrics  Audit   ...
//! ```

#[cfg(feature = "logging")]
mod embedded;
mod subscribe;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub use subscribe::Subscribe;
pub(crate) use subscriber_set::panic_message;
pub use subscriber_set::SubscriberSet;
