//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by channel actors, the polling
//! task, coordinators and the system monitor.
//!
//! ## Contents
//! - [`EventKind`], [`EventCategory`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `ChannelActor`, `PollingFallback`, `SyncCoordinator`,
//!   `SystemStatusMonitor`, `Listeners` and `SubscriberSet` (overflow/panic).
//! - **Consumers**: `ConnectionManager::subscriber_listener()` (fans out to
//!   `SubscriberSet`) and any receiver obtained from [`Bus::subscribe`].

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventCategory, EventKind};
