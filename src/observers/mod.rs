//! Observer registration.
//!
//! Notification sources keep a [`Listeners`] table; registering returns a
//! [`ListenerHandle`] that unregisters on drop.

mod listeners;

pub use listeners::ListenerHandle;
pub(crate) use listeners::Listeners;
