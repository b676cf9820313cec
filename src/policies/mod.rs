//! Reconnect policies.
//!
//! This module groups the knobs that control **if** a failed realtime channel
//! tries again and **how long** it waits between attempts.
//!
//! ## Contents
//! - [`ReconnectPolicy`] attempt budget + delay curve per channel
//! - [`BackoffPolicy`]   how delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]    randomization strategy to avoid reconnect storms
//!
//! ## Quick wiring
//! ```text
//! ManagerConfig { reconnect: ReconnectPolicy, .. }
//!      └─► realtime::channel::ChannelActor uses:
//!           - reconnect.allows(attempts) to continue or rest in `disconnected`
//!           - reconnect.delay(attempt, smart) to schedule the next connect
//! ```
//!
//! ## Defaults
//! - `ReconnectPolicy::default()` → 5 attempts.
//! - `BackoffPolicy::default()` → first=1s, factor=2.0, max=30s, jitter=Equal.

mod backoff;
mod jitter;
mod reconnect;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use reconnect::ReconnectPolicy;
