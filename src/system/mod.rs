//! Host environment observation: capability probe, change signals and the
//! [`SystemStatusMonitor`] that turns them into [`SystemStatus`](crate::SystemStatus) updates.

mod monitor;
mod probe;

pub use monitor::SystemStatusMonitor;
pub use probe::{HostProbe, HostSignal, NoProbe};
