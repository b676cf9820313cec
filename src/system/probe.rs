//! Host capability seam.
//!
//! Every capability is optional: a method returning `None` means the host
//! cannot report it, and the monitor falls back to a safe default.

use crate::model::BatteryStatus;

/// Point-in-time reads of the host environment.
pub trait HostProbe: Send + Sync {
    /// Network reachability.
    fn online(&self) -> Option<bool> {
        None
    }

    /// Effective network type label (`slow-2g`, `2g`, `3g`, `4g`, ...).
    fn effective_type(&self) -> Option<String> {
        None
    }

    /// Whether the user asked for reduced data usage.
    fn save_data(&self) -> Option<bool> {
        None
    }

    fn page_visible(&self) -> Option<bool> {
        None
    }

    fn battery(&self) -> Option<BatteryStatus> {
        None
    }
}

/// Probe for hosts without any capability.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProbe;

impl HostProbe for NoProbe {}

/// Change notification pushed by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostSignal {
    /// Went online (`true`) or offline (`false`).
    Online(bool),
    /// Network information changed.
    Network {
        effective_type: Option<String>,
        save_data: Option<bool>,
    },
    /// Page became visible (`true`) or hidden (`false`).
    Visibility(bool),
    /// Battery level or charging state changed.
    Battery(BatteryStatus),
}
