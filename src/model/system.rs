//! Host environment snapshot published by the system status monitor.

use serde::{Deserialize, Serialize};

/// Effective network type reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionType {
    #[serde(rename = "slow-2g")]
    Slow2g,
    #[serde(rename = "2g")]
    TwoG,
    #[serde(rename = "3g")]
    ThreeG,
    #[serde(rename = "4g")]
    FourG,
    Wifi,
    Ethernet,
    Unknown,
}

impl ConnectionType {
    /// Parses an effective-type label (`slow-2g`, `2g`, `3g`, `4g`, `wifi`, ...).
    ///
    /// Unrecognized labels map to [`ConnectionType::Unknown`] instead of failing.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "slow-2g" => ConnectionType::Slow2g,
            "2g" => ConnectionType::TwoG,
            "3g" => ConnectionType::ThreeG,
            "4g" => ConnectionType::FourG,
            "wifi" => ConnectionType::Wifi,
            "ethernet" => ConnectionType::Ethernet,
            _ => ConnectionType::Unknown,
        }
    }

    #[inline]
    pub fn is_slow(&self) -> bool {
        matches!(self, ConnectionType::Slow2g | ConnectionType::TwoG)
    }
}

/// Battery state; both fields are `None` when the capability is absent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BatteryStatus {
    /// Charge level in `0.0..=1.0`.
    pub level: Option<f32>,
    pub is_charging: Option<bool>,
}

impl BatteryStatus {
    /// Level at or below which the battery counts as low.
    pub const LOW_LEVEL: f32 = 0.2;

    #[inline]
    pub fn is_supported(&self) -> bool {
        self.level.is_some()
    }

    /// Low and not charging. Unknown charging state counts as not charging.
    pub fn is_low(&self) -> bool {
        match self.level {
            Some(level) => level <= Self::LOW_LEVEL && !self.is_charging.unwrap_or(false),
            None => false,
        }
    }
}

/// Snapshot of the host environment.
///
/// Defaults are the safe values used when a capability is unavailable:
/// online, visible, not slow, unknown network type and battery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub is_online: bool,
    pub connection_type: Option<ConnectionType>,
    pub is_slow_connection: bool,
    pub is_page_visible: bool,
    pub battery: BatteryStatus,
}

impl Default for SystemStatus {
    fn default() -> Self {
        Self {
            is_online: true,
            connection_type: None,
            is_slow_connection: false,
            is_page_visible: true,
            battery: BatteryStatus::default(),
        }
    }
}
