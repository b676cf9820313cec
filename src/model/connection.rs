//! # Realtime connection status.
//!
//! ```text
//!                 ┌──────────────────── manual reconnect ───────────────────┐
//!                 ▼                                                         │
//! disconnected ──► connecting ──► connected ──► (drop) ──► reconnecting ────┤
//!      ▲                               ▲                     │    │          │
//!      │                               └──── success ────────┘    │          │
//!      └──────────── attempts exhausted ──────────────────────────┘          │
//!                                                                            │
//! any ──► error / network_error ──► reconnecting   (retryable)               │
//!                              └──► rests in error (fatal) ──────────────────┘
//! any ──► suspended (page hidden + battery saver) ──► resume = manual reconnect
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// State of one realtime channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Not connected (initial, released, or reconnect attempts exhausted).
    #[default]
    Disconnected,
    /// First attempt (or manual reconnect) in progress.
    Connecting,
    /// Channel is live and delivering events.
    Connected,
    /// Connection dropped; retrying with backoff.
    Reconnecting,
    /// Channel-level failure (transient or fatal).
    Error,
    /// Network-level failure (offline, DNS, timeout).
    NetworkError,
    /// Paused to save battery while the page is hidden.
    Suspended,
}

impl ConnectionStatus {
    /// Returns the wire/log name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Reconnecting => "reconnecting",
            ConnectionStatus::Error => "error",
            ConnectionStatus::NetworkError => "network_error",
            ConnectionStatus::Suspended => "suspended",
        }
    }

    /// Realtime is not delivering and not trying to: polling should take over.
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            ConnectionStatus::Disconnected | ConnectionStatus::Error | ConnectionStatus::NetworkError
        )
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one channel's state machine.
///
/// `reconnect_attempts <= max_reconnect_attempts` always holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub status: ConnectionStatus,
    pub last_connected: Option<DateTime<Utc>>,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
    pub last_error: Option<SyncError>,
}

impl ConnectionInfo {
    /// Creates a disconnected info with the given attempt budget.
    pub fn new(max_reconnect_attempts: u32) -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            last_connected: None,
            reconnect_attempts: 0,
            max_reconnect_attempts,
            last_error: None,
        }
    }

    /// Returns `true` once every reconnect attempt has been used.
    #[inline]
    pub fn attempts_exhausted(&self) -> bool {
        self.reconnect_attempts >= self.max_reconnect_attempts
    }
}
