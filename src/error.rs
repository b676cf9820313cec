//! Error types used by the sync engine.
//!
//! [`SyncError`] covers every failure the engine observes: channel-level
//! transport failures, fetch-level network failures, fatal authorization
//! rejections and malformed payloads. It provides helper methods (`as_label`,
//! `as_message`) for logging/metrics plus the classification used by the
//! reconnection state machine ([`SyncError::is_retryable`], [`SyncError::is_fatal`]).
//!
//! The type is `Clone` because the same error is stored in the coordinator
//! snapshot, carried in [`ConnectionInfo`](crate::ConnectionInfo) and handed to
//! observers.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the sync engine and its collaborators.
///
/// Some errors are retryable (`Transport`, `Network`, `Timeout`), `Auth` is
/// fatal and halts reconnection until a manual reconnect, `Data` is logged and
/// discarded without changing state.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Realtime channel failed or closed unexpectedly.
    #[error("transport error: {reason}")]
    Transport {
        /// The underlying error message.
        reason: String,
    },

    /// Fetch or connect failed at the network level.
    #[error("network error: {reason}")]
    Network {
        /// The underlying error message.
        reason: String,
    },

    /// An operation exceeded its bounded window.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout that was exceeded.
        timeout: Duration,
    },

    /// Authorization rejected (not retried).
    #[error("authorization rejected (no retry): {reason}")]
    Auth {
        /// The underlying error message.
        reason: String,
    },

    /// Payload could not be decoded.
    #[error("malformed payload: {reason}")]
    Data {
        /// Decoder message.
        reason: String,
    },

    /// Host capability is not available.
    #[error("{capability} is not supported on this host")]
    Unsupported {
        /// Capability name (`battery`, `network-information`, ...).
        capability: &'static str,
    },

    /// The coordinator has been shut down.
    #[error("coordinator is shut down")]
    Closed,

    /// The coordinator is disabled; enable it before fetching.
    #[error("sync is disabled")]
    Disabled,
}

impl SyncError {
    /// Shorthand for [`SyncError::Transport`].
    pub fn transport(reason: impl Into<String>) -> Self {
        SyncError::Transport {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`SyncError::Network`].
    pub fn network(reason: impl Into<String>) -> Self {
        SyncError::Network {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`SyncError::Auth`].
    pub fn auth(reason: impl Into<String>) -> Self {
        SyncError::Auth {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`SyncError::Data`].
    pub fn data(reason: impl Into<String>) -> Self {
        SyncError::Data {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use votesync::SyncError;
    /// use std::time::Duration;
    ///
    /// let err = SyncError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "sync_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SyncError::Transport { .. } => "sync_transport",
            SyncError::Network { .. } => "sync_network",
            SyncError::Timeout { .. } => "sync_timeout",
            SyncError::Auth { .. } => "sync_auth",
            SyncError::Data { .. } => "sync_data",
            SyncError::Unsupported { .. } => "sync_unsupported",
            SyncError::Closed => "sync_closed",
            SyncError::Disabled => "sync_disabled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            SyncError::Transport { reason } => format!("transport: {reason}"),
            SyncError::Network { reason } => format!("network: {reason}"),
            SyncError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            SyncError::Auth { reason } => format!("auth: {reason}"),
            SyncError::Data { reason } => format!("data: {reason}"),
            SyncError::Unsupported { capability } => format!("unsupported: {capability}"),
            SyncError::Closed => "coordinator closed".to_string(),
            SyncError::Disabled => "sync disabled".to_string(),
        }
    }

    /// Indicates whether the failure is worth retrying with backoff.
    ///
    /// # Example
    /// ```
    /// use votesync::SyncError;
    ///
    /// assert!(SyncError::transport("socket reset").is_retryable());
    /// assert!(!SyncError::auth("jwt expired").is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Transport { .. } | SyncError::Network { .. } | SyncError::Timeout { .. }
        )
    }

    /// Fatal errors halt reconnection until a manual reconnect.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Auth { .. })
    }

    /// Network-level failures (including timeouts) surface as `network_error`.
    pub fn is_network(&self) -> bool {
        matches!(self, SyncError::Network { .. } | SyncError::Timeout { .. })
    }
}
