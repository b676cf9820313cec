//! # Aggregate fetches of vote results.
//!
//! [`VoteResultsSource`] is the seam to whatever stores the vote totals. Every
//! fetch the engine issues gets a request id from a per-session
//! [`RequestIds`] counter, so the coordinator can drop a response that
//! arrives after a newer one was applied.
//!
//! ```text
//! initial / refresh / poll / resync ──► RequestIds::next() ──► load_bounded() ──► FetchOutcome
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SyncError;
use crate::model::{VoteId, VoteResults};

/// Loads the authoritative totals of a vote.
#[async_trait]
pub trait VoteResultsSource: Send + Sync + 'static {
    async fn load_vote_results(&self, vote_id: VoteId) -> Result<VoteResults, SyncError>;
}

/// Why a fetch was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// First load after enable; replaces membership.
    Initial,
    /// Explicit `refresh_data()`; replaces membership.
    Refresh,
    /// Polling tick; merges per item.
    Poll,
    /// Requested by a channel after reconnecting; replaces membership.
    Resync,
}

impl FetchKind {
    /// Authoritative fetches replace the item set instead of merging into it.
    pub fn replaces_membership(&self) -> bool {
        !matches!(self, FetchKind::Poll)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FetchKind::Initial => "initial",
            FetchKind::Refresh => "refresh",
            FetchKind::Poll => "poll",
            FetchKind::Resync => "resync",
        }
    }
}

/// Completed fetch.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub request: u64,
    pub kind: FetchKind,
    pub result: Result<VoteResults, SyncError>,
}

/// Monotonic request id source shared by everything fetching for one session.
#[derive(Debug, Clone, Default)]
pub struct RequestIds(Arc<AtomicU64>);

impl RequestIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id; the first one is `1`.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Runs one fetch bounded by `timeout` (`None` = unbounded).
pub async fn load_bounded(
    source: &dyn VoteResultsSource,
    vote_id: VoteId,
    timeout: Option<Duration>,
) -> Result<VoteResults, SyncError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, source.load_vote_results(vote_id))
            .await
            .map_err(|_elapsed| SyncError::Timeout { timeout: limit })?,
        None => source.load_vote_results(vote_id).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeSource, Load};
    use crate::model::VoteItem;

    #[test]
    fn test_request_ids_increase() {
        let ids = RequestIds::new();
        let shared = ids.clone();
        assert_eq!(ids.next(), 1);
        assert_eq!(shared.next(), 2);
        assert_eq!(ids.next(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_times_out() {
        let source = FakeSource::new(vec![]);
        source.script([Load::Slow(Duration::from_secs(30), vec![VoteItem::new(1, 7, 5)])]);
        let err = load_bounded(source.as_ref(), 7, Some(Duration::from_secs(10)))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SyncError::Timeout {
                timeout: Duration::from_secs(10)
            }
        );
    }

    #[tokio::test]
    async fn test_totals_are_summed() {
        let source = FakeSource::new(vec![VoteItem::new(1, 7, 5), VoteItem::new(2, 7, 6)]);
        let res = load_bounded(source.as_ref(), 7, None).await.expect("loads");
        assert_eq!(res.total_votes, 11);
        assert!(FetchKind::Refresh.replaces_membership());
        assert!(!FetchKind::Poll.replaces_membership());
    }
}
