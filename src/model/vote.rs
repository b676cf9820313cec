//! # Vote items and leaderboard rows.
//!
//! [`VoteItem`] mirrors one row of the vote result table as delivered by both the
//! realtime channel and the aggregate fetch. Field names follow the wire format
//! (`snake_case`), so the same type deserializes from event payloads and fetch
//! responses.
//!
//! ## Invariants
//! - `vote_total` is non-negative (enforced by `u64`; negative totals fail to decode).
//! - For a given `id`, `vote_total` never regresses under accepted updates
//!   (enforced by the coordinator's merge step, not by this type).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a vote item row.
pub type ItemId = i64;
/// Identifier of a vote (one leaderboard).
pub type VoteId = i64;
/// Identifier of an artist.
pub type ArtistId = i64;
/// Identifier of an artist group.
pub type GroupId = i64;

/// Artist profile attached to a vote item for presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: ArtistId,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// One candidate of a vote and its current total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteItem {
    pub id: ItemId,
    pub vote_id: VoteId,
    #[serde(default)]
    pub artist_id: Option<ArtistId>,
    #[serde(default)]
    pub group_id: Option<GroupId>,
    pub vote_total: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Resolved profile; never present on realtime payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<Artist>,
}

impl VoteItem {
    /// Creates an item with only the fields needed for ranking and merging.
    pub fn new(id: ItemId, vote_id: VoteId, vote_total: u64) -> Self {
        Self {
            id,
            vote_id,
            artist_id: None,
            group_id: None,
            vote_total,
            created_at: None,
            updated_at: None,
            deleted_at: None,
            artist: None,
        }
    }

    #[inline]
    pub fn with_artist_id(mut self, artist_id: ArtistId) -> Self {
        self.artist_id = Some(artist_id);
        self
    }

    #[inline]
    pub fn with_updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    /// Returns `true` if the item still needs an artist profile.
    #[inline]
    pub fn needs_artist(&self) -> bool {
        self.artist.is_none() && self.artist_id.is_some()
    }
}

/// A [`VoteItem`] with its leaderboard position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedVoteItem {
    #[serde(flatten)]
    pub item: VoteItem,
    /// 1-based rank; tied totals share a rank.
    pub rank: u32,
}

/// Result of one aggregate fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteResults {
    pub vote_items: Vec<VoteItem>,
    pub total_votes: u64,
}

impl VoteResults {
    /// Builds results from items, computing `total_votes` as their sum.
    pub fn from_items(vote_items: Vec<VoteItem>) -> Self {
        let total_votes = vote_items.iter().map(|i| i.vote_total).sum();
        Self {
            vote_items,
            total_votes,
        }
    }
}
