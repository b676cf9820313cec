//! # Leaderboard ranking.
//!
//! [`rank`] converts a vote-total list into a ranked leaderboard:
//! 1. stable sort by `vote_total` descending (equal totals keep input order);
//! 2. the first item gets rank 1;
//! 3. each next item takes its predecessor's rank if the totals are equal,
//!    otherwise its 1-based position.
//!
//! Ties share a rank and the position jumps after them (positional ranking,
//! not dense ranking):
//! ```text
//! totals [100, 100, 80] → ranks [1, 1, 3]
//! totals [50, 50, 50]   → ranks [1, 1, 1]
//! ```
//!
//! # Example
//! ```rust
//! use votesync::{rank, VoteItem};
//!
//! let items = vec![
//!     VoteItem::new(1, 9, 100),
//!     VoteItem::new(2, 9, 100),
//!     VoteItem::new(3, 9, 80),
//! ];
//! let ranks: Vec<u32> = rank(&items).iter().map(|r| r.rank).collect();
//! assert_eq!(ranks, vec![1, 1, 3]);
//! ```

use crate::model::{RankedVoteItem, VoteItem};

/// Ranks `items` by descending `vote_total`. Pure; the input is not modified.
pub fn rank(items: &[VoteItem]) -> Vec<RankedVoteItem> {
    let mut sorted: Vec<&VoteItem> = items.iter().collect();
    sorted.sort_by(|a, b| b.vote_total.cmp(&a.vote_total));

    let mut out: Vec<RankedVoteItem> = Vec::with_capacity(sorted.len());
    for (pos, item) in sorted.into_iter().enumerate() {
        let rank = match out.last() {
            Some(prev) if prev.item.vote_total == item.vote_total => prev.rank,
            _ => u32::try_from(pos + 1).unwrap_or(u32::MAX),
        };
        out.push(RankedVoteItem {
            item: item.clone(),
            rank,
        });
    }
    out
}
