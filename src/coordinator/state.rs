//! # Canonical vote state and merge rules.
//!
//! [`SyncState`] is the single copy of the vote items a coordinator exposes.
//! Only the coordinator task mutates it, so the rules below are plain
//! sequential code:
//!
//! ```text
//! realtime event ──► merge_event()   : last write wins, lower total discarded
//! poll result    ──► apply_results() : per item add/update, never remove
//! initial/refresh/resync ──► apply_results() : membership replaced, totals keep max per id
//! every accepted change ──► total_votes = Σ vote_total, leaderboard = rank(items)
//! ```
//!
//! Request ids order fetch results: a result whose id is not newer than the
//! last applied one is stale and dropped.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::SyncError;
use crate::fetch::FetchKind;
use crate::model::{Artist, ArtistId, ItemId, RankedVoteItem, VoteId, VoteItem, VoteResults};
use crate::ranking::rank;

/// Verdict of one realtime merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Merge {
    Applied,
    /// Incoming total is lower than the merged one.
    Regressed { current: u64 },
    /// Item belongs to another vote.
    Foreign,
}

pub(crate) struct SyncState {
    vote_id: VoteId,
    items: Vec<VoteItem>,
    loaded: bool,
    last_request: u64,
    pub leaderboard: Vec<RankedVoteItem>,
    pub total_votes: u64,
    pub event_count: u64,
    pub last_event: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
    pub error: Option<SyncError>,
    pub is_loading: bool,
}

impl SyncState {
    pub fn new(vote_id: VoteId) -> Self {
        Self {
            vote_id,
            items: Vec::new(),
            loaded: false,
            last_request: 0,
            leaderboard: Vec::new(),
            total_votes: 0,
            event_count: 0,
            last_event: None,
            last_updated: None,
            error: None,
            is_loading: false,
        }
    }

    /// Items, `None` until the first load or accepted event.
    pub fn vote_items(&self) -> Option<&[VoteItem]> {
        (self.loaded || !self.items.is_empty()).then_some(self.items.as_slice())
    }

    pub fn items(&self) -> &[VoteItem] {
        &self.items
    }

    /// Current total of `id`, if known.
    #[cfg(test)]
    pub fn total_of(&self, id: ItemId) -> Option<u64> {
        self.items.iter().find(|i| i.id == id).map(|i| i.vote_total)
    }

    /// Merges one realtime update under the monotonic guard.
    pub fn merge_event(&mut self, mut item: VoteItem, at: DateTime<Utc>) -> Merge {
        if item.vote_id != self.vote_id {
            return Merge::Foreign;
        }
        match self.items.iter_mut().find(|i| i.id == item.id) {
            Some(current) if item.vote_total < current.vote_total => {
                return Merge::Regressed {
                    current: current.vote_total,
                };
            }
            Some(current) => {
                carry_artist(current, &mut item);
                *current = item;
            }
            None => self.items.push(item),
        }
        self.event_count += 1;
        self.last_event = Some(at);
        self.touch();
        Merge::Applied
    }

    /// Accepts `request` if it is newer than the last applied one.
    pub fn accept_request(&mut self, request: u64) -> bool {
        if request <= self.last_request {
            return false;
        }
        self.last_request = request;
        true
    }

    /// Applies a successful fetch. Clears `error` and `is_loading`.
    pub fn apply_results(&mut self, kind: FetchKind, results: VoteResults) {
        let vote_id = self.vote_id;
        let own = results
            .vote_items
            .into_iter()
            .filter(move |i| i.vote_id == vote_id);

        if kind.replaces_membership() {
            let mut previous: HashMap<ItemId, VoteItem> =
                self.items.drain(..).map(|i| (i.id, i)).collect();
            self.items = own
                .map(|mut incoming| {
                    if let Some(old) = previous.remove(&incoming.id) {
                        carry_artist(&old, &mut incoming);
                        incoming.vote_total = incoming.vote_total.max(old.vote_total);
                    }
                    incoming
                })
                .collect();
        } else {
            for mut incoming in own {
                match self.items.iter_mut().find(|i| i.id == incoming.id) {
                    Some(current) if incoming.vote_total < current.vote_total => {}
                    Some(current) => {
                        carry_artist(current, &mut incoming);
                        *current = incoming;
                    }
                    None => self.items.push(incoming),
                }
            }
        }

        self.loaded = true;
        self.is_loading = false;
        self.error = None;
        self.touch();
    }

    /// Records a failed fetch. Items are kept.
    pub fn fail(&mut self, err: SyncError) {
        self.is_loading = false;
        self.error = Some(err);
    }

    /// Attaches a resolved profile to every item of `artist_id`.
    pub fn set_artist(&mut self, artist_id: ArtistId, artist: &Artist) -> bool {
        let mut changed = false;
        for item in self.items.iter_mut().filter(|i| i.artist_id == Some(artist_id)) {
            if item.artist.as_ref() != Some(artist) {
                item.artist = Some(artist.clone());
                changed = true;
            }
        }
        if changed {
            self.leaderboard = rank(&self.items);
        }
        changed
    }

    /// Artist ids of items still missing a profile.
    pub fn missing_artists(&self) -> Vec<ArtistId> {
        let mut ids: Vec<ArtistId> = self
            .items
            .iter()
            .filter(|i| i.needs_artist())
            .filter_map(|i| i.artist_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    fn touch(&mut self) {
        self.total_votes = self.items.iter().map(|i| i.vote_total).sum();
        self.leaderboard = rank(&self.items);
        self.last_updated = Some(Utc::now());
    }
}

/// Keeps a resolved profile when the incoming row refers to the same artist.
fn carry_artist(current: &VoteItem, incoming: &mut VoteItem) {
    if incoming.artist.is_none() && incoming.artist_id == current.artist_id {
        incoming.artist = current.artist.clone();
    }
}
