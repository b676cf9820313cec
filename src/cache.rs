//! # Artist profile cache.
//!
//! Vote items carry only an `artist_id`; the presentation layer wants the
//! profile. [`ArtistCache`] keeps resolved profiles for a TTL and is shared by
//! `Arc` between coordinators of the same process. Misses go to an
//! [`ArtistDirectory`] through an [`ArtistResolver`], which keeps at most one
//! lookup per id in flight.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::SyncError;
use crate::model::{Artist, ArtistId};

/// Looks up artist profiles.
#[async_trait]
pub trait ArtistDirectory: Send + Sync + 'static {
    /// `Ok(None)` when the artist does not exist.
    async fn artist(&self, id: ArtistId) -> Result<Option<Artist>, SyncError>;
}

/// TTL cache of artist profiles.
pub struct ArtistCache {
    ttl: Duration,
    entries: Mutex<HashMap<ArtistId, (Artist, Instant)>>,
}

impl Default for ArtistCache {
    /// Ten minute TTL.
    fn default() -> Self {
        Self::new(Duration::from_secs(600))
    }
}

impl ArtistCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ArtistId, (Artist, Instant)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached profile, `None` if absent or expired. Expired entries are evicted.
    pub fn get(&self, id: ArtistId) -> Option<Artist> {
        let mut entries = self.entries();
        match entries.get(&id) {
            Some((artist, at)) if at.elapsed() < self.ttl => Some(artist.clone()),
            Some(_) => {
                entries.remove(&id);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, artist: Artist) {
        self.entries().insert(artist.id, (artist, Instant::now()));
    }

    pub fn invalidate(&self, id: ArtistId) -> bool {
        self.entries().remove(&id).is_some()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

/// Resolves profiles through the cache, then the directory.
pub(crate) struct ArtistResolver {
    cache: Arc<ArtistCache>,
    directory: Arc<dyn ArtistDirectory>,
    pending: HashSet<ArtistId>,
    resolved: mpsc::Sender<(ArtistId, Option<Artist>)>,
    token: CancellationToken,
}

impl ArtistResolver {
    pub fn new(
        cache: Arc<ArtistCache>,
        directory: Arc<dyn ArtistDirectory>,
        resolved: mpsc::Sender<(ArtistId, Option<Artist>)>,
        token: CancellationToken,
    ) -> Self {
        Self {
            cache,
            directory,
            pending: HashSet::new(),
            resolved,
            token,
        }
    }

    /// Cached profile, or `None` after starting a lookup (unless one is running).
    ///
    /// Every lookup reports back on `resolved`, with `None` when it found
    /// nothing or failed, so the owner can [`finish`](Self::finish) the id.
    pub fn resolve(&mut self, id: ArtistId) -> Option<Artist> {
        if let Some(artist) = self.cache.get(id) {
            return Some(artist);
        }
        if !self.pending.insert(id) {
            return None;
        }

        let directory = Arc::clone(&self.directory);
        let cache = Arc::clone(&self.cache);
        let tx = self.resolved.clone();
        let token = self.token.clone();
        tokio::spawn(async move {
            let lookup = tokio::select! {
                _ = token.cancelled() => return,
                res = directory.artist(id) => res,
            };
            let found = match lookup {
                Ok(Some(artist)) => {
                    cache.insert(artist.clone());
                    Some(artist)
                }
                Ok(None) => {
                    tracing::debug!(artist = id, "artist not found");
                    None
                }
                Err(e) => {
                    tracing::warn!(artist = id, error = %e, "artist lookup failed");
                    None
                }
            };
            let _ = tx.send((id, found)).await;
        });
        None
    }

    /// Marks a lookup finished so the id can be retried later.
    pub fn finish(&mut self, id: ArtistId) {
        self.pending.remove(&id);
    }
}
