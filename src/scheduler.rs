//! # Keyed timers.
//!
//! [`Scheduler`] wraps [`tokio_util::time::DelayQueue`] and indexes pending
//! timers by a tag, which gives the two primitives the coordinator needs:
//!
//! ```text
//! debounce:  schedule(tag, d)           → (re)arms the timer, last call wins
//! throttle:  schedule_if_absent(tag, d) → opens a window only if none is open
//! ```
//!
//! Timers run on the tokio clock, so tests drive them with a paused runtime
//! (`#[tokio::test(start_paused = true)]`) instead of real time. Dropping the
//! scheduler cancels every pending timer.
//!
//! ## Usage in `select!`
//! ```text
//! Some(tag) = scheduler.expired(), if !scheduler.is_empty() => { ... }
//! ```
//! The guard matters: an empty queue resolves immediately with `None`.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use futures::future::poll_fn;
use tokio_util::time::{delay_queue, DelayQueue};

/// Tag-indexed delay queue.
pub(crate) struct Scheduler<T>
where
    T: Hash + Eq + Clone,
{
    queue: DelayQueue<T>,
    keys: HashMap<T, delay_queue::Key>,
}

impl<T> Scheduler<T>
where
    T: Hash + Eq + Clone,
{
    pub fn new() -> Self {
        Self {
            queue: DelayQueue::new(),
            keys: HashMap::new(),
        }
    }

    /// Arms `tag` to fire after `after`, resetting it if already armed.
    pub fn schedule(&mut self, tag: T, after: Duration) {
        match self.keys.get(&tag) {
            Some(key) => self.queue.reset(key, after),
            None => {
                let key = self.queue.insert(tag.clone(), after);
                self.keys.insert(tag, key);
            }
        }
    }

    /// Arms `tag` only if it is not armed yet. Returns `true` if armed now.
    pub fn schedule_if_absent(&mut self, tag: T, after: Duration) -> bool {
        if self.keys.contains_key(&tag) {
            return false;
        }
        let key = self.queue.insert(tag.clone(), after);
        self.keys.insert(tag, key);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Waits for the next timer to fire and returns its tag.
    ///
    /// Returns `None` immediately when nothing is armed.
    pub async fn expired(&mut self) -> Option<T> {
        let expired = poll_fn(|cx| self.queue.poll_expired(cx)).await?;
        let tag = expired.into_inner();
        self.keys.remove(&tag);
        Some(tag)
    }
}
