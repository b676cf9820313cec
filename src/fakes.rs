//! In-memory collaborators used by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::cache::ArtistDirectory;
use crate::error::SyncError;
use crate::fetch::VoteResultsSource;
use crate::model::{Artist, ArtistId, BatteryStatus, VoteId, VoteItem, VoteResults};
use crate::realtime::{ChannelMessage, ChannelRx, Topic, Transport};
use crate::system::HostProbe;

/// Scripted result of one `Transport::open` call.
pub(crate) enum Open {
    Accept,
    Fail(SyncError),
    Hang,
}

/// Transport whose opens follow a script; unscripted opens succeed.
#[derive(Default)]
pub(crate) struct FakeTransport {
    script: Mutex<VecDeque<Open>>,
    live: Mutex<HashMap<Topic, mpsc::Sender<ChannelMessage>>>,
    opens: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, outcomes: impl IntoIterator<Item = Open>) {
        self.script.lock().unwrap().extend(outcomes);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Sends a raw payload on the live channel of `topic`.
    pub fn push(&self, topic: Topic, payload: serde_json::Value) -> bool {
        self.send(topic, ChannelMessage::Payload(payload))
    }

    pub fn send(&self, topic: Topic, msg: ChannelMessage) -> bool {
        match self.live.lock().unwrap().get(&topic) {
            Some(tx) => tx.try_send(msg).is_ok(),
            None => false,
        }
    }

    /// Simulates the server closing the live channel of `topic`.
    pub fn close(&self, topic: Topic) {
        self.live.lock().unwrap().remove(&topic);
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn open(&self, topic: &Topic) -> Result<ChannelRx, SyncError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front().unwrap_or(Open::Accept);
        match next {
            Open::Accept => {
                let (tx, rx) = mpsc::channel(64);
                self.live.lock().unwrap().insert(*topic, tx);
                Ok(rx)
            }
            Open::Fail(err) => Err(err),
            Open::Hang => std::future::pending().await,
        }
    }
}

/// Builds the JSON payload of a `vote_item_updated` event.
pub(crate) fn update(id: i64, vote_id: VoteId, total: u64) -> serde_json::Value {
    serde_json::json!({
        "type": "vote_item_updated",
        "payload": {"id": id, "vote_id": vote_id, "vote_total": total}
    })
}

/// Scripted result of one fetch.
pub(crate) enum Load {
    Items(Vec<VoteItem>),
    Fail(SyncError),
    /// Responds with the items after the given delay.
    Slow(Duration, Vec<VoteItem>),
}

/// Result source following a script; once exhausted, repeats `fallback`.
pub(crate) struct FakeSource {
    script: Mutex<VecDeque<Load>>,
    fallback: Mutex<Vec<VoteItem>>,
    calls: AtomicUsize,
}

impl FakeSource {
    pub fn new(fallback: Vec<VoteItem>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn script(&self, loads: impl IntoIterator<Item = Load>) {
        self.script.lock().unwrap().extend(loads);
    }

    pub fn set_fallback(&self, items: Vec<VoteItem>) {
        *self.fallback.lock().unwrap() = items;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoteResultsSource for FakeSource {
    async fn load_vote_results(&self, _vote_id: VoteId) -> Result<VoteResults, SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Load::Items(items)) => Ok(VoteResults::from_items(items)),
            Some(Load::Fail(err)) => Err(err),
            Some(Load::Slow(delay, items)) => {
                tokio::time::sleep(delay).await;
                Ok(VoteResults::from_items(items))
            }
            None => Ok(VoteResults::from_items(self.fallback.lock().unwrap().clone())),
        }
    }
}

/// Host reporting fixed capabilities.
#[derive(Default)]
pub(crate) struct FakeProbe {
    pub online: Option<bool>,
    pub effective_type: Option<&'static str>,
    pub save_data: Option<bool>,
    pub visible: Option<bool>,
    pub battery: Option<BatteryStatus>,
}

impl HostProbe for FakeProbe {
    fn online(&self) -> Option<bool> {
        self.online
    }

    fn effective_type(&self) -> Option<String> {
        self.effective_type.map(str::to_string)
    }

    fn save_data(&self) -> Option<bool> {
        self.save_data
    }

    fn page_visible(&self) -> Option<bool> {
        self.visible
    }

    fn battery(&self) -> Option<BatteryStatus> {
        self.battery
    }
}

/// Artist lookup counting calls; the first `failures` lookups fail.
#[derive(Default)]
pub(crate) struct FakeDirectory {
    calls: AtomicUsize,
    failures: AtomicUsize,
}

impl FakeDirectory {
    pub fn failing(failures: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failures: AtomicUsize::new(failures),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtistDirectory for FakeDirectory {
    async fn artist(&self, id: ArtistId) -> Result<Option<Artist>, SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SyncError::network("directory unavailable"));
        }
        Ok(Some(Artist {
            id,
            name: format!("artist-{id}"),
            image_url: None,
        }))
    }
}
