use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use super::*;
use crate::config::ManagerConfig;
use crate::events::EventKind;
use crate::fakes::{update, FakeDirectory, FakeProbe, FakeSource, FakeTransport, Load, Open};
use crate::model::{BatteryStatus, ConnectionStatus, ItemId, VoteItem};
use crate::policies::{BackoffPolicy, JitterPolicy, ReconnectPolicy};
use crate::realtime::{ChannelMessage, Topic, Transport};
use crate::system::HostSignal;

const VOTE: Topic = Topic::Vote(7);

#[derive(Default)]
struct Recorder {
    updates: Mutex<Vec<Vec<VoteItem>>>,
    statuses: Mutex<Vec<ConnectionStatus>>,
    errors: Mutex<Vec<SyncError>>,
}

impl Recorder {
    fn updates(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    fn statuses(&self) -> Vec<ConnectionStatus> {
        self.statuses.lock().unwrap().clone()
    }

    fn errors(&self) -> Vec<SyncError> {
        self.errors.lock().unwrap().clone()
    }
}

impl SyncObserver for Recorder {
    fn on_vote_update(&self, items: &[VoteItem]) {
        self.updates.lock().unwrap().push(items.to_vec());
    }

    fn on_connection_status_change(&self, status: ConnectionStatus) {
        self.statuses.lock().unwrap().push(status);
    }

    fn on_error(&self, error: &SyncError) {
        self.errors.lock().unwrap().push(error.clone());
    }
}

struct Rig {
    transport: Arc<FakeTransport>,
    source: Arc<FakeSource>,
    manager: ConnectionManager,
    observer: Arc<Recorder>,
}

impl Rig {
    fn new(items: Vec<VoteItem>) -> Self {
        Self::with_listener_capacity(items, ManagerConfig::default().listener_capacity)
    }

    fn with_listener_capacity(items: Vec<VoteItem>, listener_capacity: usize) -> Self {
        let transport = FakeTransport::new();
        let cfg = ManagerConfig {
            listener_capacity,
            connect_timeout: Duration::from_secs(5),
            reconnect: ReconnectPolicy {
                max_attempts: 5,
                backoff: BackoffPolicy {
                    first: Duration::from_secs(1),
                    max: Duration::from_secs(8),
                    factor: 2.0,
                    jitter: JitterPolicy::None,
                },
            },
            ..ManagerConfig::default()
        };
        let dyn_transport: Arc<dyn Transport> = transport.clone();
        Self {
            manager: ConnectionManager::builder(dyn_transport).with_config(cfg).build(),
            transport,
            source: FakeSource::new(items),
            observer: Arc::new(Recorder::default()),
        }
    }

    fn builder(&self, cfg: SyncConfig) -> SyncCoordinatorBuilder {
        let source: Arc<dyn VoteResultsSource> = self.source.clone();
        let observer: Arc<dyn SyncObserver> = self.observer.clone();
        SyncCoordinator::builder(self.manager.clone(), source, cfg).with_observer(observer)
    }

    fn start(&self, cfg: SyncConfig) -> SyncCoordinator {
        self.builder(cfg).build()
    }
}

fn item(id: ItemId, total: u64) -> VoteItem {
    VoteItem::new(id, 7, total)
}

fn total_of(snap: &SyncSnapshot, id: ItemId) -> Option<u64> {
    snap.vote_items
        .as_ref()?
        .iter()
        .find(|i| i.id == id)
        .map(|i| i.vote_total)
}

async fn until(c: &SyncCoordinator, f: impl Fn(&SyncSnapshot) -> bool) -> SyncSnapshot {
    let mut rx = c.watch();
    tokio::time::timeout(Duration::from_secs(600), async move {
        let snap = rx.wait_for(|s| f(s)).await.expect("coordinator running");
        (*snap).clone()
    })
    .await
    .expect("snapshot condition reached")
}

async fn live(c: &SyncCoordinator) -> SyncSnapshot {
    until(c, |s| {
        s.connection_status == ConnectionStatus::Connected && s.vote_items.is_some()
    })
    .await
}

#[tokio::test(start_paused = true)]
async fn test_initial_load_builds_leaderboard() {
    let rig = Rig::new(vec![item(1, 10), item(2, 30), item(3, 20)]);
    let c = rig.start(SyncConfig::new(7));

    let snap = live(&c).await;
    assert_eq!(snap.total_votes, 60);
    assert!(!snap.is_loading);
    assert!(snap.error.is_none());
    let order: Vec<ItemId> = snap.leaderboard.iter().map(|r| r.item.id).collect();
    assert_eq!(order, vec![2, 3, 1]);
    assert_eq!(rig.manager.channel_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_initial_load_reports_once() {
    let rig = Rig::new(vec![item(1, 10)]);
    rig.source.script([Load::Fail(SyncError::network("dns failure"))]);
    let c = rig.start(SyncConfig::new(7));

    let snap = until(&c, |s| s.error.is_some()).await;
    assert!(!snap.is_loading);
    assert!(snap.vote_items.is_none());
    assert_eq!(snap.error, Some(SyncError::network("dns failure")));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(rig.observer.errors(), vec![SyncError::network("dns failure")]);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_channel_falls_back_to_polling() {
    let rig = Rig::new(vec![item(1, 10)]);
    rig.transport.script([
        Open::Accept,
        Open::Fail(SyncError::transport("reset")),
        Open::Fail(SyncError::transport("reset")),
    ]);
    let c = rig.start(SyncConfig {
        max_retries: 2,
        polling_interval: Duration::from_secs(10),
        ..SyncConfig::new(7)
    });
    live(&c).await;
    assert!(!c.snapshot().polling_active);
    let loads = rig.source.calls();

    assert!(rig
        .transport
        .send(VOTE, ChannelMessage::Error(SyncError::transport("socket closed"))));
    let snap = until(&c, |s| s.connection_status == ConnectionStatus::Disconnected).await;
    assert!(snap.polling_active);
    assert_eq!(
        rig.observer.statuses(),
        vec![
            ConnectionStatus::Connected,
            ConnectionStatus::Reconnecting,
            ConnectionStatus::Disconnected,
        ]
    );
    assert_eq!(rig.observer.errors().len(), 3);

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert!(rig.source.calls() > loads);
}

#[tokio::test(start_paused = true)]
async fn test_manual_reconnect_from_error_resets_attempts() {
    let rig = Rig::new(vec![item(1, 10)]);
    rig.transport.script([
        Open::Fail(SyncError::transport("reset")),
        Open::Fail(SyncError::auth("token expired")),
    ]);
    let c = rig.start(SyncConfig {
        max_retries: 3,
        ..SyncConfig::new(7)
    });

    let snap = until(&c, |s| s.connection_status == ConnectionStatus::Error).await;
    assert_eq!(snap.error, Some(SyncError::auth("token expired")));
    let parked = rig.manager.connection_status(&VOTE).expect("channel open");
    assert_eq!(parked.reconnect_attempts, 1);

    c.manual_reconnect().await.expect("coordinator running");
    let snap = live(&c).await;
    assert!(snap.error.is_none());
    let info = rig.manager.connection_status(&VOTE).expect("channel open");
    assert_eq!(info.reconnect_attempts, 0);
    assert_eq!(rig.transport.opens(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_out_of_order_events_keep_highest_total() {
    let rig = Rig::new(vec![item(1, 100), item(2, 5)]);
    let c = rig.start(SyncConfig::new(7));
    live(&c).await;

    assert!(rig.transport.push(VOTE, update(1, 7, 120)));
    assert!(rig.transport.push(VOTE, update(1, 7, 110)));
    tokio::time::sleep(Duration::from_secs(3)).await;

    let snap = c.snapshot();
    assert_eq!(total_of(&snap, 1), Some(120));
    assert_eq!(snap.total_votes, 125);
    assert_eq!(snap.event_count, 1);
    assert_eq!(rig.observer.updates(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_burst_coalesces_to_latest_total() {
    let rig = Rig::new(vec![item(1, 1)]);
    let c = rig.start(SyncConfig::new(7));
    live(&c).await;

    for total in [10, 20, 30] {
        assert!(rig.transport.push(VOTE, update(1, 7, total)));
    }
    let snap = until(&c, |s| total_of(s, 1) == Some(30)).await;
    assert_eq!(snap.event_count, 2);
    assert_eq!(rig.observer.updates(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unthrottled_events_merge_immediately() {
    let rig = Rig::new(vec![item(1, 1)]);
    let c = rig.start(SyncConfig {
        event_throttle: Duration::ZERO,
        ..SyncConfig::new(7)
    });
    live(&c).await;

    for total in [10, 20, 30] {
        assert!(rig.transport.push(VOTE, update(1, 7, total)));
    }
    let snap = until(&c, |s| total_of(s, 1) == Some(30)).await;
    assert_eq!(snap.event_count, 3);
}

#[tokio::test(start_paused = true)]
async fn test_events_for_other_votes_ignored() {
    let rig = Rig::new(vec![item(1, 1)]);
    let c = rig.start(SyncConfig::new(7));
    live(&c).await;

    assert!(rig.transport.push(VOTE, update(5, 8, 99)));
    assert!(rig.transport.push(VOTE, update(2, 7, 4)));
    let snap = until(&c, |s| total_of(s, 2) == Some(4)).await;
    assert_eq!(total_of(&snap, 5), None);
    assert_eq!(snap.event_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_status_flaps_are_debounced() {
    let rig = Rig::new(vec![item(1, 1)]);
    let c = rig.start(SyncConfig {
        status_debounce: Duration::from_secs(2),
        max_retries: 1,
        ..SyncConfig::new(7)
    });
    live(&c).await;
    tokio::time::sleep(Duration::from_secs(3)).await;

    // connecting and connected land inside one window
    assert_eq!(rig.observer.statuses(), vec![ConnectionStatus::Connected]);

    // error, reconnecting, connected: settles where it started
    assert!(rig
        .transport
        .send(VOTE, ChannelMessage::Error(SyncError::transport("reset"))));
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(rig.transport.opens(), 2);
    assert_eq!(rig.observer.statuses(), vec![ConnectionStatus::Connected]);
    assert_eq!(c.snapshot().connection_status, ConnectionStatus::Connected);

    // error, reconnecting, error, disconnected: only the last one commits
    rig.transport.script([Open::Fail(SyncError::transport("refused"))]);
    assert!(rig
        .transport
        .send(VOTE, ChannelMessage::Error(SyncError::transport("reset"))));
    let snap = until(&c, |s| s.connection_status == ConnectionStatus::Disconnected).await;
    assert!(snap.polling_active);
    assert_eq!(
        rig.observer.statuses(),
        vec![ConnectionStatus::Connected, ConnectionStatus::Disconnected]
    );
    assert_eq!(rig.observer.errors().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_status_notices_still_commit_latest_status() {
    let rig = Rig::with_listener_capacity(vec![item(1, 10)], 1);
    let mut bus = rig.manager.bus().subscribe();
    rig.transport.script([Open::Accept, Open::Fail(SyncError::transport("refused"))]);
    let c = rig.start(SyncConfig {
        max_retries: 1,
        ..SyncConfig::new(7)
    });
    live(&c).await;
    assert!(!c.snapshot().polling_active);

    assert!(rig
        .transport
        .send(VOTE, ChannelMessage::Error(SyncError::transport("socket closed"))));
    let snap = until(&c, |s| s.connection_status == ConnectionStatus::Disconnected).await;
    assert!(snap.polling_active);

    let mut overflowed = false;
    while let Ok(ev) = bus.try_recv() {
        overflowed |= ev.kind == EventKind::ListenerOverflow
            && ev.topic.as_deref() == Some("status_notices");
    }
    assert!(overflowed, "terminal notice was dropped on the full queue");
}

#[tokio::test(start_paused = true)]
async fn test_dropped_events_trigger_resync() {
    let rig = Rig::with_listener_capacity(vec![item(1, 1)], 1);
    let c = rig.start(SyncConfig {
        event_throttle: Duration::ZERO,
        ..SyncConfig::new(7)
    });
    live(&c).await;
    assert_eq!(rig.source.calls(), 1);

    rig.source.set_fallback(vec![item(1, 30), item(2, 4)]);
    for total in [10, 20, 30] {
        assert!(rig.transport.push(VOTE, update(1, 7, total)));
    }
    let snap = until(&c, |s| total_of(s, 2) == Some(4)).await;
    assert_eq!(total_of(&snap, 1), Some(30));
    assert_eq!(snap.total_votes, 34);
    assert_eq!(rig.source.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_triggers_resync_fetch() {
    let rig = Rig::new(vec![item(1, 1)]);
    let c = rig.start(SyncConfig::new(7));
    live(&c).await;
    assert_eq!(rig.source.calls(), 1);

    rig.source.set_fallback(vec![item(1, 50)]);
    rig.transport.close(VOTE);
    let snap = until(&c, |s| {
        total_of(s, 1) == Some(50) && s.connection_status == ConnectionStatus::Connected
    })
    .await;
    assert_eq!(rig.source.calls(), 2);
    assert!(!snap.polling_active);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_during_initial_load_fetches_again() {
    let rig = Rig::new(vec![item(1, 12)]);
    rig.source
        .script([Load::Slow(Duration::from_secs(5), vec![item(1, 10), item(2, 1)])]);
    let c = rig.start(SyncConfig::new(7));

    let (first, second) = tokio::join!(c.refresh_data(), c.refresh_data());
    first.expect("refresh");
    second.expect("refresh");
    assert_eq!(rig.source.calls(), 2);
    let snap = c.snapshot();
    assert_eq!(total_of(&snap, 1), Some(12));
    assert_eq!(total_of(&snap, 2), None);
    assert!(!snap.is_loading);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_replaces_items_after_poll_in_flight() {
    let rig = Rig::new(vec![item(1, 10), item(2, 20)]);
    let c = rig.start(SyncConfig {
        realtime: false,
        polling_interval: Duration::from_secs(5),
        ..SyncConfig::new(7)
    });
    until(&c, |s| s.vote_items.is_some()).await;

    rig.source
        .script([Load::Slow(Duration::from_secs(3), vec![item(1, 10)])]);
    rig.source.set_fallback(vec![item(1, 10)]);
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(rig.source.calls(), 2, "poll in flight");

    c.refresh_data().await.expect("refresh");
    assert_eq!(rig.source.calls(), 3);
    let snap = c.snapshot();
    let ids: Vec<ItemId> = snap
        .vote_items
        .iter()
        .flatten()
        .map(|i| i.id)
        .collect();
    assert_eq!(ids, vec![1]);
    assert_eq!(snap.total_votes, 10);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_failure_keeps_items() {
    let rig = Rig::new(vec![item(1, 10)]);
    let c = rig.start(SyncConfig::new(7));
    live(&c).await;

    rig.source.script([Load::Fail(SyncError::network("502"))]);
    let err = c.refresh_data().await.expect_err("refresh fails");
    assert_eq!(err, SyncError::network("502"));

    let snap = c.snapshot();
    assert_eq!(total_of(&snap, 1), Some(10));
    assert_eq!(snap.error, Some(err));
    assert!(!snap.is_loading);

    c.refresh_data().await.expect("refresh");
    assert!(c.snapshot().error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_disable_releases_everything() {
    let rig = Rig::new(vec![item(1, 10)]);
    let c = rig.start(SyncConfig {
        enabled: false,
        ..SyncConfig::new(7)
    });

    assert_eq!(c.refresh_data().await, Err(SyncError::Disabled));
    assert_eq!(rig.manager.channel_count(), 0);
    assert_eq!(rig.source.calls(), 0);

    c.set_enabled(true).await.expect("coordinator running");
    live(&c).await;
    assert_eq!(rig.manager.channel_count(), 1);

    c.set_enabled(false).await.expect("coordinator running");
    let snap = until(&c, |s| s.vote_items.is_none()).await;
    assert_eq!(snap.connection_status, ConnectionStatus::Disconnected);
    assert_eq!(rig.manager.channel_count(), 0);
    assert_eq!(rig.manager.listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_no_callbacks_after_shutdown() {
    let rig = Rig::new(vec![item(1, 10)]);
    let c = rig.start(SyncConfig {
        event_throttle: Duration::ZERO,
        ..SyncConfig::new(7)
    });
    live(&c).await;
    let updates = rig.observer.updates();

    c.shutdown().await;
    assert_eq!(rig.manager.channel_count(), 0);
    assert_eq!(rig.manager.listener_count(), 0);

    rig.transport.push(VOTE, update(1, 7, 99));
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(rig.observer.updates(), updates);
}

#[tokio::test(start_paused = true)]
async fn test_armed_timers_are_dropped_on_shutdown() {
    let rig = Rig::new(vec![item(1, 10)]);
    let c = rig.start(SyncConfig::new(7));
    live(&c).await;
    let snapshots = c.watch();

    assert!(rig.transport.push(VOTE, update(1, 7, 20)));
    assert!(rig.transport.push(VOTE, update(1, 7, 30)));
    assert!(rig
        .transport
        .send(VOTE, ChannelMessage::Error(SyncError::transport("reset"))));
    tokio::time::sleep(Duration::from_millis(100)).await;

    // throttle holds 30, debounce holds reconnecting
    let before = c.snapshot();
    assert_eq!(total_of(&before, 1), Some(20));
    assert_eq!(before.connection_status, ConnectionStatus::Connected);
    let calls = (
        rig.observer.updates(),
        rig.observer.statuses(),
        rig.observer.errors(),
    );

    c.shutdown().await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(*snapshots.borrow(), before);
    assert_eq!(
        (
            rig.observer.updates(),
            rig.observer.statuses(),
            rig.observer.errors(),
        ),
        calls
    );
    assert_eq!(rig.source.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_stops_coordinator() {
    let rig = Rig::new(vec![item(1, 10)]);
    let c = rig.start(SyncConfig::new(7));
    live(&c).await;

    drop(c);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(rig.manager.channel_count(), 0);
    assert_eq!(rig.manager.listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_polling_only_mode() {
    let rig = Rig::new(vec![item(1, 10)]);
    let c = rig.start(SyncConfig {
        realtime: false,
        polling_interval: Duration::from_secs(5),
        ..SyncConfig::new(7)
    });

    let snap = until(&c, |s| s.vote_items.is_some()).await;
    assert!(snap.polling_active);
    assert_eq!(rig.manager.channel_count(), 0);

    rig.source.set_fallback(vec![item(1, 10), item(2, 3)]);
    let snap = until(&c, |s| total_of(s, 2) == Some(3)).await;
    assert_eq!(snap.total_votes, 13);
    assert!(rig.source.calls() >= 2);
}

#[tokio::test(start_paused = true)]
async fn test_battery_saver_requires_battery() {
    let rig = Rig::new(vec![item(1, 10)]);
    let c = rig.start(SyncConfig::new(7));

    let err = c.toggle_battery_saver().await.expect_err("no battery");
    assert_eq!(err, SyncError::Unsupported { capability: "battery" });
    assert!(!c.snapshot().battery_saver);
}

#[tokio::test(start_paused = true)]
async fn test_hidden_page_suspends_with_battery_saver() {
    let rig = Rig::new(vec![item(1, 10)]);
    let probe = FakeProbe {
        battery: Some(BatteryStatus {
            level: Some(0.8),
            is_charging: Some(false),
        }),
        ..FakeProbe::default()
    };
    let (signals, rx) = mpsc::channel(8);
    let c = rig
        .builder(SyncConfig::new(7))
        .with_probe(Arc::new(probe))
        .with_host_signals(rx)
        .build();
    let snap = live(&c).await;
    assert!(snap.battery_saver);

    signals.send(HostSignal::Visibility(false)).await.expect("monitor running");
    let snap = until(&c, |s| s.connection_status == ConnectionStatus::Suspended).await;
    assert!(!snap.system_status.is_page_visible);
    assert!(!snap.polling_active);

    signals.send(HostSignal::Visibility(true)).await.expect("monitor running");
    live(&c).await;
    assert_eq!(rig.transport.opens(), 2);

    assert!(!c.toggle_battery_saver().await.expect("battery present"));
    signals.send(HostSignal::Visibility(false)).await.expect("monitor running");
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(c.snapshot().connection_status, ConnectionStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_going_offline_parks_channel() {
    let rig = Rig::new(vec![item(1, 10)]);
    let (signals, rx) = mpsc::channel(8);
    let c = rig.builder(SyncConfig::new(7)).with_host_signals(rx).build();
    live(&c).await;

    signals.send(HostSignal::Online(false)).await.expect("monitor running");
    tokio::time::sleep(Duration::from_millis(10)).await;
    rig.transport.close(VOTE);
    let snap = until(&c, |s| s.connection_status == ConnectionStatus::NetworkError).await;
    assert!(!snap.system_status.is_online);
    assert!(!snap.polling_active);
    let opens = rig.transport.opens();

    signals.send(HostSignal::Online(true)).await.expect("monitor running");
    live(&c).await;
    assert_eq!(rig.transport.opens(), opens + 1);
}

#[tokio::test(start_paused = true)]
async fn test_toggle_smart_reconnect() {
    let rig = Rig::new(vec![item(1, 10)]);
    let c = rig.start(SyncConfig::new(7));

    assert!(!c.toggle_smart_reconnect().await.expect("running"));
    until(&c, |s| !s.smart_reconnect).await;
    assert!(c.toggle_smart_reconnect().await.expect("running"));
}

#[tokio::test(start_paused = true)]
async fn test_items_enriched_with_artists() {
    let rig = Rig::new(vec![item(1, 10).with_artist_id(4), item(2, 5).with_artist_id(4)]);
    let cache = Arc::new(ArtistCache::default());
    let directory = Arc::new(FakeDirectory::default());
    let dir: Arc<dyn ArtistDirectory> = directory.clone();
    let c = rig
        .builder(SyncConfig::new(7))
        .with_artists(Arc::clone(&cache), dir)
        .build();

    let snap = until(&c, |s| {
        s.vote_items
            .as_ref()
            .is_some_and(|items| items.iter().all(|i| i.artist.is_some()))
    })
    .await;
    assert_eq!(snap.leaderboard[0].item.artist.as_ref().map(|a| a.name.as_str()), Some("artist-4"));
    assert_eq!(directory.calls(), 1);
    assert_eq!(cache.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_artist_lookup_retried_on_next_merge() {
    let rig = Rig::new(vec![item(1, 10).with_artist_id(4)]);
    let directory = Arc::new(FakeDirectory::failing(1));
    let dir: Arc<dyn ArtistDirectory> = directory.clone();
    let c = rig
        .builder(SyncConfig {
            event_throttle: Duration::ZERO,
            ..SyncConfig::new(7)
        })
        .with_artists(Arc::new(ArtistCache::default()), dir)
        .build();
    live(&c).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(directory.calls(), 1);
    assert!(c.snapshot().leaderboard[0].item.artist.is_none());

    let with_artist = serde_json::json!({
        "type": "vote_item_updated",
        "payload": {"id": 1, "vote_id": 7, "vote_total": 11, "artist_id": 4}
    });
    assert!(rig.transport.push(VOTE, with_artist));
    let snap = until(&c, |s| {
        s.leaderboard
            .first()
            .is_some_and(|r| r.item.artist.is_some())
    })
    .await;
    assert_eq!(total_of(&snap, 1), Some(11));
    assert_eq!(directory.calls(), 2);
}

struct Panicky;

impl SyncObserver for Panicky {
    fn on_vote_update(&self, _items: &[VoteItem]) {
        panic!("render failed");
    }
}

#[tokio::test(start_paused = true)]
async fn test_panicking_observer_is_contained() {
    let rig = Rig::new(vec![item(1, 1), item(2, 1)]);
    let source: Arc<dyn VoteResultsSource> = rig.source.clone();
    let c = SyncCoordinator::builder(rig.manager.clone(), source, SyncConfig::new(7))
        .with_observer(Arc::new(Panicky))
        .build();
    live(&c).await;

    assert!(rig.transport.push(VOTE, update(1, 7, 5)));
    assert!(rig.transport.push(VOTE, update(2, 7, 6)));
    let snap = until(&c, |s| s.event_count == 2).await;
    assert_eq!(snap.total_votes, 11);
}

#[tokio::test(start_paused = true)]
async fn test_render_metrics() {
    let rig = Rig::new(vec![item(1, 1)]);
    let c = rig.start(SyncConfig::new(7));
    live(&c).await;

    c.record_render(Duration::from_millis(4));
    c.record_render(Duration::from_millis(6));
    let metrics = c.performance_metrics();
    assert_eq!(metrics.render_count, 2);
    assert_eq!(metrics.last_render_time, Some(Duration::from_millis(6)));
    assert!(metrics.memory_usage.is_some_and(|m| m > 0));
}
