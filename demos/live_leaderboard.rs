//! # Example: live_leaderboard
//!
//! Wires an in-process transport and results API into a [`SyncCoordinator`].
//!
//! Shows how to:
//! - Implement [`Transport`] and [`VoteResultsSource`].
//! - Watch [`SyncSnapshot`]s and react through a [`SyncObserver`].
//! - Fall back to polling when the realtime channel gives up.
//!
//! ## Flow
//! ```text
//! LoopbackTransport ──payloads──► ConnectionManager ──► SyncCoordinator ──► watch<SyncSnapshot>
//! Ballots (API)     ──initial / resync / poll──────────►       │
//!                                                              └──► PrintObserver
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example live_leaderboard
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use votesync::{
    ChannelMessage, ChannelRx, ConnectionManager, ConnectionStatus, SyncConfig, SyncCoordinator,
    SyncError, SyncObserver, Topic, Transport, VoteId, VoteItem, VoteResults, VoteResultsSource,
};

/// Server-side tallies shared by the fake API and the fake socket.
#[derive(Default)]
struct Ballots {
    totals: Mutex<HashMap<i64, u64>>,
}

impl Ballots {
    fn cast(&self, item: i64, votes: u64) -> u64 {
        let mut totals = self.totals.lock().unwrap();
        let total = totals.entry(item).or_default();
        *total += votes;
        *total
    }
}

#[async_trait]
impl VoteResultsSource for Ballots {
    async fn load_vote_results(&self, vote_id: VoteId) -> Result<VoteResults, SyncError> {
        let totals = self.totals.lock().unwrap();
        let items = totals
            .iter()
            .map(|(id, total)| VoteItem::new(*id, vote_id, *total))
            .collect();
        Ok(VoteResults::from_items(items))
    }
}

/// Socket stand-in: the demo pushes payloads into the open channels.
#[derive(Default)]
struct LoopbackTransport {
    open: Mutex<HashMap<Topic, mpsc::Sender<ChannelMessage>>>,
}

impl LoopbackTransport {
    fn push(&self, topic: Topic, msg: ChannelMessage) {
        if let Some(tx) = self.open.lock().unwrap().get(&topic) {
            let _ = tx.try_send(msg);
        }
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn open(&self, topic: &Topic) -> Result<ChannelRx, SyncError> {
        let (tx, rx) = mpsc::channel(64);
        self.open.lock().unwrap().insert(*topic, tx);
        Ok(rx)
    }
}

struct PrintObserver;

impl SyncObserver for PrintObserver {
    fn on_vote_update(&self, items: &[VoteItem]) {
        println!("[observer] {} items after realtime merge", items.len());
    }

    fn on_connection_status_change(&self, status: ConnectionStatus) {
        println!("[observer] status -> {status}");
    }

    fn on_error(&self, error: &SyncError) {
        println!("[observer] error: {error}");
    }
}

#[tokio::main]
async fn main() -> Result<(), SyncError> {
    const VOTE: VoteId = 7;
    let topic = Topic::Vote(VOTE);

    let ballots = Arc::new(Ballots::default());
    ballots.cast(1, 40);
    ballots.cast(2, 25);
    let transport = Arc::new(LoopbackTransport::default());

    let manager = ConnectionManager::builder(transport.clone()).build();
    let cfg = SyncConfig {
        polling_interval: Duration::from_secs(2),
        max_retries: 0,
        ..SyncConfig::new(VOTE)
    };
    let sync = SyncCoordinator::builder(manager, ballots.clone(), cfg)
        .with_observer(Arc::new(PrintObserver))
        .build();

    let mut snapshots = sync.watch();
    snapshots
        .wait_for(|s| s.connection_status == ConnectionStatus::Connected)
        .await
        .map_err(|_| SyncError::Closed)?;

    for (item, votes) in [(2, 30), (1, 5), (2, 1)] {
        let total = ballots.cast(item, votes);
        transport.push(
            topic,
            ChannelMessage::Payload(serde_json::json!({
                "type": "vote_item_updated",
                "payload": {"id": item, "vote_id": VOTE, "vote_total": total}
            })),
        );
        tokio::time::sleep(Duration::from_millis(1200)).await;
    }
    print_board(&sync);

    // the socket dies and no retries are allowed: polling keeps the board fresh
    transport.push(topic, ChannelMessage::Error(SyncError::transport("socket reset")));
    ballots.cast(1, 50);
    snapshots
        .wait_for(|s| s.polling_active && s.total_votes == 151)
        .await
        .map_err(|_| SyncError::Closed)?;
    print_board(&sync);

    sync.shutdown().await;
    Ok(())
}

fn print_board(sync: &SyncCoordinator) {
    let snap = sync.snapshot();
    println!(
        "--- {} total, status {}, polling {} ---",
        snap.total_votes, snap.connection_status, snap.polling_active
    );
    for row in &snap.leaderboard {
        println!("#{} item {} ({} votes)", row.rank, row.item.id, row.item.vote_total);
    }
}
