//! # PollingFallback: periodic single-flight fetches.
//!
//! When realtime is disabled or degraded, the coordinator keeps totals fresh
//! by polling. The poller is a ticker task driven by a [`PollPlan`] that the
//! coordinator pushes whenever its inputs change.
//!
//! ```text
//! coordinator ──set_plan()──► watch<PollPlan> ──► ticker ──tick──► Fetcher::try_fetch(Poll)
//! refresh_data() ───────────────────────────────────────────────► Fetcher::try_fetch(Refresh)
//!                                                                      │
//!                                       in flight? ──yes──► PollSkipped (dropped, never queued)
//!                                                   └─no──► spawn fetch ──► FetchOutcome ──► coordinator
//! ```
//!
//! The fetcher itself never queues. A skipped refresh or resync is re-issued by
//! the coordinator once the outcome in flight arrives.
//!
//! ## Cadence
//! - base interval `0` disables polling
//! - doubled on a slow connection
//! - doubled again with battery saver on and a low battery
//! - paused while offline or suspended

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event, EventKind};
use crate::fetch::{load_bounded, FetchKind, FetchOutcome, RequestIds, VoteResultsSource};
use crate::model::{SystemStatus, VoteId};

/// Whether and how often to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPlan {
    pub active: bool,
    /// Effective interval after cadence adjustments.
    pub interval: Duration,
}

impl PollPlan {
    /// A plan that never ticks.
    pub const IDLE: PollPlan = PollPlan {
        active: false,
        interval: Duration::ZERO,
    };

    /// Derives the plan from the base interval and the host state.
    pub fn compute(
        base: Duration,
        wanted: bool,
        system: &SystemStatus,
        battery_saver: bool,
        suspended: bool,
    ) -> Self {
        if base.is_zero() || !wanted || !system.is_online || suspended {
            return Self::IDLE;
        }
        let mut interval = base;
        if system.is_slow_connection {
            interval = interval.saturating_mul(2);
        }
        if battery_saver && system.battery.is_low() {
            interval = interval.saturating_mul(2);
        }
        Self {
            active: true,
            interval,
        }
    }

    fn period(&self) -> Option<Duration> {
        (self.active && !self.interval.is_zero()).then_some(self.interval)
    }
}

/// Issues fetches with the single-flight guard.
#[derive(Clone)]
pub(crate) struct Fetcher {
    source: Arc<dyn VoteResultsSource>,
    vote_id: VoteId,
    timeout: Option<Duration>,
    ids: RequestIds,
    in_flight: Arc<AtomicBool>,
    results: mpsc::Sender<FetchOutcome>,
    topic: Arc<str>,
    bus: Bus,
    token: CancellationToken,
}

impl Fetcher {
    pub fn new(
        source: Arc<dyn VoteResultsSource>,
        vote_id: VoteId,
        timeout: Option<Duration>,
        results: mpsc::Sender<FetchOutcome>,
        bus: Bus,
        token: CancellationToken,
    ) -> Self {
        Self {
            source,
            vote_id,
            timeout,
            ids: RequestIds::new(),
            in_flight: Arc::new(AtomicBool::new(false)),
            results,
            topic: Arc::from(format!("vote:{vote_id}")),
            bus,
            token,
        }
    }

    /// Starts a fetch unless one is in flight. Returns the request id if started.
    pub fn try_fetch(&self, kind: FetchKind) -> Option<u64> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            self.bus.publish(
                Event::new(EventKind::PollSkipped)
                    .with_topic(Arc::clone(&self.topic))
                    .with_reason(kind.as_str()),
            );
            return None;
        }

        let request = self.ids.next();
        let this = self.clone();
        tokio::spawn(async move {
            let load = load_bounded(this.source.as_ref(), this.vote_id, this.timeout);
            select! {
                _ = this.token.cancelled() => {}
                result = load => {
                    this.in_flight.store(false, Ordering::Release);
                    let _ = this.results.send(FetchOutcome { request, kind, result }).await;
                    return;
                }
            }
            this.in_flight.store(false, Ordering::Release);
        });
        Some(request)
    }

    #[cfg(test)]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Handle of the polling ticker.
pub(crate) struct PollingFallback {
    plan: watch::Sender<PollPlan>,
    fetcher: Fetcher,
}

impl PollingFallback {
    /// Spawns the ticker; it stops when the fetcher's token is cancelled.
    pub fn spawn(fetcher: Fetcher) -> Self {
        let (plan, plan_rx) = watch::channel(PollPlan::IDLE);
        tokio::spawn(ticker(plan_rx, fetcher.clone()));
        Self { plan, fetcher }
    }

    /// Replaces the plan; an unchanged plan keeps the running timer.
    pub fn set_plan(&self, next: PollPlan) {
        self.plan.send_if_modified(|plan| {
            if *plan == next {
                return false;
            }
            *plan = next;
            true
        });
    }

    pub fn plan(&self) -> PollPlan {
        *self.plan.borrow()
    }

    /// Immediate fetch outside the cadence.
    pub fn fetch_now(&self, kind: FetchKind) -> Option<u64> {
        self.fetcher.try_fetch(kind)
    }
}

async fn ticker(mut plan: watch::Receiver<PollPlan>, fetcher: Fetcher) {
    let token = fetcher.token.clone();
    loop {
        let period = plan.borrow_and_update().period();
        match period {
            None => select! {
                _ = token.cancelled() => break,
                changed = plan.changed() => if changed.is_err() { break },
            },
            Some(period) => {
                let sleep = time::sleep(period);
                tokio::pin!(sleep);
                select! {
                    _ = token.cancelled() => break,
                    changed = plan.changed() => if changed.is_err() { break },
                    _ = &mut sleep => {
                        fetcher.try_fetch(FetchKind::Poll);
                    }
                }
            }
        }
    }
    tracing::trace!(topic = %fetcher.topic, "poll ticker stopped");
}
