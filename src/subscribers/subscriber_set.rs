//! # SubscriberSet: category routing of bus events.
//!
//! Every subscriber gets its own bounded queue and worker task. An event is
//! queued only for subscribers whose [`Subscribe::categories`] contain the
//! event's [`EventCategory`], so a merge-metrics subscriber never pays for
//! channel chatter.
//!
//! ```text
//! emit(VoteMerged)   category = Merge
//!     ├──► "log"     [Delivery, Channel, Merge, Fetch, Host] ──try_send──► worker ──► on_event
//!     ├──► "merges"  [Merge]                                  ──try_send──► worker ──► on_event
//!     └──► "status"  [Channel]                                  (skipped)
//! ```
//!
//! A full queue drops the event for that subscriber and publishes
//! `SubscriberOverflow`, except for overflow events themselves. A panicking
//! subscriber is reported as `SubscriberPanicked` and keeps its worker.

use std::any::Any;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;

use crate::events::{Bus, Event, EventCategory};
use crate::subscribers::Subscribe;

struct Route {
    name: &'static str,
    categories: &'static [EventCategory],
    queue: mpsc::Sender<Arc<Event>>,
}

/// Routes bus events to subscriber workers.
///
/// Workers stop once the set is dropped and their queues drain.
pub struct SubscriberSet {
    routes: Vec<Route>,
    bus: Bus,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber. Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let routes = subs
            .into_iter()
            .map(|sub| {
                let (queue, rx) = mpsc::channel(sub.queue_capacity().max(1));
                let route = Route {
                    name: sub.name(),
                    categories: sub.categories(),
                    queue,
                };
                tokio::spawn(worker(sub, rx, bus.clone()));
                route
            })
            .collect();
        Self { routes, bus }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Queues `event` for every interested subscriber without waiting.
    pub fn emit(&self, event: &Event) {
        let category = event.kind.category();
        let mut shared: Option<Arc<Event>> = None;
        for route in self.routes.iter().filter(|r| r.categories.contains(&category)) {
            let ev = shared.get_or_insert_with(|| Arc::new(event.clone()));
            let reason = match route.queue.try_send(Arc::clone(ev)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if !event.is_subscriber_overflow() {
                self.bus.publish(Event::subscriber_overflow(route.name, reason));
            }
        }
    }
}

async fn worker(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(ev) = rx.recv().await {
        let delivery = std::panic::AssertUnwindSafe(sub.on_event(ev.as_ref()));
        if let Err(panic) = delivery.catch_unwind().await {
            let info = panic_message(panic.as_ref());
            tracing::error!(subscriber = sub.name(), kind = ?ev.kind, %info, "subscriber panicked");
            bus.publish(Event::subscriber_panicked(sub.name(), info));
        }
    }
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&'static str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Recorder {
        name: &'static str,
        categories: &'static [EventCategory],
        seen: Mutex<Vec<EventKind>>,
    }

    impl Recorder {
        fn new(name: &'static str, categories: &'static [EventCategory]) -> Arc<Self> {
            Arc::new(Self {
                name,
                categories,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<EventKind> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, ev: &Event) {
            self.seen.lock().unwrap().push(ev.kind);
        }
        fn name(&self) -> &'static str {
            self.name
        }
        fn categories(&self) -> &'static [EventCategory] {
            self.categories
        }
    }

    struct Panicky;

    #[async_trait]
    impl Subscribe for Panicky {
        async fn on_event(&self, _ev: &Event) {
            panic!("boom");
        }
        fn name(&self) -> &'static str {
            "panicky"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_routes_by_category() {
        let bus = Bus::new(16);
        let all = Recorder::new("all", EventCategory::ALL);
        let merges = Recorder::new("merges", &[EventCategory::Merge]);
        let set = SubscriberSet::new(vec![all.clone(), merges.clone()], bus);

        set.emit(&Event::new(EventKind::ChannelConnected));
        set.emit(&Event::new(EventKind::VoteMerged));
        set.emit(&Event::new(EventKind::PollSkipped));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(
            all.seen(),
            vec![EventKind::ChannelConnected, EventKind::VoteMerged, EventKind::PollSkipped]
        );
        assert_eq!(merges.seen(), vec![EventKind::VoteMerged]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_subscriber_is_isolated() {
        let bus = Bus::new(16);
        let mut bus_rx = bus.subscribe();
        let all = Recorder::new("all", EventCategory::ALL);
        let set = SubscriberSet::new(vec![Arc::new(Panicky), all.clone()], bus);

        set.emit(&Event::new(EventKind::VoteMerged));
        set.emit(&Event::new(EventKind::VoteDiscarded));

        let ev = bus_rx.recv().await.expect("panic reported");
        assert_eq!(ev.kind, EventKind::SubscriberPanicked);
        assert_eq!(ev.topic.as_deref(), Some("panicky"));
        assert_eq!(ev.reason.as_deref(), Some("boom"));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(all.seen().len(), 2);
    }

    #[test]
    fn test_every_kind_has_a_category() {
        assert_eq!(EventKind::ListenerOverflow.category(), EventCategory::Delivery);
        assert_eq!(EventKind::StatusCommitted.category(), EventCategory::Channel);
        assert_eq!(EventKind::StaleResultDropped.category(), EventCategory::Fetch);
        assert_eq!(EventKind::SystemStatusChanged.category(), EventCategory::Host);
    }
}
