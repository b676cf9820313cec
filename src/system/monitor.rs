//! # SystemStatusMonitor: host environment as a watch value.
//!
//! The monitor reads an initial [`SystemStatus`] from a [`HostProbe`] and then
//! folds [`HostSignal`]s into it. Every observable change is published on a
//! `watch` channel and as a `SystemStatusChanged` event; signals that change
//! nothing publish nothing.
//!
//! ```text
//! HostProbe ──(initial)──► SystemStatus ──► watch::Sender ──► coordinator
//! HostSignal stream ──apply──┘
//! ```
//!
//! The monitor never fails. A slow connection is an effective type of
//! `slow-2g` or `2g`, or save-data being on.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event, EventKind};
use crate::model::{ConnectionType, SystemStatus};
use crate::system::{HostProbe, HostSignal};

/// Owns the current [`SystemStatus`] and publishes its changes.
pub struct SystemStatusMonitor {
    tx: watch::Sender<SystemStatus>,
    save_data: bool,
    bus: Bus,
}

impl SystemStatusMonitor {
    /// Reads the initial status from `probe`; absent capabilities keep defaults.
    pub fn new(probe: &dyn HostProbe, bus: Bus) -> Self {
        let mut status = SystemStatus::default();
        if let Some(online) = probe.online() {
            status.is_online = online;
        }
        if let Some(visible) = probe.page_visible() {
            status.is_page_visible = visible;
        }
        if let Some(battery) = probe.battery() {
            status.battery = battery;
        }
        let save_data = probe.save_data().unwrap_or(false);
        status.connection_type = probe
            .effective_type()
            .map(|label| ConnectionType::from_label(&label));
        status.is_slow_connection = is_slow(status.connection_type, save_data);

        let (tx, _rx) = watch::channel(status);
        Self { tx, save_data, bus }
    }

    /// Current status.
    pub fn status(&self) -> SystemStatus {
        self.tx.borrow().clone()
    }

    /// Receiver following every published change.
    pub fn subscribe(&self) -> watch::Receiver<SystemStatus> {
        self.tx.subscribe()
    }

    /// Whether the host reports battery state.
    pub fn battery_supported(&self) -> bool {
        self.tx.borrow().battery.is_supported()
    }

    /// Folds one signal into the status. Returns `true` if it changed.
    pub fn apply(&mut self, signal: HostSignal) -> bool {
        let mut summary = String::new();
        let save_data = &mut self.save_data;
        let changed = self.tx.send_if_modified(|status| {
            let before = status.clone();
            match signal {
                HostSignal::Online(online) => {
                    status.is_online = online;
                    summary = format!("online={online}");
                }
                HostSignal::Network {
                    effective_type,
                    save_data: data_saver,
                } => {
                    status.connection_type =
                        effective_type.as_deref().map(ConnectionType::from_label);
                    *save_data = data_saver.unwrap_or(false);
                    status.is_slow_connection = is_slow(status.connection_type, *save_data);
                    summary = format!("slow={}", status.is_slow_connection);
                }
                HostSignal::Visibility(visible) => {
                    status.is_page_visible = visible;
                    summary = format!("visible={visible}");
                }
                HostSignal::Battery(battery) => {
                    status.battery = battery;
                    summary = format!("battery_low={}", battery.is_low());
                }
            }
            *status != before
        });
        if changed {
            self.bus
                .publish(Event::new(EventKind::SystemStatusChanged).with_reason(summary));
        }
        changed
    }

    /// Applies signals from `signals` until the stream ends or `token` is cancelled.
    pub fn spawn_listener(
        mut self,
        mut signals: mpsc::Receiver<HostSignal>,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    signal = signals.recv() => match signal {
                        Some(signal) => {
                            self.apply(signal);
                        }
                        None => break,
                    },
                }
            }
        })
    }
}

fn is_slow(connection_type: Option<ConnectionType>, save_data: bool) -> bool {
    save_data || connection_type.is_some_and(|t| t.is_slow())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeProbe;
    use crate::model::BatteryStatus;
    use crate::system::NoProbe;

    #[test]
    fn test_missing_capabilities_use_safe_defaults() {
        let monitor = SystemStatusMonitor::new(&NoProbe, Bus::new(8));
        let status = monitor.status();
        assert!(status.is_online);
        assert!(status.is_page_visible);
        assert!(!status.is_slow_connection);
        assert_eq!(status.connection_type, None);
        assert!(!monitor.battery_supported());
    }

    #[test]
    fn test_initial_probe_values() {
        let probe = FakeProbe {
            online: Some(false),
            effective_type: Some("2g"),
            battery: Some(BatteryStatus {
                level: Some(0.5),
                is_charging: Some(true),
            }),
            ..FakeProbe::default()
        };
        let monitor = SystemStatusMonitor::new(&probe, Bus::new(8));
        let status = monitor.status();
        assert!(!status.is_online);
        assert!(status.is_slow_connection);
        assert_eq!(status.connection_type, Some(ConnectionType::TwoG));
        assert!(monitor.battery_supported());
    }

    #[test]
    fn test_save_data_counts_as_slow() {
        let mut monitor = SystemStatusMonitor::new(&NoProbe, Bus::new(8));
        assert!(monitor.apply(HostSignal::Network {
            effective_type: Some("4g".into()),
            save_data: Some(true),
        }));
        assert!(monitor.status().is_slow_connection);
    }

    #[tokio::test]
    async fn test_unchanged_signal_publishes_nothing() {
        let bus = Bus::new(8);
        let mut bus_rx = bus.subscribe();
        let mut monitor = SystemStatusMonitor::new(&NoProbe, bus);
        let mut rx = monitor.subscribe();

        assert!(!monitor.apply(HostSignal::Online(true)));
        assert!(!rx.has_changed().expect("sender alive"));
        assert!(bus_rx.try_recv().is_err());

        assert!(monitor.apply(HostSignal::Visibility(false)));
        assert!(rx.has_changed().expect("sender alive"));
        assert!(!rx.borrow_and_update().is_page_visible);
        let ev = bus_rx.recv().await.expect("event");
        assert_eq!(ev.kind, EventKind::SystemStatusChanged);
    }

    #[tokio::test]
    async fn test_listener_applies_stream() {
        let monitor = SystemStatusMonitor::new(&NoProbe, Bus::new(8));
        let mut rx = monitor.subscribe();
        let (tx, signals) = mpsc::channel(4);
        let token = CancellationToken::new();
        let handle = monitor.spawn_listener(signals, token.clone());

        tx.send(HostSignal::Online(false)).await.expect("listener alive");
        rx.changed().await.expect("changed");
        assert!(!rx.borrow().is_online);

        token.cancel();
        handle.await.expect("listener joins");
    }
}
