//! # Listener tables with unsubscribe handles.
//!
//! A [`Listeners`] table holds the observers registered with one notification
//! source (vote events, status notices, data-sync requests). Registering returns
//! a [`ListenerHandle`]; dropping or [`disposing`](ListenerHandle::dispose) the
//! handle removes the observer, so a coordinator can hold all of its handles and
//! release them in one teardown step.
//!
//! ## Delivery
//! ```text
//! emit(scope, &value)
//!     │
//!     ├──► entry 1 (scope: None)        ──try_send──► mpsc ──► observer task
//!     ├──► entry 2 (scope: Some(scope)) ──try_send──► mpsc ──► observer task
//!     └──► entry 3 (scope: Some(other))    (skipped)
//! ```
//!
//! ## Rules
//! - **Non-blocking**: `emit()` uses `try_send`; a full queue drops the value for
//!   that observer, flags its handle and publishes `ListenerOverflow`.
//! - **Self-cleaning**: entries whose receiver was dropped are removed on the next emit.
//! - **Scoped**: an entry with `scope: None` receives every value.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc;

use crate::events::{Bus, Event, EventKind};

/// Type-erased removal used by [`ListenerHandle`].
trait Deregister: Send + Sync {
    fn deregister(&self, id: u64);
}

struct Entry<K, T> {
    id: u64,
    scope: Option<K>,
    tx: mpsc::Sender<T>,
    overflowed: Arc<AtomicBool>,
}

struct Table<K, T> {
    next_id: AtomicU64,
    entries: Mutex<Vec<Entry<K, T>>>,
}

impl<K, T> Table<K, T> {
    fn lock(&self) -> MutexGuard<'_, Vec<Entry<K, T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K: Send + 'static, T: Send + 'static> Deregister for Table<K, T> {
    fn deregister(&self, id: u64) {
        self.lock().retain(|e| e.id != id);
    }
}

/// Registration of one observer; removes it when dropped.
#[must_use = "dropping the handle unregisters the listener"]
pub struct ListenerHandle {
    id: u64,
    table: Weak<dyn Deregister>,
    overflowed: Arc<AtomicBool>,
}

impl ListenerHandle {
    /// Unregisters the listener now.
    pub fn dispose(self) {
        drop(self);
    }

    /// Returns `true` once after values were dropped on a full queue.
    pub fn take_overflow(&self) -> bool {
        self.overflowed.swap(false, Ordering::AcqRel)
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(table) = self.table.upgrade() {
            table.deregister(self.id);
        }
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle").field("id", &self.id).finish()
    }
}

/// Observer table for values of type `T`, optionally scoped by key `K`.
pub(crate) struct Listeners<K, T> {
    name: &'static str,
    table: Arc<Table<K, T>>,
    bus: Bus,
}

impl<K, T> Listeners<K, T>
where
    K: PartialEq + Send + 'static,
    T: Clone + Send + 'static,
{
    pub fn new(name: &'static str, bus: Bus) -> Self {
        Self {
            name,
            table: Arc::new(Table {
                next_id: AtomicU64::new(1),
                entries: Mutex::new(Vec::new()),
            }),
            bus,
        }
    }

    /// Registers `tx`; `scope: None` receives values of every scope.
    pub fn register(&self, scope: Option<K>, tx: mpsc::Sender<T>) -> ListenerHandle {
        let id = self.table.next_id.fetch_add(1, Ordering::Relaxed);
        let overflowed = Arc::new(AtomicBool::new(false));
        self.table.lock().push(Entry {
            id,
            scope,
            tx,
            overflowed: Arc::clone(&overflowed),
        });

        let erased: Arc<dyn Deregister> = self.table.clone();
        ListenerHandle {
            id,
            table: Arc::downgrade(&erased),
            overflowed,
        }
    }

    /// Delivers `value` to every listener whose scope matches.
    pub fn emit(&self, scope: &K, value: &T) {
        let mut dropped = 0usize;
        {
            let mut entries = self.table.lock();
            entries.retain(|entry| {
                if entry.scope.as_ref().is_some_and(|s| s != scope) {
                    return true;
                }
                match entry.tx.try_send(value.clone()) {
                    Ok(()) => true,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        entry.overflowed.store(true, Ordering::Release);
                        dropped += 1;
                        true
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => false,
                }
            });
        }
        if dropped > 0 {
            self.bus.publish(
                Event::new(EventKind::ListenerOverflow)
                    .with_topic(self.name)
                    .with_reason(format!("dropped={dropped} reason=full")),
            );
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }
}
