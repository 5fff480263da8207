//! Change notification for committed store writes

use fairway_core::{AppError, TripId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Kind of committed change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Row inserted or replaced
    Put,
    /// Row removed
    Delete,
}

/// A committed change to one row of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    /// Logical table name (`player`, `match`, `sync_queue`, ...)
    pub table: String,
    /// Primary key of the changed row
    pub key: String,
    pub trip_id: TripId,
    pub kind: ChangeKind,
}

impl StoreEvent {
    pub fn put(table: impl Into<String>, key: impl Into<String>, trip_id: TripId) -> Self {
        Self {
            table: table.into(),
            key: key.into(),
            trip_id,
            kind: ChangeKind::Put,
        }
    }

    pub fn delete(table: impl Into<String>, key: impl Into<String>, trip_id: TripId) -> Self {
        Self {
            table: table.into(),
            key: key.into(),
            trip_id,
            kind: ChangeKind::Delete,
        }
    }
}

type Predicate = Box<dyn Fn(&StoreEvent) -> bool + Send + Sync>;
type Callback = Box<dyn Fn(&StoreEvent) + Send + Sync>;

struct Subscriber {
    id: u64,
    table: String,
    predicate: Predicate,
    callback: Callback,
}

/// Registry of live subscriptions
#[derive(Default)]
pub(crate) struct EventBus {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Arc<Subscriber>>>,
}

impl EventBus {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn subscribe(
        self: &Arc<Self>,
        table: &str,
        predicate: Predicate,
        callback: Callback,
    ) -> Result<Subscription, AppError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let subscriber = Arc::new(Subscriber {
            id,
            table: table.to_string(),
            predicate,
            callback,
        });

        self.subscribers
            .lock()
            .map_err(|_| AppError::InternalError {
                message: "Subscription registry lock poisoned".to_string(),
            })?
            .push(subscriber);

        Ok(Subscription {
            id,
            bus: Arc::downgrade(self),
        })
    }

    /// Delivers committed events to matching subscribers
    ///
    /// Callbacks run outside the registry lock so they may subscribe or
    /// drop subscriptions themselves.
    pub(crate) fn publish(&self, events: &[StoreEvent]) {
        if events.is_empty() {
            return;
        }

        let snapshot: Vec<Arc<Subscriber>> = match self.subscribers.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => {
                log::error!("Subscription registry lock poisoned; dropping {} events", events.len());
                return;
            }
        };

        for event in events {
            for subscriber in snapshot.iter().filter(|s| s.table == event.table) {
                if (subscriber.predicate)(event) {
                    (subscriber.callback)(event);
                }
            }
        }
    }

    fn unsubscribe(&self, id: u64) {
        if let Ok(mut guard) = self.subscribers.lock() {
            guard.retain(|s| s.id != id);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.subscribers.lock().map(|g| g.len()).unwrap_or(0)
    }
}

/// Handle for a live subscription; dropping it unsubscribes
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    bus: Weak<EventBus>,
}

impl Subscription {
    /// Stops delivery explicitly
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
