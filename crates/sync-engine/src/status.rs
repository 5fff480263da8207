// crates/sync-engine/src/status.rs
//! Per-trip sync status derived from the queue and connectivity

use crate::error::{SyncError, SyncResult};
use crate::queue::SyncQueue;
use fairway_core::{QueueStatus, SyncQueueItem, Timestamp, TripId, TripSyncStatus};
use fairway_database::Subscription;
use fairway_network::ConnectivitySignal;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

/// Reduces a trip's active queue items and connectivity to one status
///
/// Precedence: offline, failed, syncing, pending, synced. Items of other
/// trips are ignored.
pub fn project_status(online: bool, items: &[SyncQueueItem], trip_id: &TripId) -> TripSyncStatus {
    if !online {
        return TripSyncStatus::Offline;
    }

    let mut pending = false;
    let mut syncing = false;
    for item in items.iter().filter(|i| &i.trip_id == trip_id) {
        match item.status {
            QueueStatus::Failed => return TripSyncStatus::Failed,
            QueueStatus::Syncing => syncing = true,
            QueueStatus::Pending => pending = true,
            QueueStatus::Completed => {}
        }
    }

    if syncing {
        TripSyncStatus::Syncing
    } else if pending {
        TripSyncStatus::Pending
    } else {
        TripSyncStatus::Synced
    }
}

/// Status plus the counts a UI shows next to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub trip_id: TripId,
    pub status: TripSyncStatus,
    pub pending: usize,
    pub syncing: usize,
    /// Failed items that will be retried automatically
    pub failed: usize,
    /// Failed items waiting for a human
    pub terminal: usize,
    /// Error of the most recently attempted failed item
    pub last_error: Option<String>,
}

impl StatusSnapshot {
    pub fn from_items(online: bool, items: &[SyncQueueItem], trip_id: &TripId) -> Self {
        let mut snapshot = Self {
            trip_id: trip_id.clone(),
            status: project_status(online, items, trip_id),
            pending: 0,
            syncing: 0,
            failed: 0,
            terminal: 0,
            last_error: None,
        };

        let mut latest_failure: Option<Option<Timestamp>> = None;
        for item in items.iter().filter(|i| &i.trip_id == trip_id) {
            match item.status {
                QueueStatus::Pending => snapshot.pending += 1,
                QueueStatus::Syncing => snapshot.syncing += 1,
                QueueStatus::Failed => {
                    if item.terminal {
                        snapshot.terminal += 1;
                    } else {
                        snapshot.failed += 1;
                    }
                    if latest_failure.map_or(true, |at| item.last_attempt_at >= at) {
                        latest_failure = Some(item.last_attempt_at);
                        snapshot.last_error = item.error.clone();
                    }
                }
                QueueStatus::Completed => {}
            }
        }

        snapshot
    }

    /// Number of active items
    pub fn total(&self) -> usize {
        self.pending + self.syncing + self.failed + self.terminal
    }
}

struct Watcher {
    trip_id: TripId,
    task: JoinHandle<()>,
    _subscription: Subscription,
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Computes trip status on demand or keeps a watched trip's status fresh
pub struct StatusProjector {
    queue: SyncQueue,
    connectivity: ConnectivitySignal,
    watcher: Mutex<Option<Watcher>>,
}

impl StatusProjector {
    pub fn new(queue: SyncQueue, connectivity: ConnectivitySignal) -> Self {
        Self {
            queue,
            connectivity,
            watcher: Mutex::new(None),
        }
    }

    /// Computes the trip's status now
    pub async fn status(&self, trip_id: &TripId) -> SyncResult<TripSyncStatus> {
        compute(&self.queue, &self.connectivity, trip_id).await
    }

    /// Computes the trip's status and counts now
    pub async fn snapshot(&self, trip_id: &TripId) -> SyncResult<StatusSnapshot> {
        let online = self.connectivity.is_online();
        let items = self.queue.list_active(Some(trip_id)).await?;
        Ok(StatusSnapshot::from_items(online, &items, trip_id))
    }

    /// Starts refreshing `trip_id`'s status
    ///
    /// The receiver starts at `Unknown` and changes on every refresh that
    /// yields a different status. Refreshes run on each `interval` tick,
    /// on connectivity changes and after every committed queue change for
    /// the trip. Replaces any previous watcher.
    pub fn start_watching(
        &self,
        trip_id: TripId,
        interval: Duration,
    ) -> SyncResult<watch::Receiver<TripSyncStatus>> {
        if interval.is_zero() {
            return Err(SyncError::Config(
                "status refresh interval must be positive".to_string(),
            ));
        }

        let (tx, rx) = watch::channel(TripSyncStatus::Unknown);
        let dirty = Arc::new(Notify::new());

        let signal = Arc::clone(&dirty);
        let subscription = self
            .queue
            .subscribe(Some(trip_id.clone()), move |_| signal.notify_one())?;

        let task = tokio::spawn(watch_loop(
            self.queue.clone(),
            self.connectivity.clone(),
            trip_id.clone(),
            interval,
            dirty,
            tx,
        ));

        let mut slot = self
            .watcher
            .lock()
            .map_err(|_| SyncError::Custom("Lock poisoned".to_string()))?;
        *slot = Some(Watcher {
            trip_id,
            task,
            _subscription: subscription,
        });

        Ok(rx)
    }

    /// Stops the watcher, if any
    pub fn stop_watching(&self) {
        if let Ok(mut slot) = self.watcher.lock() {
            if let Some(watcher) = slot.take() {
                log::debug!("Stopped watching {}", watcher.trip_id);
            }
        }
    }

    /// Returns the trip currently being watched
    pub fn watched_trip(&self) -> Option<TripId> {
        self.watcher
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().map(|w| w.trip_id.clone()))
    }

    pub fn is_watching(&self) -> bool {
        self.watched_trip().is_some()
    }
}

async fn compute(
    queue: &SyncQueue,
    connectivity: &ConnectivitySignal,
    trip_id: &TripId,
) -> SyncResult<TripSyncStatus> {
    if !connectivity.is_online() {
        return Ok(TripSyncStatus::Offline);
    }
    let items = queue.list_active(Some(trip_id)).await?;
    Ok(project_status(true, &items, trip_id))
}

async fn watch_loop(
    queue: SyncQueue,
    connectivity: ConnectivitySignal,
    trip_id: TripId,
    interval: Duration,
    dirty: Arc<Notify>,
    tx: watch::Sender<TripSyncStatus>,
) {
    let mut online = connectivity.subscribe();
    let mut connectivity_open = true;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = dirty.notified() => {}
            changed = online.changed(), if connectivity_open => {
                if changed.is_err() {
                    connectivity_open = false;
                }
            }
            _ = tx.closed() => break,
        }

        match compute(&queue, &connectivity, &trip_id).await {
            Ok(status) => {
                tx.send_if_modified(|current| {
                    if *current == status {
                        false
                    } else {
                        log::debug!("Trip {} is now {}", trip_id, status);
                        *current = status;
                        true
                    }
                });
            }
            Err(e) => log::warn!("Failed to refresh status of {}: {}", trip_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairway_core::{QueueItemId, SyncOperation};
    use serde_json::json;

    fn item(trip: &str, status: QueueStatus, terminal: bool, at: i64) -> SyncQueueItem {
        SyncQueueItem {
            id: QueueItemId::new(),
            sequence: at,
            trip_id: TripId::new(trip),
            entity: "match".to_string(),
            record_id: format!("m{}", at),
            operation: SyncOperation::Update,
            payload: json!({"id": format!("m{}", at)}),
            status,
            created_at: Timestamp::from_millis(at),
            last_attempt_at: Some(Timestamp::from_millis(at)),
            retry_count: 0,
            error: (status == QueueStatus::Failed).then(|| format!("error {}", at)),
            next_attempt_at: None,
            terminal,
        }
    }

    #[test]
    fn test_precedence() {
        let trip = TripId::new("t1");
        let pending = item("t1", QueueStatus::Pending, false, 1);
        let syncing = item("t1", QueueStatus::Syncing, false, 2);
        let failed = item("t1", QueueStatus::Failed, false, 3);

        assert_eq!(project_status(true, &[], &trip), TripSyncStatus::Synced);
        assert_eq!(project_status(false, &[], &trip), TripSyncStatus::Offline);
        assert_eq!(
            project_status(true, &[pending.clone()], &trip),
            TripSyncStatus::Pending
        );
        assert_eq!(
            project_status(true, &[pending.clone(), syncing.clone()], &trip),
            TripSyncStatus::Syncing
        );
        assert_eq!(
            project_status(true, &[pending, syncing, failed.clone()], &trip),
            TripSyncStatus::Failed
        );
        assert_eq!(project_status(false, &[failed], &trip), TripSyncStatus::Offline);
    }

    #[test]
    fn test_other_trips_ignored() {
        let items = [item("t2", QueueStatus::Failed, true, 1)];
        assert_eq!(
            project_status(true, &items, &TripId::new("t1")),
            TripSyncStatus::Synced
        );
    }

    #[test]
    fn test_snapshot_counts_and_last_error() {
        let trip = TripId::new("t1");
        let items = vec![
            item("t1", QueueStatus::Pending, false, 1),
            item("t1", QueueStatus::Failed, false, 5),
            item("t1", QueueStatus::Failed, true, 9),
            item("t1", QueueStatus::Failed, false, 3),
            item("t2", QueueStatus::Syncing, false, 2),
        ];

        let snapshot = StatusSnapshot::from_items(true, &items, &trip);
        assert_eq!(snapshot.status, TripSyncStatus::Failed);
        assert_eq!(snapshot.pending, 1);
        assert_eq!(snapshot.syncing, 0);
        assert_eq!(snapshot.failed, 2);
        assert_eq!(snapshot.terminal, 1);
        assert_eq!(snapshot.total(), 4);
        assert_eq!(snapshot.last_error.as_deref(), Some("error 9"));
    }
}
