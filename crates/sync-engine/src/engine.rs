// crates/sync-engine/src/engine.rs
//! Main sync engine
//!
//! Drains the queue against the remote API one item at a time, in enqueue
//! order, with at most one drain per process.

use crate::error::{SyncError, SyncResult};
use crate::queue::SyncQueue;
use crate::types::{DrainOutcome, DrainReport, FailureMark, SyncConfig, SyncState};
use fairway_core::{QueueStatus, RecordKey, SyncQueueItem, Timestamp, TripId};
use fairway_network::{ConnectivitySignal, MutationRequest, RemoteApi, RemoteError};
use fairway_resilience::with_timeout;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Main synchronization engine
pub struct SyncEngine {
    queue: SyncQueue,
    remote: Arc<dyn RemoteApi>,
    connectivity: ConnectivitySignal,
    config: SyncConfig,
    draining: AtomicBool,
    state: Mutex<SyncState>,
    wake: Notify,
}

impl SyncEngine {
    /// Creates a new sync engine
    pub fn new(
        queue: SyncQueue,
        remote: Arc<dyn RemoteApi>,
        connectivity: ConnectivitySignal,
        config: SyncConfig,
    ) -> Self {
        Self {
            queue,
            remote,
            connectivity,
            config,
            draining: AtomicBool::new(false),
            state: Mutex::new(SyncState::default()),
            wake: Notify::new(),
        }
    }

    /// Returns the queue this engine drains
    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Runs crash recovery; call once before the first drain
    ///
    /// Returns 0 without touching the queue when a drain already holds the
    /// flag, since that drain recovers stale items itself.
    pub async fn start(&self) -> SyncResult<u64> {
        let Some(_guard) = self.claim() else {
            log::debug!("Drain in progress; skipping startup recovery");
            return Ok(0);
        };

        let recovered = self.queue.recover_interrupted().await?;
        if recovered > 0 {
            log::info!("Sync engine started; {} interrupted items will be replayed", recovered);
        } else {
            log::info!("Sync engine started");
        }
        Ok(recovered)
    }

    /// Drains every trip's queue now
    pub async fn sync_now(&self) -> SyncResult<DrainOutcome> {
        self.drain(None).await
    }

    /// Drains a single trip's queue now
    pub async fn sync_trip(&self, trip_id: &TripId) -> SyncResult<DrainOutcome> {
        self.drain(Some(trip_id)).await
    }

    /// Wakes the loop started by [`spawn`](Self::spawn) for a manual sync
    pub fn trigger(&self) {
        self.wake.notify_one();
    }

    /// Returns true while a drain holds the flag
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Gets the current sync state
    pub fn state(&self) -> SyncResult<SyncState> {
        self.state
            .lock()
            .map(|s| s.clone())
            .map_err(|_| SyncError::Custom("Lock poisoned".to_string()))
    }

    /// Runs the trigger loop until `shutdown` flips to true
    ///
    /// Drains on every reconnect, on each poll tick while online with
    /// active items, and whenever [`trigger`](Self::trigger) is called.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut online = self.connectivity.subscribe();
            let mut connectivity_open = true;
            let mut ticker = tokio::time::interval(self.config.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    changed = online.changed(), if connectivity_open => {
                        if changed.is_err() {
                            log::warn!("Connectivity signal closed; relying on polling");
                            connectivity_open = false;
                            continue;
                        }
                        if *online.borrow_and_update() {
                            self.run_logged("reconnect").await;
                        }
                    }
                    _ = ticker.tick() => {
                        if self.connectivity.is_online() && self.has_work().await {
                            self.run_logged("poll").await;
                        }
                    }
                    _ = self.wake.notified() => {
                        self.run_logged("manual").await;
                    }
                    res = shutdown.changed() => {
                        if res.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            log::debug!("Sync loop stopped");
        })
    }

    async fn has_work(&self) -> bool {
        match self.queue.counts(None).await {
            Ok(counts) => counts.total() > 0,
            Err(e) => {
                log::error!("Failed to read queue counts: {}", e);
                false
            }
        }
    }

    async fn run_logged(&self, reason: &str) {
        match self.sync_now().await {
            Ok(DrainOutcome::Completed(report)) if report.attempted > 0 => {
                log::info!(
                    "Sync ({}) finished: {} attempted, {} succeeded, {} failed, {} skipped",
                    reason,
                    report.attempted,
                    report.succeeded,
                    report.failed,
                    report.skipped
                );
            }
            Ok(outcome) => log::debug!("Sync ({}): {:?}", reason, outcome),
            Err(e) => log::error!("Sync ({}) aborted: {}", reason, e),
        }
    }

    async fn drain(&self, trip_id: Option<&TripId>) -> SyncResult<DrainOutcome> {
        if !self.connectivity.is_online() {
            return Ok(DrainOutcome::Offline);
        }

        let Some(_guard) = self.claim() else {
            return Ok(DrainOutcome::AlreadyRunning);
        };
        self.update_state(|s| s.in_progress = true)?;

        let result = self.drain_items(trip_id).await;

        self.update_state(|s| {
            s.in_progress = false;
            s.last_drain_at = Some(chrono::Utc::now());
            match &result {
                Ok(report) => {
                    s.last_report = Some(*report);
                    s.last_error = None;
                    s.completed_drains += 1;
                }
                Err(e) => s.last_error = Some(e.to_string()),
            }
        })?;

        result.map(DrainOutcome::Completed)
    }

    /// Takes the drain flag; released when the guard drops
    fn claim(&self) -> Option<DrainGuard<'_>> {
        self.draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| DrainGuard { engine: self })
    }

    async fn drain_items(&self, trip_id: Option<&TripId>) -> SyncResult<DrainReport> {
        // syncing rows seen while holding the flag belong to a dropped drain
        let stale = self.queue.recover_interrupted().await?;
        if stale > 0 {
            log::info!("Replaying {} items from an abandoned drain", stale);
        }

        let items = self.queue.list_active(trip_id).await?;
        let now = Timestamp::now();
        let mut blocked: HashSet<RecordKey> = HashSet::new();
        let mut report = DrainReport::default();

        for item in items {
            if !self.connectivity.is_online() {
                log::info!("Connectivity lost; stopping drain");
                report.interrupted = true;
                break;
            }

            let key = item.record_key();
            if blocked.contains(&key) || !Self::eligible(&item, now) {
                blocked.insert(key);
                report.skipped += 1;
                continue;
            }

            match self.queue.mark_syncing(item.id).await {
                Ok(()) => {}
                Err(SyncError::InvalidTransition { .. }) | Err(SyncError::NotFound(_)) => {
                    // changed under us since the listing
                    blocked.insert(key);
                    report.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            }

            report.attempted += 1;
            match self.apply(&item).await {
                Ok(()) => {
                    self.queue.mark_completed(item.id).await?;
                    report.succeeded += 1;
                }
                Err(err) => {
                    let mark = self.failure_mark(&item, &err);
                    self.queue.mark_failed_with(item.id, mark).await?;
                    blocked.insert(key);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    fn eligible(item: &SyncQueueItem, now: Timestamp) -> bool {
        match item.status {
            QueueStatus::Pending => true,
            QueueStatus::Failed => item.is_due(now),
            QueueStatus::Syncing | QueueStatus::Completed => false,
        }
    }

    /// One remote call, bounded by the request timeout
    async fn apply(&self, item: &SyncQueueItem) -> Result<(), RemoteError> {
        let request = MutationRequest::from(item);
        match with_timeout(self.config.request_timeout, self.remote.apply(&request)).await {
            Ok(result) => result,
            Err(timeout) => Err(RemoteError::Transient(timeout.to_string())),
        }
    }

    fn failure_mark(&self, item: &SyncQueueItem, err: &RemoteError) -> FailureMark {
        let policy = &self.config.retry_policy;
        let attempts = item.retry_count.saturating_add(1);

        match err {
            RemoteError::Permanent { .. } => {
                log::error!("{} {} rejected: {}", item.operation, item.record_key(), err);
                FailureMark::terminal(err.to_string())
            }
            RemoteError::Transient(_) if policy.is_exhausted(attempts) => {
                log::error!(
                    "{} {} gave up after {} attempts: {}",
                    item.operation,
                    item.record_key(),
                    attempts,
                    err
                );
                FailureMark::terminal(format!(
                    "{} (gave up after {} attempts)",
                    err, attempts
                ))
            }
            RemoteError::Transient(_) => {
                let delay = policy.delay_for_attempt(attempts);
                log::warn!(
                    "{} {} failed (attempt {}), retrying in {:?}: {}",
                    item.operation,
                    item.record_key(),
                    attempts,
                    delay,
                    err
                );
                FailureMark::retry_after(err.to_string(), delay)
            }
        }
    }

    fn update_state<F: FnOnce(&mut SyncState)>(&self, f: F) -> SyncResult<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| SyncError::Custom("Lock poisoned".to_string()))?;
        f(&mut state);
        Ok(())
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("online", &self.connectivity.is_online())
            .field("draining", &self.is_draining())
            .finish()
    }
}

/// Releases the drain flag even if the drain future is dropped
struct DrainGuard<'a> {
    engine: &'a SyncEngine,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.engine.state.lock() {
            state.in_progress = false;
        }
        self.engine.draining.store(false, Ordering::SeqCst);
    }
}
