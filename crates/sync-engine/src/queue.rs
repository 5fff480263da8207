// crates/sync-engine/src/queue.rs
//! Persisted queue of local mutations waiting to be applied remotely
//!
//! Every operation runs in its own store transaction and publishes its
//! changes on [`SYNC_QUEUE_TABLE`] once committed.

use crate::error::{SyncError, SyncResult};
use crate::types::{EnqueueOutcome, FailureMark, QueueCounts};
use fairway_core::{
    QueueItemId, QueueStatus, RecordKey, StoredRecord, SyncOperation, SyncQueueItem, Timestamp,
    TripId,
};
use fairway_database::queries;
use fairway_database::{Store, StoreEvent, StoreTransaction, Subscription, SYNC_QUEUE_TABLE};
use serde_json::Value;

/// Error text stored on items found in flight at startup
pub const INTERRUPTED_ERROR: &str = "interrupted";

/// The sync queue
#[derive(Clone, Debug)]
pub struct SyncQueue {
    store: Store,
}

impl SyncQueue {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Returns the backing store
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Appends a pending mutation
    ///
    /// A delete whose record still has a pending create collapses instead:
    /// the create and every later pending item for the record are removed
    /// and nothing is queued.
    pub async fn enqueue(
        &self,
        trip_id: &TripId,
        entity: &str,
        operation: SyncOperation,
        payload: Value,
    ) -> SyncResult<EnqueueOutcome> {
        let mut tx = self.store.begin().await?;
        let outcome = Self::enqueue_in(&mut tx, trip_id, entity, operation, payload).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// [`enqueue`](Self::enqueue) inside a caller's transaction
    pub async fn enqueue_in(
        tx: &mut StoreTransaction,
        trip_id: &TripId,
        entity: &str,
        operation: SyncOperation,
        payload: Value,
    ) -> SyncResult<EnqueueOutcome> {
        let record_id = validate_mutation(trip_id, entity, &payload)?;
        let key = RecordKey {
            trip_id: trip_id.clone(),
            entity: entity.to_string(),
            record_id,
        };

        if operation == SyncOperation::Delete {
            if let Some(removed) = collapse_pending_create(tx, &key).await? {
                return Ok(EnqueueOutcome::Collapsed { removed });
            }
        }

        let item = SyncQueueItem {
            id: QueueItemId::new(),
            sequence: 0,
            trip_id: key.trip_id,
            entity: key.entity,
            record_id: key.record_id,
            operation,
            payload,
            status: QueueStatus::Pending,
            created_at: Timestamp::now(),
            last_attempt_at: None,
            retry_count: 0,
            error: None,
            next_attempt_at: None,
            terminal: false,
        };

        let sequence = queries::insert_item(tx.connection(), &item).await?;
        log::debug!(
            "Queued {} {}/{} as #{} ({})",
            item.operation,
            item.entity,
            item.record_id,
            sequence,
            item.id
        );

        tx.publish_on_commit(StoreEvent::put(
            SYNC_QUEUE_TABLE,
            item.id.as_string(),
            item.trip_id.clone(),
        ));
        Ok(EnqueueOutcome::Queued(item.id))
    }

    /// Writes the entity locally and queues the mutation in one transaction
    pub async fn record_mutation(
        &self,
        trip_id: &TripId,
        entity: &str,
        operation: SyncOperation,
        payload: Value,
    ) -> SyncResult<EnqueueOutcome> {
        let record_id = validate_mutation(trip_id, entity, &payload)?;

        let mut tx = self.store.begin().await?;
        match operation {
            SyncOperation::Create | SyncOperation::Update => {
                let record = StoredRecord::new(record_id, trip_id.clone(), payload.clone());
                tx.put(entity, &record).await?;
            }
            SyncOperation::Delete => {
                tx.delete(entity, &record_id).await?;
            }
        }

        let outcome = Self::enqueue_in(&mut tx, trip_id, entity, operation, payload).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// Lists active items in enqueue order
    pub async fn list_active(&self, trip_id: Option<&TripId>) -> SyncResult<Vec<SyncQueueItem>> {
        let mut conn = self.store.acquire().await?;
        Ok(queries::list_active(&mut conn, trip_id).await?)
    }

    /// Gets an active item
    pub async fn get(&self, id: QueueItemId) -> SyncResult<Option<SyncQueueItem>> {
        let mut conn = self.store.acquire().await?;
        Ok(queries::get_item(&mut conn, id).await?)
    }

    /// Number of active items for a trip
    pub async fn active_count(&self, trip_id: &TripId) -> SyncResult<u64> {
        Ok(self.counts(Some(trip_id)).await?.total())
    }

    /// Per-status counts, for one trip or all of them
    pub async fn counts(&self, trip_id: Option<&TripId>) -> SyncResult<QueueCounts> {
        let mut conn = self.store.acquire().await?;
        Ok(queries::count_by_status(&mut conn, trip_id).await?)
    }

    /// `pending | failed -> syncing`
    pub async fn mark_syncing(&self, id: QueueItemId) -> SyncResult<()> {
        let mut tx = self.store.begin().await?;
        let Some(item) = queries::begin_attempt(tx.connection(), id, Timestamp::now()).await? else {
            return Err(rejected(&mut tx, id, QueueStatus::Syncing).await);
        };

        tx.publish_on_commit(put_event(&item));
        tx.commit().await?;
        log::debug!("Syncing {} ({})", item.id, item.record_key());
        Ok(())
    }

    /// `syncing -> completed`; the row is removed
    pub async fn mark_completed(&self, id: QueueItemId) -> SyncResult<()> {
        let mut tx = self.store.begin().await?;
        let Some(item) = queries::complete_attempt(tx.connection(), id).await? else {
            return Err(rejected(&mut tx, id, QueueStatus::Completed).await);
        };

        tx.publish_on_commit(StoreEvent::delete(
            SYNC_QUEUE_TABLE,
            id.as_string(),
            item.trip_id.clone(),
        ));
        tx.commit().await?;
        log::debug!("Completed {} ({})", item.id, item.record_key());
        Ok(())
    }

    /// `syncing -> failed`, eligible for another attempt right away
    pub async fn mark_failed(&self, id: QueueItemId, error: impl Into<String>) -> SyncResult<()> {
        self.mark_failed_with(
            id,
            FailureMark {
                error: error.into(),
                retry_after: None,
                terminal: false,
            },
        )
        .await
    }

    /// `syncing -> failed` with a retry schedule
    ///
    /// `last_attempt_at` and `next_attempt_at` are stamped from the same
    /// clock reading, so their difference is exactly `retry_after`.
    pub async fn mark_failed_with(&self, id: QueueItemId, mark: FailureMark) -> SyncResult<()> {
        let now = Timestamp::now();
        let next_attempt_at = mark.retry_after.map(|delay| now.plus(delay));

        let mut tx = self.store.begin().await?;
        let failed = queries::fail_attempt(
            tx.connection(),
            id,
            &mark.error,
            now,
            next_attempt_at,
            mark.terminal,
        )
        .await?;
        let Some(item) = failed else {
            return Err(rejected(&mut tx, id, QueueStatus::Failed).await);
        };

        tx.publish_on_commit(put_event(&item));
        tx.commit().await?;
        Ok(())
    }

    /// Makes a failed item eligible now, with a fresh retry budget
    pub async fn retry(&self, id: QueueItemId) -> SyncResult<()> {
        let mut tx = self.store.begin().await?;
        let Some(item) = queries::reset_failed(tx.connection(), id).await? else {
            return Err(match queries::get_item(tx.connection(), id).await? {
                Some(current) => SyncError::NotFailed {
                    id,
                    status: current.status,
                },
                None => SyncError::NotFound(id),
            });
        };

        tx.publish_on_commit(put_event(&item));
        tx.commit().await?;
        log::info!("Retry requested for {} ({})", id, item.record_key());
        Ok(())
    }

    /// Drops an item that is not in flight
    pub async fn discard(&self, id: QueueItemId) -> SyncResult<()> {
        let mut tx = self.store.begin().await?;
        let Some(item) = queries::delete_idle_item(tx.connection(), id).await? else {
            return Err(match queries::get_item(tx.connection(), id).await? {
                Some(_) => SyncError::InFlight(id),
                None => SyncError::NotFound(id),
            });
        };

        tx.publish_on_commit(StoreEvent::delete(
            SYNC_QUEUE_TABLE,
            id.as_string(),
            item.trip_id.clone(),
        ));
        tx.commit().await?;
        log::info!("Discarded {} {} ({})", item.operation, id, item.record_key());
        Ok(())
    }

    /// Moves items left in `syncing` to `failed`
    ///
    /// They become eligible immediately and keep their retry count; the
    /// remote side deduplicates the replay by idempotency key. Only call
    /// this while no drain is running.
    pub async fn recover_interrupted(&self) -> SyncResult<u64> {
        let mut tx = self.store.begin().await?;
        let recovered = queries::interrupt_syncing(tx.connection(), INTERRUPTED_ERROR).await?;
        if recovered.is_empty() {
            tx.rollback().await?;
            return Ok(0);
        }

        for item in &recovered {
            tx.publish_on_commit(put_event(item));
        }
        tx.commit().await?;

        log::warn!("Recovered {} interrupted queue items", recovered.len());
        Ok(recovered.len() as u64)
    }

    /// Calls `callback` after every committed queue change, optionally for one trip
    pub fn subscribe<F>(&self, trip_id: Option<TripId>, callback: F) -> SyncResult<Subscription>
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        Ok(self.store.subscribe(
            SYNC_QUEUE_TABLE,
            move |event| trip_id.as_ref().map_or(true, |t| &event.trip_id == t),
            callback,
        )?)
    }
}

fn validate_mutation(trip_id: &TripId, entity: &str, payload: &Value) -> SyncResult<String> {
    if trip_id.is_blank() {
        return Err(SyncError::Validation("trip id must not be empty".to_string()));
    }
    if entity.trim().is_empty() || entity == SYNC_QUEUE_TABLE {
        return Err(SyncError::Validation(format!(
            "'{}' is not a syncable entity",
            entity
        )));
    }
    StoredRecord::id_from_payload(payload)
        .ok_or_else(|| SyncError::Validation(format!("{} payload has no id", entity)))
}

/// Removes a still-pending create and everything queued after it
async fn collapse_pending_create(
    tx: &mut StoreTransaction,
    key: &RecordKey,
) -> SyncResult<Option<u64>> {
    let removed = queries::collapse_pending_create(tx.connection(), key).await?;
    if removed.is_empty() {
        return Ok(None);
    }

    for item in &removed {
        tx.publish_on_commit(StoreEvent::delete(
            SYNC_QUEUE_TABLE,
            item.id.as_string(),
            item.trip_id.clone(),
        ));
    }

    log::debug!("Delete of {} collapsed {} pending items", key, removed.len());
    Ok(Some(removed.len() as u64))
}

/// Explains why a conditional transition matched no row
async fn rejected(tx: &mut StoreTransaction, id: QueueItemId, to: QueueStatus) -> SyncError {
    match queries::get_item(tx.connection(), id).await {
        Ok(Some(item)) => invalid(&item, to),
        Ok(None) => SyncError::NotFound(id),
        Err(e) => e.into(),
    }
}

fn invalid(item: &SyncQueueItem, to: QueueStatus) -> SyncError {
    SyncError::InvalidTransition {
        id: item.id,
        from: item.status,
        to,
    }
}

fn put_event(item: &SyncQueueItem) -> StoreEvent {
    StoreEvent::put(SYNC_QUEUE_TABLE, item.id.as_string(), item.trip_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    async fn queue() -> SyncResult<SyncQueue> {
        Ok(SyncQueue::new(Store::open_in_memory().await?))
    }

    fn trip() -> TripId {
        TripId::new("ryder-2026")
    }

    async fn queued(q: &SyncQueue, op: SyncOperation, payload: Value) -> SyncResult<QueueItemId> {
        match q.enqueue(&trip(), "player", op, payload).await? {
            EnqueueOutcome::Queued(id) => Ok(id),
            other => Err(SyncError::Custom(format!("unexpected {:?}", other))),
        }
    }

    #[tokio::test]
    async fn test_enqueue_appends_pending_in_order() -> SyncResult<()> {
        let q = queue().await?;
        let a = queued(&q, SyncOperation::Create, json!({"id": "p1"})).await?;
        let b = queued(&q, SyncOperation::Update, json!({"id": "p1", "handicap": 9})).await?;

        let items = q.list_active(Some(&trip())).await?;
        assert_eq!(items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![a, b]);
        assert!(items.iter().all(|i| i.status == QueueStatus::Pending));
        assert!(items[0].sequence < items[1].sequence);
        assert_eq!(items[1].record_id, "p1");
        Ok(())
    }

    #[tokio::test]
    async fn test_enqueue_validation() -> SyncResult<()> {
        let q = queue().await?;

        let missing_id = q
            .enqueue(&trip(), "player", SyncOperation::Create, json!({"name": "x"}))
            .await;
        assert!(matches!(missing_id, Err(SyncError::Validation(_))));

        let blank_trip = q
            .enqueue(&TripId::new(" "), "player", SyncOperation::Create, json!({"id": "p"}))
            .await;
        assert!(matches!(blank_trip, Err(SyncError::Validation(_))));

        let reserved = q
            .enqueue(&trip(), SYNC_QUEUE_TABLE, SyncOperation::Create, json!({"id": "p"}))
            .await;
        assert!(matches!(reserved, Err(SyncError::Validation(_))));

        assert_eq!(q.active_count(&trip()).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_transitions() -> SyncResult<()> {
        let q = queue().await?;
        let id = queued(&q, SyncOperation::Create, json!({"id": "p1"})).await?;

        let err = q.mark_completed(id).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::InvalidTransition {
                from: QueueStatus::Pending,
                to: QueueStatus::Completed,
                ..
            }
        ));

        q.mark_syncing(id).await?;
        let item = q.get(id).await?.unwrap();
        assert_eq!(item.status, QueueStatus::Syncing);
        assert!(item.last_attempt_at.is_some());

        assert!(matches!(
            q.mark_syncing(id).await,
            Err(SyncError::InvalidTransition { .. })
        ));

        q.mark_failed(id, "boom").await?;
        let item = q.get(id).await?.unwrap();
        assert_eq!(item.status, QueueStatus::Failed);
        assert_eq!(item.retry_count, 1);
        assert_eq!(item.error.as_deref(), Some("boom"));
        assert!(item.is_due(Timestamp::now()));

        q.mark_syncing(id).await?;
        q.mark_completed(id).await?;
        assert!(q.get(id).await?.is_none());
        assert!(matches!(q.mark_syncing(id).await, Err(SyncError::NotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_failure_schedule_is_exact() -> SyncResult<()> {
        let q = queue().await?;
        let id = queued(&q, SyncOperation::Create, json!({"id": "p1"})).await?;

        q.mark_syncing(id).await?;
        q.mark_failed_with(id, FailureMark::retry_after("HTTP 503", Duration::from_secs(4)))
            .await?;

        let item = q.get(id).await?.unwrap();
        let last = item.last_attempt_at.unwrap();
        let next = item.next_attempt_at.unwrap();
        assert_eq!(next.duration_since(last), Duration::from_secs(4));
        assert!(!item.is_due(last));
        Ok(())
    }

    #[tokio::test]
    async fn test_retry_and_discard() -> SyncResult<()> {
        let q = queue().await?;
        let id = queued(&q, SyncOperation::Create, json!({"id": "p1"})).await?;

        assert!(matches!(q.retry(id).await, Err(SyncError::NotFailed { .. })));

        q.mark_syncing(id).await?;
        assert!(matches!(q.discard(id).await, Err(SyncError::InFlight(_))));

        q.mark_failed_with(id, FailureMark::terminal("HTTP 422")).await?;
        assert!(q.get(id).await?.unwrap().is_terminal_failure());

        q.retry(id).await?;
        let item = q.get(id).await?.unwrap();
        assert_eq!(item.retry_count, 0);
        assert!(!item.terminal);
        assert!(item.is_due(Timestamp::now()));

        q.discard(id).await?;
        assert_eq!(q.active_count(&trip()).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_collapse_on_delete() -> SyncResult<()> {
        let q = queue().await?;
        queued(&q, SyncOperation::Create, json!({"id": "p1"})).await?;
        queued(&q, SyncOperation::Update, json!({"id": "p1", "name": "Jo"})).await?;
        let other = queued(&q, SyncOperation::Create, json!({"id": "p2"})).await?;

        let outcome = q
            .enqueue(&trip(), "player", SyncOperation::Delete, json!({"id": "p1"}))
            .await?;
        assert_eq!(outcome, EnqueueOutcome::Collapsed { removed: 2 });

        let items = q.list_active(None).await?;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, other);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_after_create_started_is_queued() -> SyncResult<()> {
        let q = queue().await?;
        let create = queued(&q, SyncOperation::Create, json!({"id": "p1"})).await?;
        q.mark_syncing(create).await?;

        let outcome = q
            .enqueue(&trip(), "player", SyncOperation::Delete, json!({"id": "p1"}))
            .await?;
        assert!(matches!(outcome, EnqueueOutcome::Queued(_)));
        assert_eq!(q.active_count(&trip()).await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_record_mutation_writes_entity_and_queue() -> SyncResult<()> {
        let q = queue().await?;
        q.record_mutation(&trip(), "match", SyncOperation::Create, json!({"id": "m1", "hole": 1}))
            .await?;

        let record = q.store().get("match", "m1").await?.unwrap();
        assert_eq!(record.data["hole"], 1);
        assert_eq!(q.active_count(&trip()).await?, 1);

        let outcome = q
            .record_mutation(&trip(), "match", SyncOperation::Delete, json!({"id": "m1"}))
            .await?;
        assert_eq!(outcome, EnqueueOutcome::Collapsed { removed: 1 });
        assert!(q.store().get("match", "m1").await?.is_none());
        assert_eq!(q.active_count(&trip()).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_recover_interrupted() -> SyncResult<()> {
        let q = queue().await?;
        let id = queued(&q, SyncOperation::Create, json!({"id": "p1"})).await?;
        assert_eq!(q.recover_interrupted().await?, 0);

        q.mark_syncing(id).await?;
        assert_eq!(q.recover_interrupted().await?, 1);

        let item = q.get(id).await?.unwrap();
        assert_eq!(item.status, QueueStatus::Failed);
        assert_eq!(item.error.as_deref(), Some(INTERRUPTED_ERROR));
        assert_eq!(item.retry_count, 0);
        assert!(item.is_due(Timestamp::now()));
        Ok(())
    }

    #[tokio::test]
    async fn test_subscribe_filters_by_trip() -> SyncResult<()> {
        let q = queue().await?;
        let seen = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&seen);
        let _sub = q.subscribe(Some(trip()), move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        })?;

        let id = queued(&q, SyncOperation::Create, json!({"id": "p1"})).await?;
        q.enqueue(&TripId::new("other"), "player", SyncOperation::Create, json!({"id": "x"}))
            .await?;
        q.mark_syncing(id).await?;
        q.mark_completed(id).await?;

        assert_eq!(seen.load(Ordering::SeqCst), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_counts() -> SyncResult<()> {
        let q = queue().await?;
        let a = queued(&q, SyncOperation::Create, json!({"id": "a"})).await?;
        let b = queued(&q, SyncOperation::Create, json!({"id": "b"})).await?;
        queued(&q, SyncOperation::Create, json!({"id": "c"})).await?;

        q.mark_syncing(a).await?;
        q.mark_syncing(b).await?;
        q.mark_failed_with(b, FailureMark::terminal("rejected")).await?;

        let counts = q.counts(Some(&trip())).await?;
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.syncing, 1);
        assert_eq!(counts.terminal, 1);
        assert_eq!(counts.total(), 3);
        Ok(())
    }
}
