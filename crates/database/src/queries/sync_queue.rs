//! Sync queue row operations
//!
//! Status transitions are conditional updates: each one names the status it
//! moves from and reports how many rows matched, so a caller can tell an
//! illegal transition from a successful one.

use fairway_core::{
    AppError, QueueItemId, QueueStatus, RecordKey, SyncOperation, SyncQueueItem, Timestamp, TripId,
};
use sqlx::SqliteConnection;

const ITEM_COLUMNS: &str = "sequence, id, trip_id, entity, record_id, operation, payload, status, \
     created_at, last_attempt_at, retry_count, error, next_attempt_at, terminal";

/// Per-status row counts for one trip (or all trips)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: u64,
    pub syncing: u64,
    /// Failed items still eligible for automatic retry
    pub failed: u64,
    /// Failed items waiting for a human
    pub terminal: u64,
}

impl StatusCounts {
    /// Total number of active items
    pub fn total(&self) -> u64 {
        self.pending + self.syncing + self.failed + self.terminal
    }
}

/// Inserts a new item and returns its assigned sequence number
pub async fn insert_item(
    conn: &mut SqliteConnection,
    item: &SyncQueueItem,
) -> Result<i64, AppError> {
    let payload = serde_json::to_string(&item.payload)
        .map_err(|e| AppError::database("Failed to encode queue payload", e))?;

    let result = sqlx::query(
        r#"
        INSERT INTO sync_queue (
            id, trip_id, entity, record_id, operation, payload, status,
            created_at, last_attempt_at, retry_count, error, next_attempt_at, terminal
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(item.id.as_string())
    .bind(item.trip_id.as_str())
    .bind(&item.entity)
    .bind(&item.record_id)
    .bind(item.operation.as_str())
    .bind(payload)
    .bind(item.status.as_str())
    .bind(item.created_at.as_millis())
    .bind(item.last_attempt_at.map(|t| t.as_millis()))
    .bind(i64::from(item.retry_count))
    .bind(&item.error)
    .bind(item.next_attempt_at.map(|t| t.as_millis()))
    .bind(item.terminal)
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::database("Failed to enqueue mutation", e))?;

    Ok(result.last_insert_rowid())
}

/// Gets an active item by ID
pub async fn get_item(
    conn: &mut SqliteConnection,
    id: QueueItemId,
) -> Result<Option<SyncQueueItem>, AppError> {
    let sql = format!("SELECT {} FROM sync_queue WHERE id = ?", ITEM_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.as_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::database("Failed to fetch queue item", e))?;

    row.map(row_to_item).transpose()
}

/// Lists active items in enqueue order, optionally for one trip
pub async fn list_active(
    conn: &mut SqliteConnection,
    trip_id: Option<&TripId>,
) -> Result<Vec<SyncQueueItem>, AppError> {
    let rows = match trip_id {
        Some(trip_id) => {
            let sql = format!(
                "SELECT {} FROM sync_queue WHERE trip_id = ? ORDER BY sequence",
                ITEM_COLUMNS
            );
            sqlx::query(&sql)
                .bind(trip_id.as_str())
                .fetch_all(&mut *conn)
                .await
        }
        None => {
            let sql = format!("SELECT {} FROM sync_queue ORDER BY sequence", ITEM_COLUMNS);
            sqlx::query(&sql).fetch_all(&mut *conn).await
        }
    }
    .map_err(|e| AppError::database("Failed to list queue items", e))?;

    rows.into_iter().map(row_to_item).collect()
}

/// Lists active items for one record in enqueue order
pub async fn list_for_record(
    conn: &mut SqliteConnection,
    key: &RecordKey,
) -> Result<Vec<SyncQueueItem>, AppError> {
    let sql = format!(
        "SELECT {} FROM sync_queue WHERE trip_id = ? AND entity = ? AND record_id = ? ORDER BY sequence",
        ITEM_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(key.trip_id.as_str())
        .bind(&key.entity)
        .bind(&key.record_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AppError::database("Failed to list record queue items", e))?;

    rows.into_iter().map(row_to_item).collect()
}

/// Counts active items by status
pub async fn count_by_status(
    conn: &mut SqliteConnection,
    trip_id: Option<&TripId>,
) -> Result<StatusCounts, AppError> {
    let rows: Vec<(String, bool, i64)> = match trip_id {
        Some(trip_id) => {
            sqlx::query_as(
                "SELECT status, terminal, COUNT(*) FROM sync_queue WHERE trip_id = ? GROUP BY status, terminal",
            )
            .bind(trip_id.as_str())
            .fetch_all(&mut *conn)
            .await
        }
        None => {
            sqlx::query_as("SELECT status, terminal, COUNT(*) FROM sync_queue GROUP BY status, terminal")
                .fetch_all(&mut *conn)
                .await
        }
    }
    .map_err(|e| AppError::database("Failed to count queue items", e))?;

    let mut counts = StatusCounts::default();
    for (status, terminal, count) in rows {
        let count = u64::try_from(count).unwrap_or(0);
        match status.parse::<QueueStatus>()? {
            QueueStatus::Pending => counts.pending += count,
            QueueStatus::Syncing => counts.syncing += count,
            QueueStatus::Failed if terminal => counts.terminal += count,
            QueueStatus::Failed => counts.failed += count,
            QueueStatus::Completed => {}
        }
    }

    Ok(counts)
}

/// Moves a pending or failed item to `syncing`; returns the updated row
pub async fn begin_attempt(
    conn: &mut SqliteConnection,
    id: QueueItemId,
    now: Timestamp,
) -> Result<Option<SyncQueueItem>, AppError> {
    let sql = format!(
        r#"
        UPDATE sync_queue
        SET status = 'syncing', last_attempt_at = ?
        WHERE id = ? AND status IN ('pending', 'failed')
        RETURNING {}
        "#,
        ITEM_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(now.as_millis())
        .bind(id.as_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::database("Failed to mark item syncing", e))?;

    row.map(row_to_item).transpose()
}

/// Removes a `syncing` item after the remote side confirmed it; returns the removed row
pub async fn complete_attempt(
    conn: &mut SqliteConnection,
    id: QueueItemId,
) -> Result<Option<SyncQueueItem>, AppError> {
    let sql = format!(
        "DELETE FROM sync_queue WHERE id = ? AND status = 'syncing' RETURNING {}",
        ITEM_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(id.as_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::database("Failed to complete queue item", e))?;

    row.map(row_to_item).transpose()
}

/// Moves a `syncing` item to `failed`, incrementing its retry count
pub async fn fail_attempt(
    conn: &mut SqliteConnection,
    id: QueueItemId,
    error: &str,
    now: Timestamp,
    next_attempt_at: Option<Timestamp>,
    terminal: bool,
) -> Result<Option<SyncQueueItem>, AppError> {
    let sql = format!(
        r#"
        UPDATE sync_queue
        SET status = 'failed',
            error = ?,
            last_attempt_at = ?,
            retry_count = retry_count + 1,
            next_attempt_at = ?,
            terminal = ?
        WHERE id = ? AND status = 'syncing'
        RETURNING {}
        "#,
        ITEM_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(error)
        .bind(now.as_millis())
        .bind(next_attempt_at.map(|t| t.as_millis()))
        .bind(terminal)
        .bind(id.as_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::database("Failed to mark item failed", e))?;

    row.map(row_to_item).transpose()
}

/// Moves every `syncing` item to `failed` without counting an attempt
pub async fn interrupt_syncing(
    conn: &mut SqliteConnection,
    error: &str,
) -> Result<Vec<SyncQueueItem>, AppError> {
    let sql = format!(
        r#"
        UPDATE sync_queue
        SET status = 'failed', error = ?, next_attempt_at = NULL, terminal = 0
        WHERE status = 'syncing'
        RETURNING {}
        "#,
        ITEM_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(error)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AppError::database("Failed to recover interrupted items", e))?;

    rows.into_iter().map(row_to_item).collect()
}

/// Makes a failed item eligible again right away with a fresh retry budget
pub async fn reset_failed(
    conn: &mut SqliteConnection,
    id: QueueItemId,
) -> Result<Option<SyncQueueItem>, AppError> {
    let sql = format!(
        r#"
        UPDATE sync_queue
        SET retry_count = 0, next_attempt_at = NULL, terminal = 0
        WHERE id = ? AND status = 'failed'
        RETURNING {}
        "#,
        ITEM_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(id.as_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::database("Failed to reset queue item", e))?;

    row.map(row_to_item).transpose()
}

/// Deletes an item that is not in flight; returns the removed row
pub async fn delete_idle_item(
    conn: &mut SqliteConnection,
    id: QueueItemId,
) -> Result<Option<SyncQueueItem>, AppError> {
    let sql = format!(
        "DELETE FROM sync_queue WHERE id = ? AND status != 'syncing' RETURNING {}",
        ITEM_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(id.as_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::database("Failed to delete queue item", e))?;

    row.map(row_to_item).transpose()
}

/// Deletes a record's oldest pending create and every pending item after it
///
/// Returns the removed rows; empty when the record has no pending create.
pub async fn collapse_pending_create(
    conn: &mut SqliteConnection,
    key: &RecordKey,
) -> Result<Vec<SyncQueueItem>, AppError> {
    let sql = format!(
        r#"
        DELETE FROM sync_queue
        WHERE trip_id = ?1 AND entity = ?2 AND record_id = ?3
          AND status = 'pending'
          AND sequence >= (
              SELECT MIN(sequence) FROM sync_queue
              WHERE trip_id = ?1 AND entity = ?2 AND record_id = ?3
                AND status = 'pending' AND operation = 'create'
          )
        RETURNING {}
        "#,
        ITEM_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(key.trip_id.as_str())
        .bind(&key.entity)
        .bind(&key.record_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AppError::database("Failed to collapse queue items", e))?;

    let mut removed = rows
        .into_iter()
        .map(row_to_item)
        .collect::<Result<Vec<_>, _>>()?;
    removed.sort_by_key(|item| item.sequence);
    Ok(removed)
}

pub(crate) fn row_to_item(row: sqlx::sqlite::SqliteRow) -> Result<SyncQueueItem, AppError> {
    use sqlx::Row;

    let sequence: i64 = row
        .try_get("sequence")
        .map_err(|e| AppError::database("Missing queue sequence", e))?;
    let id_str: String = row
        .try_get("id")
        .map_err(|e| AppError::database("Missing queue item ID", e))?;
    let id = QueueItemId::from_string(&id_str)
        .map_err(|e| AppError::database("Invalid queue item ID", e))?;

    let trip_id: String = row
        .try_get("trip_id")
        .map_err(|e| AppError::database("Missing trip ID", e))?;
    let entity: String = row
        .try_get("entity")
        .map_err(|e| AppError::database("Missing entity", e))?;
    let record_id: String = row
        .try_get("record_id")
        .map_err(|e| AppError::database("Missing record ID", e))?;

    let operation: String = row
        .try_get("operation")
        .map_err(|e| AppError::database("Missing operation", e))?;
    let status: String = row
        .try_get("status")
        .map_err(|e| AppError::database("Missing status", e))?;

    let payload: String = row
        .try_get("payload")
        .map_err(|e| AppError::database("Missing payload", e))?;

    let created_at_ms: i64 = row
        .try_get("created_at")
        .map_err(|e| AppError::database("Missing created_at", e))?;
    let last_attempt_ms: Option<i64> = row
        .try_get("last_attempt_at")
        .map_err(|e| AppError::database("Invalid last_attempt_at", e))?;
    let next_attempt_ms: Option<i64> = row
        .try_get("next_attempt_at")
        .map_err(|e| AppError::database("Invalid next_attempt_at", e))?;
    let retry_count: i64 = row
        .try_get("retry_count")
        .map_err(|e| AppError::database("Missing retry_count", e))?;
    let terminal: bool = row
        .try_get("terminal")
        .map_err(|e| AppError::database("Missing terminal flag", e))?;
    let error: Option<String> = row
        .try_get("error")
        .map_err(|e| AppError::database("Invalid error column", e))?;

    Ok(SyncQueueItem {
        id,
        sequence,
        trip_id: TripId::new(trip_id),
        entity,
        record_id,
        operation: operation.parse::<SyncOperation>()?,
        payload: serde_json::from_str(&payload)
            .map_err(|e| AppError::database("Invalid queue payload", e))?,
        status: status.parse::<QueueStatus>()?,
        created_at: Timestamp::from_millis(created_at_ms),
        last_attempt_at: last_attempt_ms.map(Timestamp::from_millis),
        retry_count: u32::try_from(retry_count).unwrap_or(u32::MAX),
        error,
        next_attempt_at: next_attempt_ms.map(Timestamp::from_millis),
        terminal,
    })
}
