//! Fairway Database Layer
//!
//! Durable local store for trip data and the sync queue. It uses SQLite
//! with sqlx; every entity write and its queue item can commit in one
//! transaction.

pub mod connection;
pub mod migrations;
pub mod notify;
pub mod queries;
pub mod store;

pub use connection::{connect, connect_in_memory, DatabaseConfig, DbPool};
pub use migrations::{current_version, optimize, run_migrations, verify_integrity};
pub use notify::{ChangeKind, StoreEvent, Subscription};
pub use queries::{RecordQuery, StatusCounts};
pub use store::{Store, StoreTransaction, SYNC_QUEUE_TABLE};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{insert_item, list_active};
    use fairway_core::{
        AppError, QueueItemId, QueueStatus, StoredRecord, SyncOperation, SyncQueueItem, Timestamp,
        TripId,
    };
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_database_migrations() -> Result<(), AppError> {
        let pool = connect_in_memory().await?;
        run_migrations(&pool).await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
            .fetch_one(&pool)
            .await
            .map_err(|e| AppError::database("Failed to count migrations", e))?;

        assert!(count > 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_record_and_queue_item_commit_together() -> Result<(), AppError> {
        let store = Store::open_in_memory().await?;
        let trip = TripId::new("ryder-2026");
        let payload = json!({"id": "p1", "name": "Jane", "handicap": 8});

        let mut tx = store.begin().await?;
        tx.put("player", &StoredRecord::new("p1", trip.clone(), payload.clone()))
            .await?;
        insert_item(
            tx.connection(),
            &SyncQueueItem {
                id: QueueItemId::new(),
                sequence: 0,
                trip_id: trip.clone(),
                entity: "player".to_string(),
                record_id: "p1".to_string(),
                operation: SyncOperation::Create,
                payload,
                status: QueueStatus::Pending,
                created_at: Timestamp::now(),
                last_attempt_at: None,
                retry_count: 0,
                error: None,
                next_attempt_at: None,
                terminal: false,
            },
        )
        .await?;
        tx.commit().await?;

        assert!(store.get("player", "p1").await?.is_some());
        let mut conn = store
            .pool()
            .acquire()
            .await
            .map_err(|e| AppError::database("acquire", e))?;
        assert_eq!(list_active(&mut conn, Some(&trip)).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_data_survives_reopen() -> Result<(), AppError> {
        let dir = TempDir::new()?;
        let path = dir.path().join("fairway.db").to_string_lossy().to_string();

        let store = Store::open(DatabaseConfig::new(path.clone())).await?;
        store
            .put(
                "duesLineItem",
                &StoredRecord::new("d1", TripId::new("t1"), json!({"id": "d1", "amount": 150})),
            )
            .await?;
        store.close().await;

        let reopened = Store::open(DatabaseConfig::new(path)).await?;
        let record = reopened.get("duesLineItem", "d1").await?;
        assert_eq!(record.map(|r| r.data["amount"].clone()), Some(json!(150)));
        verify_integrity(reopened.pool()).await?;
        Ok(())
    }
}
