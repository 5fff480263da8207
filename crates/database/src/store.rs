//! Durable store façade
//!
//! Wraps the pool with per-table record operations, atomic transactions
//! and change subscriptions. Subscribers only ever see committed changes.

use crate::connection::{self, DatabaseConfig, DbPool};
use crate::migrations::run_migrations;
use crate::notify::{EventBus, StoreEvent, Subscription};
use crate::queries::records::{self, RecordQuery};
use fairway_core::{AppError, StoredRecord};
use sqlx::{Sqlite, SqliteConnection, Transaction};
use std::sync::Arc;

/// Table name the sync queue publishes its changes on
pub const SYNC_QUEUE_TABLE: &str = "sync_queue";

/// Local-first document store
#[derive(Clone)]
pub struct Store {
    pool: DbPool,
    bus: Arc<EventBus>,
}

impl Store {
    /// Wraps an already migrated pool
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            bus: EventBus::new(),
        }
    }

    /// Opens the database at `config.path` and applies pending migrations
    pub async fn open(config: DatabaseConfig) -> Result<Self, AppError> {
        let pool = connection::connect(config).await?;
        run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    /// Opens a migrated in-memory store
    pub async fn open_in_memory() -> Result<Self, AppError> {
        let pool = connection::connect_in_memory().await?;
        run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    /// Returns the underlying pool
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Inserts or replaces a record by primary key
    pub async fn put(&self, table: &str, record: &StoredRecord) -> Result<(), AppError> {
        check_table(table)?;
        let mut conn = self.acquire().await?;
        records::upsert_record(&mut conn, table, record).await?;
        drop(conn);

        self.bus.publish(&[StoreEvent::put(
            table,
            record.id.clone(),
            record.trip_id.clone(),
        )]);
        Ok(())
    }

    /// Reads a record by primary key
    pub async fn get(&self, table: &str, id: &str) -> Result<Option<StoredRecord>, AppError> {
        let mut conn = self.acquire().await?;
        records::find_record(&mut conn, table, id).await
    }

    /// Lists records of a table matching `query`
    pub async fn query(
        &self,
        table: &str,
        query: &RecordQuery,
    ) -> Result<Vec<StoredRecord>, AppError> {
        let mut conn = self.acquire().await?;
        records::query_records(&mut conn, table, query).await
    }

    /// Deletes a record; returns false if it did not exist
    pub async fn delete(&self, table: &str, id: &str) -> Result<bool, AppError> {
        check_table(table)?;
        let mut conn = self.acquire().await?;
        let removed = records::delete_record(&mut conn, table, id).await?;
        drop(conn);

        match removed {
            Some(trip_id) => {
                self.bus.publish(&[StoreEvent::delete(table, id, trip_id)]);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Starts a transaction; nothing is visible or published until commit
    ///
    /// The transaction is deferred. Lead with a write so the write lock is
    /// taken up front; a read followed by a write can fail with "database
    /// locked" when another connection commits in between.
    pub async fn begin(&self) -> Result<StoreTransaction, AppError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database("Failed to begin transaction", e))?;

        Ok(StoreTransaction {
            tx,
            events: Vec::new(),
            bus: Arc::clone(&self.bus),
        })
    }

    /// Registers `callback` for committed changes to `table` accepted by `predicate`
    pub fn subscribe<P, F>(
        &self,
        table: &str,
        predicate: P,
        callback: F,
    ) -> Result<Subscription, AppError>
    where
        P: Fn(&StoreEvent) -> bool + Send + Sync + 'static,
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.bus
            .subscribe(table, Box::new(predicate), Box::new(callback))
    }

    /// Closes the pool
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Acquires a pooled connection for the query modules
    ///
    /// Never call this while holding a [`StoreTransaction`] on the same
    /// task; an in-memory store has a single connection.
    pub async fn acquire(&self) -> Result<sqlx::pool::PoolConnection<Sqlite>, AppError> {
        self.pool
            .acquire()
            .await
            .map_err(|e| AppError::database("Failed to acquire connection", e))
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("connections", &self.pool.size())
            .finish()
    }
}

/// An open store transaction
///
/// Dropping it without [`commit`](Self::commit) rolls back every write.
pub struct StoreTransaction {
    tx: Transaction<'static, Sqlite>,
    events: Vec<StoreEvent>,
    bus: Arc<EventBus>,
}

impl StoreTransaction {
    /// Inserts or replaces a record inside the transaction
    pub async fn put(&mut self, table: &str, record: &StoredRecord) -> Result<(), AppError> {
        check_table(table)?;
        records::upsert_record(&mut *self.tx, table, record).await?;
        self.events.push(StoreEvent::put(
            table,
            record.id.clone(),
            record.trip_id.clone(),
        ));
        Ok(())
    }

    /// Reads a record inside the transaction
    pub async fn get(&mut self, table: &str, id: &str) -> Result<Option<StoredRecord>, AppError> {
        records::find_record(&mut *self.tx, table, id).await
    }

    /// Deletes a record inside the transaction
    pub async fn delete(&mut self, table: &str, id: &str) -> Result<bool, AppError> {
        check_table(table)?;
        match records::delete_record(&mut *self.tx, table, id).await? {
            Some(trip_id) => {
                self.events.push(StoreEvent::delete(table, id, trip_id));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Raw connection for query modules that compose with this transaction
    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }

    /// Queues an event to be published once the transaction commits
    pub fn publish_on_commit(&mut self, event: StoreEvent) {
        self.events.push(event);
    }

    /// Commits all writes atomically, then notifies subscribers
    pub async fn commit(self) -> Result<(), AppError> {
        let Self { tx, events, bus } = self;
        tx.commit()
            .await
            .map_err(|e| AppError::database("Failed to commit transaction", e))?;

        bus.publish(&events);
        Ok(())
    }

    /// Discards all writes
    pub async fn rollback(self) -> Result<(), AppError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| AppError::database("Failed to roll back transaction", e))
    }
}

fn check_table(table: &str) -> Result<(), AppError> {
    if table.trim().is_empty() || table == SYNC_QUEUE_TABLE {
        return Err(AppError::InvalidArgument {
            argument: "table".to_string(),
            reason: format!("'{}' is not a writable entity table", table),
        });
    }
    Ok(())
}
