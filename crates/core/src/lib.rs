//! Fairway core: domain types and the application error taxonomy shared by
//! every crate of the sync workspace.

pub mod error;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, ErrorSeverity, RecoveryAction, Result};
pub use types::{
    QueueItemId, QueueStatus, RecordKey, StoredRecord, SyncOperation, SyncQueueItem, Timestamp,
    TripId, TripSyncStatus,
};
