//! Domain types for Fairway
//!
//! - `common`: timestamps shared by every model
//! - `trip`: trip and queue-item identifiers
//! - `record`: locally stored entity documents
//! - `sync`: sync queue items, operations and derived status

mod common;
mod record;
mod sync;
mod trip;

pub use common::Timestamp;
pub use record::StoredRecord;
pub use sync::{QueueStatus, RecordKey, SyncOperation, SyncQueueItem, TripSyncStatus};
pub use trip::{QueueItemId, TripId};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_types_are_exported() {
        let _id: QueueItemId = QueueItemId::new();
        let _trip: TripId = TripId::new("trip");
        let _now: Timestamp = Timestamp::now();
        let _status: TripSyncStatus = TripSyncStatus::Unknown;
    }
}
