// crates/sync-engine/src/error.rs
//! Error types for sync operations

use fairway_core::{AppError, QueueItemId, QueueStatus};
use fairway_network::NetworkError;
use thiserror::Error;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while queueing or replaying mutations
///
/// Remote failures are not errors here: the engine turns them into queue
/// transitions. What escapes is a caller mistake or a storage fault.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The item is not in a status the requested transition starts from
    #[error("Queue item {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: QueueItemId,
        from: QueueStatus,
        to: QueueStatus,
    },

    /// Only failed items can be retried
    #[error("Queue item {id} is {status}; only failed items can be retried")]
    NotFailed { id: QueueItemId, status: QueueStatus },

    /// The item has a remote call in flight
    #[error("Queue item {0} is being synced")]
    InFlight(QueueItemId),

    /// No active queue item has this id
    #[error("Queue item not found: {0}")]
    NotFound(QueueItemId),

    /// Invalid mutation handed to the queue
    #[error("Invalid mutation: {0}")]
    Validation(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] AppError),

    /// The remote client could not be built
    #[error("Remote setup failed: {0}")]
    Network(#[from] NetworkError),

    /// Invalid engine configuration
    #[error("Invalid sync configuration: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Custom error
    #[error("{0}")]
    Custom(String),
}

impl SyncError {
    /// Returns true if the local database itself is failing
    pub fn is_storage_fault(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_storage_fault())
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Storage(e) => e,
            SyncError::InvalidTransition { id, from, to } => AppError::InvalidTransition {
                item: id.to_string(),
                from: from.to_string(),
                to: to.to_string(),
            },
            SyncError::NotFailed { id, status } => AppError::InvalidTransition {
                item: id.to_string(),
                from: status.to_string(),
                to: QueueStatus::Pending.to_string(),
            },
            SyncError::InFlight(id) => AppError::InvalidTransition {
                item: id.to_string(),
                from: QueueStatus::Syncing.to_string(),
                to: "discarded".to_string(),
            },
            SyncError::NotFound(id) => AppError::RecordNotFound {
                entity: "sync_queue".to_string(),
                identifier: id.to_string(),
            },
            SyncError::Validation(reason) => AppError::InvalidArgument {
                argument: "mutation".to_string(),
                reason,
            },
            SyncError::Network(e) => AppError::from(e),
            SyncError::Config(reason) => AppError::InvalidConfiguration {
                setting: "sync".to_string(),
                value: String::new(),
                reason,
            },
            SyncError::Serialization(e) => AppError::from(e),
            SyncError::Custom(message) => AppError::InternalError { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_display() {
        let id = QueueItemId::new();
        let err = SyncError::InvalidTransition {
            id,
            from: QueueStatus::Pending,
            to: QueueStatus::Completed,
        };
        let text = err.to_string();
        assert!(text.contains("pending"));
        assert!(text.contains("completed"));
    }

    #[test]
    fn test_not_found_maps_to_record_not_found() {
        let app: AppError = SyncError::NotFound(QueueItemId::new()).into();
        assert!(matches!(app, AppError::RecordNotFound { .. }));
    }

    #[test]
    fn test_storage_error_passes_through() {
        let inner = AppError::StorageQuotaExceeded {
            details: "database or disk is full".to_string(),
        };
        let err = SyncError::from(inner);
        assert!(err.is_storage_fault());

        let app: AppError = err.into();
        assert!(matches!(app, AppError::StorageQuotaExceeded { .. }));
    }

    #[test]
    fn test_validation_is_not_storage_fault() {
        assert!(!SyncError::Validation("missing id".to_string()).is_storage_fault());
    }
}
