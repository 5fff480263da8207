//! Sync queue domain model

use crate::error::AppError;
use crate::types::{QueueItemId, Timestamp, TripId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of mutation recorded in the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOperation {
    /// Record was created locally
    Create,
    /// Record was changed locally
    Update,
    /// Record was removed locally
    Delete,
}

impl SyncOperation {
    /// Returns the storage/wire name of the operation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncOperation {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(AppError::InvalidArgument {
                argument: "operation".to_string(),
                reason: format!("unknown sync operation '{}'", other),
            }),
        }
    }
}

/// Lifecycle status of a queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    /// Waiting for its first attempt
    Pending,
    /// A remote call is in flight
    Syncing,
    /// The last attempt failed
    Failed,
    /// Confirmed by the remote side; never stored as an active row
    Completed,
}

impl QueueStatus {
    /// Returns the storage name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Syncing => "syncing",
            Self::Failed => "failed",
            Self::Completed => "completed",
        }
    }

    /// Returns true for statuses that keep an item in the active queue
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Completed)
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "syncing" => Ok(Self::Syncing),
            "failed" => Ok(Self::Failed),
            "completed" => Ok(Self::Completed),
            other => Err(AppError::InvalidArgument {
                argument: "status".to_string(),
                reason: format!("unknown queue status '{}'", other),
            }),
        }
    }
}

/// The ordering partition for queued mutations
///
/// Items sharing a key are applied remotely in enqueue order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub trip_id: TripId,
    pub entity: String,
    pub record_id: String,
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.trip_id, self.entity, self.record_id)
    }
}

/// A pending local mutation waiting to be applied remotely
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueItem {
    pub id: QueueItemId,
    /// Store-assigned enqueue order
    pub sequence: i64,
    pub trip_id: TripId,
    /// Logical table name, e.g. `player`, `match`, `duesLineItem`
    pub entity: String,
    pub record_id: String,
    pub operation: SyncOperation,
    pub payload: serde_json::Value,
    pub status: QueueStatus,
    pub created_at: Timestamp,
    pub last_attempt_at: Option<Timestamp>,
    pub retry_count: u32,
    /// Last error message, only set while `status` is `Failed`
    pub error: Option<String>,
    /// Earliest time an automatic retry may run
    pub next_attempt_at: Option<Timestamp>,
    /// Failed permanently or out of retries; needs a human to retry or discard
    pub terminal: bool,
}

impl SyncQueueItem {
    /// Returns the ordering partition this item belongs to
    pub fn record_key(&self) -> RecordKey {
        RecordKey {
            trip_id: self.trip_id.clone(),
            entity: self.entity.clone(),
            record_id: self.record_id.clone(),
        }
    }

    /// Returns true while the item is still in the active queue
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Returns true if the item failed and will not be retried automatically
    pub fn is_terminal_failure(&self) -> bool {
        self.status == QueueStatus::Failed && self.terminal
    }

    /// Returns true if the engine may attempt this item at `now`
    pub fn is_due(&self, now: Timestamp) -> bool {
        match self.status {
            QueueStatus::Pending => true,
            QueueStatus::Failed => {
                !self.terminal && self.next_attempt_at.map_or(true, |at| at <= now)
            }
            QueueStatus::Syncing | QueueStatus::Completed => false,
        }
    }
}

/// Aggregate sync status of a trip, derived from queue and connectivity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripSyncStatus {
    /// Nothing has been computed yet
    Unknown,
    Offline,
    Pending,
    Syncing,
    Failed,
    Synced,
}

impl fmt::Display for TripSyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Offline => "offline",
            Self::Pending => "pending",
            Self::Syncing => "syncing",
            Self::Failed => "failed",
            Self::Synced => "synced",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(status: QueueStatus) -> SyncQueueItem {
        SyncQueueItem {
            id: QueueItemId::new(),
            sequence: 1,
            trip_id: TripId::new("trip-1"),
            entity: "player".to_string(),
            record_id: "p1".to_string(),
            operation: SyncOperation::Create,
            payload: serde_json::json!({"id": "p1"}),
            status,
            created_at: Timestamp::from_millis(1_000),
            last_attempt_at: None,
            retry_count: 0,
            error: None,
            next_attempt_at: None,
            terminal: false,
        }
    }

    #[test]
    fn test_operation_parse_roundtrip() {
        for op in [SyncOperation::Create, SyncOperation::Update, SyncOperation::Delete] {
            assert_eq!(op.as_str().parse::<SyncOperation>().unwrap(), op);
        }
        assert!("upsert".parse::<SyncOperation>().is_err());
    }

    #[test]
    fn test_status_parse_and_activity() {
        assert_eq!("failed".parse::<QueueStatus>().unwrap(), QueueStatus::Failed);
        assert!(QueueStatus::Pending.is_active());
        assert!(QueueStatus::Syncing.is_active());
        assert!(QueueStatus::Failed.is_active());
        assert!(!QueueStatus::Completed.is_active());
        assert!("done".parse::<QueueStatus>().is_err());
    }

    #[test]
    fn test_pending_is_due() {
        assert!(item(QueueStatus::Pending).is_due(Timestamp::from_millis(0)));
        assert!(!item(QueueStatus::Syncing).is_due(Timestamp::from_millis(0)));
    }

    #[test]
    fn test_failed_due_respects_schedule() {
        let mut failed = item(QueueStatus::Failed);
        failed.next_attempt_at = Some(Timestamp::from_millis(5_000));
        assert!(!failed.is_due(Timestamp::from_millis(4_999)));
        assert!(failed.is_due(Timestamp::from_millis(5_000)));

        failed.terminal = true;
        assert!(!failed.is_due(Timestamp::from_millis(10_000)));
        assert!(failed.is_terminal_failure());
    }

    #[test]
    fn test_record_key_display() {
        let key = item(QueueStatus::Pending).record_key();
        assert_eq!(key.to_string(), "trip-1/player/p1");
    }

    #[test]
    fn test_item_serializes_camel_case() {
        let json = serde_json::to_value(item(QueueStatus::Pending)).unwrap();
        assert_eq!(json["tripId"], "trip-1");
        assert_eq!(json["retryCount"], 0);
        assert_eq!(json["status"], "pending");
        assert_eq!(json["operation"], "create");
    }
}
