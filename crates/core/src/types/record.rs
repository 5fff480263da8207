//! Locally stored entity documents

use crate::types::{Timestamp, TripId};
use serde::{Deserialize, Serialize};

/// A document stored in one of the per-entity tables
///
/// The sync core is agnostic to what a player, match or dues line item
/// looks like; it only needs the primary key and the owning trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Primary key within the entity table
    pub id: String,
    pub trip_id: TripId,
    pub data: serde_json::Value,
    pub updated_at: Timestamp,
}

impl StoredRecord {
    /// Creates a record stamped with the current time
    pub fn new(id: impl Into<String>, trip_id: TripId, data: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            trip_id,
            data,
            updated_at: Timestamp::now(),
        }
    }

    /// Reads a record's primary key out of a JSON payload's `id` field
    ///
    /// Numeric ids are accepted and rendered as strings.
    pub fn id_from_payload(payload: &serde_json::Value) -> Option<String> {
        match payload.get("id")? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}
