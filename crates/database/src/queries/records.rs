//! Entity record operations
//!
//! Every logical entity table (`player`, `match`, `duesLineItem`, ...) lives
//! in the shared `records` table keyed by `(entity, id)`.

use fairway_core::{AppError, StoredRecord, Timestamp, TripId};
use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

/// Filter for [`query_records`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordQuery {
    /// Only records owned by this trip
    pub trip_id: Option<TripId>,
    /// Top-level JSON fields that must equal the given values
    pub field_equals: Vec<(String, Value)>,
}

impl RecordQuery {
    /// Creates a query matching every record of a table
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the query to one trip
    pub fn with_trip(mut self, trip_id: TripId) -> Self {
        self.trip_id = Some(trip_id);
        self
    }

    /// Requires `data.<field>` to equal `value`
    pub fn where_field(mut self, field: impl Into<String>, value: Value) -> Self {
        self.field_equals.push((field.into(), value));
        self
    }
}

/// Inserts a record or replaces the one with the same primary key
pub async fn upsert_record(
    conn: &mut SqliteConnection,
    entity: &str,
    record: &StoredRecord,
) -> Result<(), AppError> {
    let data = serde_json::to_string(&record.data)
        .map_err(|e| AppError::database("Failed to encode record", e))?;

    sqlx::query(
        r#"
        INSERT INTO records (entity, id, trip_id, data, updated_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(entity, id) DO UPDATE SET
            trip_id = excluded.trip_id,
            data = excluded.data,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(entity)
    .bind(&record.id)
    .bind(record.trip_id.as_str())
    .bind(data)
    .bind(record.updated_at.as_millis())
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::database("Failed to write record", e))?;

    Ok(())
}

/// Finds a record by primary key
pub async fn find_record(
    conn: &mut SqliteConnection,
    entity: &str,
    id: &str,
) -> Result<Option<StoredRecord>, AppError> {
    let row = sqlx::query(
        "SELECT id, trip_id, data, updated_at FROM records WHERE entity = ? AND id = ?",
    )
    .bind(entity)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| AppError::database("Failed to fetch record", e))?;

    row.map(row_to_record).transpose()
}

/// Gets a record by primary key, failing if it does not exist
pub async fn get_record(
    conn: &mut SqliteConnection,
    entity: &str,
    id: &str,
) -> Result<StoredRecord, AppError> {
    find_record(conn, entity, id)
        .await?
        .ok_or_else(|| AppError::RecordNotFound {
            entity: entity.to_string(),
            identifier: id.to_string(),
        })
}

/// Deletes a record, returning the owning trip if a row was removed
pub async fn delete_record(
    conn: &mut SqliteConnection,
    entity: &str,
    id: &str,
) -> Result<Option<TripId>, AppError> {
    let trip: Option<String> =
        sqlx::query_scalar("DELETE FROM records WHERE entity = ? AND id = ? RETURNING trip_id")
            .bind(entity)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| AppError::database("Failed to delete record", e))?;

    Ok(trip.map(TripId::new))
}

/// Lists records of one entity table matching `query`
pub async fn query_records(
    conn: &mut SqliteConnection,
    entity: &str,
    query: &RecordQuery,
) -> Result<Vec<StoredRecord>, AppError> {
    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT id, trip_id, data, updated_at FROM records WHERE entity = ");
    builder.push_bind(entity.to_string());

    if let Some(trip_id) = &query.trip_id {
        builder.push(" AND trip_id = ");
        builder.push_bind(trip_id.as_str().to_string());
    }

    for (field, value) in &query.field_equals {
        let path = json_path(field)?;
        builder.push(" AND json_extract(data, ");
        builder.push_bind(path);
        builder.push(")");

        match value {
            Value::Null => {
                builder.push(" IS NULL");
            }
            Value::Bool(b) => {
                builder.push(" = ");
                builder.push_bind(i64::from(*b));
            }
            Value::Number(n) => {
                builder.push(" = ");
                if let Some(i) = n.as_i64() {
                    builder.push_bind(i);
                } else {
                    builder.push_bind(n.as_f64().unwrap_or(f64::NAN));
                }
            }
            Value::String(s) => {
                builder.push(" = ");
                builder.push_bind(s.clone());
            }
            Value::Array(_) | Value::Object(_) => {
                builder.push(" = ");
                builder.push_bind(value.to_string());
            }
        }
    }

    builder.push(" ORDER BY updated_at, id");

    let rows = builder
        .build()
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AppError::database("Failed to query records", e))?;

    rows.into_iter().map(row_to_record).collect()
}

/// Counts records of one entity table owned by a trip
pub async fn count_records(
    conn: &mut SqliteConnection,
    entity: &str,
    trip_id: &TripId,
) -> Result<i64, AppError> {
    sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE entity = ? AND trip_id = ?")
        .bind(entity)
        .bind(trip_id.as_str())
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| AppError::database("Failed to count records", e))
}

fn json_path(field: &str) -> Result<String, AppError> {
    let valid = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid {
        return Err(AppError::InvalidArgument {
            argument: "field".to_string(),
            reason: format!("'{}' is not a plain top-level field name", field),
        });
    }

    Ok(format!("$.{}", field))
}

pub(crate) fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<StoredRecord, AppError> {
    use sqlx::Row;

    let id: String = row
        .try_get("id")
        .map_err(|e| AppError::database("Missing record ID", e))?;
    let trip_id: String = row
        .try_get("trip_id")
        .map_err(|e| AppError::database("Missing trip ID", e))?;
    let data: String = row
        .try_get("data")
        .map_err(|e| AppError::database("Missing record data", e))?;
    let updated_at_ms: i64 = row
        .try_get("updated_at")
        .map_err(|e| AppError::database("Missing updated_at", e))?;

    Ok(StoredRecord {
        id,
        trip_id: TripId::new(trip_id),
        data: serde_json::from_str(&data)
            .map_err(|e| AppError::database("Invalid record data", e))?,
        updated_at: Timestamp::from_millis(updated_at_ms),
    })
}
