//! Database query operations organized by table
//!
//! Functions take `&mut SqliteConnection` so the same call works on a
//! pooled connection or inside an open transaction.

pub mod records;
pub mod sync_queue;

// Re-export commonly used query functions
pub use records::{
    count_records, delete_record, find_record, get_record, query_records, upsert_record,
    RecordQuery,
};
pub use sync_queue::{
    begin_attempt, collapse_pending_create, complete_attempt, count_by_status, delete_idle_item,
    fail_attempt, get_item, insert_item, interrupt_syncing, list_active, list_for_record,
    reset_failed, StatusCounts,
};
