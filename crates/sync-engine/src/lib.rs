// crates/sync-engine/src/lib.rs
//! Local-first sync core
//!
//! - [`SyncQueue`]: persisted queue of local mutations, one item per change
//! - [`SyncEngine`]: drains the queue against the remote API with backoff
//! - [`StatusProjector`]: per-trip status for the UI
//!
//! # Example
//!
//! ```rust,no_run
//! use fairway_database::Store;
//! use fairway_network::{Client, ConnectivitySignal, HttpRemote};
//! use fairway_sync_engine::{SyncConfig, SyncEngine, SyncQueue};
//! use fairway_core::{SyncOperation, TripId};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let queue = SyncQueue::new(Store::open_in_memory().await?);
//! let remote = HttpRemote::new(Client::new()?, "https://api.fairway.golf/v1")?;
//! let engine = SyncEngine::new(
//!     queue.clone(),
//!     Arc::new(remote),
//!     ConnectivitySignal::fixed(true),
//!     SyncConfig::default(),
//! );
//!
//! let trip = TripId::new("ryder-2026");
//! queue
//!     .record_mutation(&trip, "player", SyncOperation::Create, serde_json::json!({"id": "p1"}))
//!     .await?;
//!
//! engine.start().await?;
//! engine.sync_now().await?;
//! # Ok(())
//! # }
//! ```

mod engine;
mod error;
mod queue;
mod setup;
mod status;
mod types;

pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use queue::{SyncQueue, INTERRUPTED_ERROR};
pub use setup::{database_config, http_remote};
pub use status::{project_status, StatusProjector, StatusSnapshot};
pub use types::{
    DrainOutcome, DrainReport, EnqueueOutcome, FailureMark, QueueCounts, SyncConfig, SyncState,
};
