//! Offline-first sync walkthrough
//!
//! Records two player edits while offline, comes back online and lets the
//! engine replay them against a remote that just logs what it receives.
//!
//! Settings come from `FAIRWAY_*` environment variables on top of the
//! defaults, e.g. `FAIRWAY_APP_LOG_LEVEL=debug cargo run --example sync_demo`.

use async_trait::async_trait;
use fairway_config::ConfigManager;
use fairway_core::{SyncOperation, TripId, TripSyncStatus};
use fairway_database::Store;
use fairway_network::{ConnectivityMonitor, HttpRemote, MutationRequest, RemoteApi, RemoteError};
use fairway_sync_engine::{
    database_config, http_remote, StatusProjector, SyncConfig, SyncEngine, SyncQueue,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Prints where each mutation would be sent instead of sending it
struct LoggingRemote {
    http: HttpRemote,
}

#[async_trait]
impl RemoteApi for LoggingRemote {
    async fn apply(&self, request: &MutationRequest) -> Result<(), RemoteError> {
        println!(
            "  POST {} <- {} {}/{} (key {})",
            self.http.mutations_url(&request.trip_id),
            request.operation,
            request.entity,
            request.record_id,
            request.idempotency_key
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let manager = ConfigManager::with_directory(dir.path().to_path_buf())?;
    let settings = manager.load_with_env_overrides()?;

    env_logger::Builder::new()
        .filter_level(settings.app.effective_log_level())
        .parse_default_env()
        .init();

    let config =
        SyncConfig::from(&settings.sync).with_connectivity_debounce(Duration::from_millis(200));
    let remote = LoggingRemote {
        http: http_remote(&settings.sync)?,
    };

    let queue = SyncQueue::new(Store::open(database_config(&manager, &settings)).await?);
    let (network, connectivity) =
        ConnectivityMonitor::spawn(false, config.connectivity_debounce);

    let engine = Arc::new(SyncEngine::new(
        queue.clone(),
        Arc::new(remote),
        connectivity.clone(),
        config.clone(),
    ));
    engine.start().await?;

    let projector = StatusProjector::new(queue.clone(), connectivity);
    let trip = TripId::new("pinehurst-2026");

    println!("Recording edits while offline...");
    queue
        .record_mutation(
            &trip,
            "player",
            SyncOperation::Create,
            json!({"id": "p1", "name": "Jane", "handicap": 12}),
        )
        .await?;
    queue
        .record_mutation(
            &trip,
            "player",
            SyncOperation::Update,
            json!({"id": "p1", "name": "Jane", "handicap": 11}),
        )
        .await?;

    let snapshot = projector.snapshot(&trip).await?;
    println!("Status: {} ({} pending)", snapshot.status, snapshot.pending);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sync_loop = Arc::clone(&engine).spawn(shutdown_rx);

    println!("Back online...");
    network.set_online()?;

    let mut status = projector.start_watching(trip.clone(), config.status_refresh_interval)?;
    let settled = status.wait_for(|s| matches!(s, TripSyncStatus::Synced | TripSyncStatus::Failed));
    tokio::time::timeout(Duration::from_secs(10), settled).await??;

    let snapshot = projector.snapshot(&trip).await?;
    println!("Status: {} ({} pending)", snapshot.status, snapshot.total());

    shutdown_tx.send(true)?;
    sync_loop.await?;
    Ok(())
}
