//! Property tests for trip status projection

use fairway_core::{
    QueueItemId, QueueStatus, SyncOperation, SyncQueueItem, Timestamp, TripId, TripSyncStatus,
};
use fairway_sync_engine::{project_status, StatusSnapshot};
use proptest::prelude::*;

fn queue_status() -> impl Strategy<Value = QueueStatus> {
    prop_oneof![
        Just(QueueStatus::Pending),
        Just(QueueStatus::Syncing),
        Just(QueueStatus::Failed),
    ]
}

fn item(trip: &str, status: QueueStatus, seq: i64) -> SyncQueueItem {
    SyncQueueItem {
        id: QueueItemId::new(),
        sequence: seq,
        trip_id: TripId::new(trip),
        entity: "scorecard".to_string(),
        record_id: format!("s{}", seq),
        operation: SyncOperation::Update,
        payload: serde_json::json!({"id": format!("s{}", seq)}),
        status,
        created_at: Timestamp::from_millis(seq),
        last_attempt_at: None,
        retry_count: 0,
        error: None,
        next_attempt_at: None,
        terminal: false,
    }
}

fn items(statuses: &[(bool, QueueStatus)]) -> Vec<SyncQueueItem> {
    statuses
        .iter()
        .enumerate()
        .map(|(n, (mine, status))| {
            let trip = if *mine { "mine" } else { "other" };
            item(trip, *status, n as i64 + 1)
        })
        .collect()
}

fn expected(statuses: &[(bool, QueueStatus)]) -> TripSyncStatus {
    let mine: Vec<QueueStatus> = statuses
        .iter()
        .filter(|(m, _)| *m)
        .map(|(_, s)| *s)
        .collect();

    if mine.contains(&QueueStatus::Failed) {
        TripSyncStatus::Failed
    } else if mine.contains(&QueueStatus::Syncing) {
        TripSyncStatus::Syncing
    } else if mine.contains(&QueueStatus::Pending) {
        TripSyncStatus::Pending
    } else {
        TripSyncStatus::Synced
    }
}

proptest! {
    #[test]
    fn offline_always_wins(statuses in prop::collection::vec((any::<bool>(), queue_status()), 0..20)) {
        let items = items(&statuses);
        prop_assert_eq!(
            project_status(false, &items, &TripId::new("mine")),
            TripSyncStatus::Offline
        );
    }

    #[test]
    fn online_follows_precedence(statuses in prop::collection::vec((any::<bool>(), queue_status()), 0..20)) {
        let items = items(&statuses);
        prop_assert_eq!(
            project_status(true, &items, &TripId::new("mine")),
            expected(&statuses)
        );
    }

    #[test]
    fn order_does_not_matter(statuses in prop::collection::vec((any::<bool>(), queue_status()), 0..20)) {
        let trip = TripId::new("mine");
        let forward = items(&statuses);
        let mut backward = forward.clone();
        backward.reverse();
        prop_assert_eq!(
            project_status(true, &forward, &trip),
            project_status(true, &backward, &trip)
        );
    }

    #[test]
    fn snapshot_counts_only_the_trip(statuses in prop::collection::vec((any::<bool>(), queue_status()), 0..20)) {
        let items = items(&statuses);
        let snapshot = StatusSnapshot::from_items(true, &items, &TripId::new("mine"));

        let mine = statuses.iter().filter(|(m, _)| *m).count();
        prop_assert_eq!(snapshot.total(), mine);
        prop_assert_eq!(snapshot.status, expected(&statuses));
    }
}
