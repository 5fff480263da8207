// crates/sync-engine/src/types.rs
//! Core sync types and data structures

use chrono::{DateTime, Utc};
use fairway_config::SyncSettings;
use fairway_core::QueueItemId;
use fairway_resilience::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use fairway_database::StatusCounts as QueueCounts;

/// Configuration for the sync engine and status projector
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Backoff schedule and retry budget for transient failures
    pub retry_policy: RetryPolicy,
    /// Upper bound for one remote call
    pub request_timeout: Duration,
    /// Drain interval while online with active items
    pub poll_interval: Duration,
    /// Refresh interval for a watched trip status
    pub status_refresh_interval: Duration,
    /// Hold time before a connectivity change is published
    pub connectivity_debounce: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(30),
            status_refresh_interval: Duration::from_secs(5),
            connectivity_debounce: Duration::from_secs(2),
        }
    }
}

impl SyncConfig {
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_status_refresh_interval(mut self, interval: Duration) -> Self {
        self.status_refresh_interval = interval;
        self
    }

    pub fn with_connectivity_debounce(mut self, debounce: Duration) -> Self {
        self.connectivity_debounce = debounce;
        self
    }
}

impl From<&SyncSettings> for SyncConfig {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            retry_policy: RetryPolicy::new(settings.max_retries)
                .with_initial_delay(settings.backoff_initial())
                .with_max_delay(settings.backoff_max())
                .with_multiplier(settings.backoff_multiplier),
            request_timeout: settings.request_timeout(),
            poll_interval: settings.poll_interval(),
            status_refresh_interval: settings.status_refresh(),
            connectivity_debounce: settings.connectivity_debounce(),
        }
    }
}

/// Result of enqueuing a mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// A new pending item was appended
    Queued(QueueItemId),
    /// A delete cancelled a create that never reached the remote side
    Collapsed {
        /// Pending items removed for the record, the create included
        removed: u64,
    },
}

impl EnqueueOutcome {
    /// Returns the new item's id, if one was queued
    pub fn queued_id(&self) -> Option<QueueItemId> {
        match self {
            Self::Queued(id) => Some(*id),
            Self::Collapsed { .. } => None,
        }
    }
}

/// How a failed attempt is recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureMark {
    pub error: String,
    /// Delay before the next automatic attempt; `None` means eligible now
    pub retry_after: Option<Duration>,
    /// No automatic retries; waits for a human
    pub terminal: bool,
}

impl FailureMark {
    /// A failure that may be retried once `delay` has passed
    pub fn retry_after(error: impl Into<String>, delay: Duration) -> Self {
        Self {
            error: error.into(),
            retry_after: Some(delay),
            terminal: false,
        }
    }

    /// A failure that is never retried automatically
    pub fn terminal(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            retry_after: None,
            terminal: true,
        }
    }
}

/// Counters for one pass over the queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    /// Remote calls made
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Items left alone: blocked, backing off or terminal
    pub skipped: usize,
    /// Connectivity dropped before every item was visited
    pub interrupted: bool,
}

/// What a drain request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    Completed(DrainReport),
    /// Another drain holds the flag; nothing was done
    AlreadyRunning,
    /// The device is offline; the queue was not touched
    Offline,
}

/// Engine state exposed to hosts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncState {
    /// When the last drain finished
    pub last_drain_at: Option<DateTime<Utc>>,
    pub last_report: Option<DrainReport>,
    /// Storage error that aborted the last drain
    pub last_error: Option<String>,
    /// Whether a drain is currently in progress
    pub in_progress: bool,
    pub completed_drains: u64,
}

impl SyncState {
    /// Returns true if the last drain left failures behind
    pub fn has_failures(&self) -> bool {
        self.last_report.map_or(false, |r| r.failed > 0)
    }
}
