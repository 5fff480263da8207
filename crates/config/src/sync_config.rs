//! Sync engine configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for replaying queued mutations against the remote API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncSettings {
    /// Base URL of the remote persistence API
    pub remote_url: String,

    /// Bearer token sent with every remote call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Upper bound for a single remote call, in seconds
    pub request_timeout_secs: u64,

    /// Delay before the first retry, in milliseconds
    pub backoff_initial_ms: u64,

    /// Growth factor between consecutive retry delays
    pub backoff_multiplier: f64,

    /// Cap on the retry delay, in seconds
    pub backoff_max_secs: u64,

    /// Failed attempts after which an item needs a human to retry it
    pub max_retries: u32,

    /// How often the engine drains while online, in seconds
    pub poll_interval_secs: u64,

    /// How often a watched trip status is recomputed, in seconds
    pub status_refresh_secs: u64,

    /// How long a connectivity change must hold before it is published
    pub connectivity_debounce_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            remote_url: "https://api.fairway.golf/v1".to_string(),
            auth_token: None,
            request_timeout_secs: 30,
            backoff_initial_ms: 1000,
            backoff_multiplier: 2.0,
            backoff_max_secs: 300,
            max_retries: 8,
            poll_interval_secs: 30,
            status_refresh_secs: 5,
            connectivity_debounce_ms: 2000,
        }
    }
}

impl SyncSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn backoff_initial(&self) -> Duration {
        Duration::from_millis(self.backoff_initial_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn status_refresh(&self) -> Duration {
        Duration::from_secs(self.status_refresh_secs)
    }

    pub fn connectivity_debounce(&self) -> Duration {
        Duration::from_millis(self.connectivity_debounce_ms)
    }
}

impl ConfigSection for SyncSettings {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = vec![
            Validator::http_url(&self.remote_url, "sync.remote_url"),
            Validator::in_range(self.request_timeout_secs, 1, 300, "sync.request_timeout_secs"),
            Validator::in_range(self.backoff_initial_ms, 1, 60_000, "sync.backoff_initial_ms"),
            Validator::in_range(self.backoff_multiplier, 1.0, 10.0, "sync.backoff_multiplier"),
            Validator::ordered(
                self.backoff_initial_ms,
                self.backoff_max_secs.saturating_mul(1000),
                "sync.backoff_max_secs",
                "must not be shorter than sync.backoff_initial_ms",
            ),
            Validator::in_range(self.max_retries, 1, 100, "sync.max_retries"),
            Validator::in_range(self.poll_interval_secs, 1, 3600, "sync.poll_interval_secs"),
            Validator::in_range(self.status_refresh_secs, 1, 600, "sync.status_refresh_secs"),
        ];

        if let Some(token) = &self.auth_token {
            results.push(Validator::not_empty(token, "sync.auth_token"));
        }

        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        self.remote_url = other.remote_url;
        if other.auth_token.is_some() {
            self.auth_token = other.auth_token;
        }
        self.request_timeout_secs = other.request_timeout_secs;
        self.backoff_initial_ms = other.backoff_initial_ms;
        self.backoff_multiplier = other.backoff_multiplier;
        self.backoff_max_secs = other.backoff_max_secs;
        self.max_retries = other.max_retries;
        self.poll_interval_secs = other.poll_interval_secs;
        self.status_refresh_secs = other.status_refresh_secs;
        self.connectivity_debounce_ms = other.connectivity_debounce_ms;
    }

    fn section_name(&self) -> &'static str {
        "sync"
    }
}
