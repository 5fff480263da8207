// crates/network/src/remote.rs
//! Remote persistence API

use crate::client::{join_segments, parse_base_url, Client};
use crate::error::NetworkResult;
use async_trait::async_trait;
use fairway_core::{QueueItemId, SyncOperation, SyncQueueItem, TripId};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Header carrying the queue item id so replays are deduplicated remotely
pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

/// One mutation as sent to the remote side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationRequest {
    pub idempotency_key: QueueItemId,
    pub trip_id: TripId,
    pub entity: String,
    pub record_id: String,
    pub operation: SyncOperation,
    pub payload: serde_json::Value,
}

impl From<&SyncQueueItem> for MutationRequest {
    fn from(item: &SyncQueueItem) -> Self {
        Self {
            idempotency_key: item.id,
            trip_id: item.trip_id.clone(),
            entity: item.entity.clone(),
            record_id: item.record_id.clone(),
            operation: item.operation,
            payload: item.payload.clone(),
        }
    }
}

/// Outcome of a failed remote call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Network trouble, timeouts, 408, 429 and 5xx; retried with backoff
    #[error("transient remote failure: {0}")]
    Transient(String),

    /// The remote side refused the mutation; retrying will not help
    #[error("remote rejected mutation (HTTP {status}): {message}")]
    Permanent { status: u16, message: String },
}

impl RemoteError {
    /// Returns true if the call may succeed when repeated
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Maps an HTTP status to success or a classified failure
pub fn classify_status(status: StatusCode, body: &str) -> Result<(), RemoteError> {
    if status.is_success() {
        return Ok(());
    }

    let message = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_string()
    } else {
        body.trim().chars().take(512).collect()
    };

    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        Err(RemoteError::Transient(format!(
            "HTTP {}: {}",
            status.as_u16(),
            message
        )))
    } else {
        Err(RemoteError::Permanent {
            status: status.as_u16(),
            message,
        })
    }
}

/// The server-side persistence API the sync engine replays mutations against
///
/// Implementations must treat a repeated idempotency key as a no-op.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Applies one mutation remotely
    async fn apply(&self, request: &MutationRequest) -> Result<(), RemoteError>;
}

/// [`RemoteApi`] over HTTP
///
/// Sends `POST {base}/trips/{trip_id}/mutations` with the mutation as JSON.
#[derive(Clone)]
pub struct HttpRemote {
    client: Client,
    base_url: Url,
}

impl HttpRemote {
    /// Creates a remote for `base_url`
    pub fn new(client: Client, base_url: &str) -> NetworkResult<Self> {
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
        })
    }

    /// Returns the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Returns the mutation endpoint for a trip
    pub fn mutations_url(&self, trip_id: &TripId) -> Url {
        join_segments(&self.base_url, &["trips", trip_id.as_str(), "mutations"])
    }

    /// Returns the health endpoint probed for connectivity
    pub fn health_url(&self) -> Url {
        join_segments(&self.base_url, &["health"])
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn apply(&self, request: &MutationRequest) -> Result<(), RemoteError> {
        let key = HeaderValue::from_str(&request.idempotency_key.as_string())
            .map_err(|e| RemoteError::Transient(e.to_string()))?;
        let headers = [(HeaderName::from_static(IDEMPOTENCY_HEADER), key)];

        let response = self
            .client
            .post_json(self.mutations_url(&request.trip_id), request, &headers)
            .await
            .map_err(|e| RemoteError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            log::debug!(
                "Remote applied {} {}/{}",
                request.operation,
                request.entity,
                request.record_id
            );
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        classify_status(status, &body)
    }
}
