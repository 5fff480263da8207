// crates/network/src/error.rs
//! Error types for network operations

use fairway_core::AppError;
use thiserror::Error;

/// Result type for network operations
pub type NetworkResult<T> = Result<T, NetworkError>;

/// Errors that can occur during network operations
#[derive(Debug, Error)]
pub enum NetworkError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Network unavailable
    #[error("Network is unavailable")]
    NetworkUnavailable,

    /// Timeout
    #[error("Operation timed out")]
    Timeout,

    /// The connectivity monitor task has stopped
    #[error("Connectivity monitor is no longer running")]
    MonitorClosed,

    /// Resilience error
    #[error("Resilience error: {0}")]
    Resilience(#[from] fairway_resilience::ResilienceError),
}

impl NetworkError {
    /// Returns true if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NetworkError::Timeout | NetworkError::NetworkUnavailable | NetworkError::Http(_)
        ) || matches!(self, NetworkError::Resilience(e) if e.is_timeout())
    }

    /// Returns true if the error is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        if let NetworkError::Http(e) = self {
            if let Some(status) = e.status() {
                return status.is_client_error();
            }
        }
        false
    }

    /// Returns true if the error is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        if let NetworkError::Http(e) = self {
            if let Some(status) = e.status() {
                return status.is_server_error();
            }
        }
        false
    }
}

impl From<NetworkError> for AppError {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::InvalidUrl(url) => AppError::InvalidUrl { url },
            NetworkError::NetworkUnavailable | NetworkError::MonitorClosed => {
                AppError::ConnectionLost {
                    message: err.to_string(),
                }
            }
            NetworkError::Timeout => AppError::NetworkTimeout {
                operation: "network request".to_string(),
                seconds: 0,
            },
            other => AppError::network("Network request failed", other),
        }
    }
}
