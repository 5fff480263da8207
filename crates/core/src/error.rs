//! Error types and recovery strategies for Fairway
//!
//! Errors are classified into three severity tiers:
//! - **Recoverable**: can be retried automatically (network timeouts, 5xx, locked database)
//! - **Degraded**: the operation failed but the app continues (remote rejected a mutation)
//! - **Fatal**: the local mutation path is broken (quota exceeded, corruption)
//!
//! Each error carries a recovery action so callers can decide between
//! retrying, surfacing the failure to the user, or shutting down safely.

use std::fmt;
use std::io;
use thiserror::Error;

/// Recovery actions that can be taken when an error occurs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Retry the operation immediately (e.g., transient network glitch)
    RetryImmediate,
    /// Retry with exponential backoff (e.g., server temporarily unavailable)
    RetryWithBackoff,
    /// Attempt to repair the database before continuing
    RepairDatabase,
    /// Perform a safe shutdown and require user restart
    SafeShutdown,
    /// No automatic recovery - user intervention required
    UserIntervention,
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetryImmediate => write!(f, "Retrying immediately"),
            Self::RetryWithBackoff => write!(f, "Retrying with backoff"),
            Self::RepairDatabase => write!(f, "Repairing database"),
            Self::SafeShutdown => write!(f, "Performing safe shutdown"),
            Self::UserIntervention => write!(f, "User intervention required"),
        }
    }
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Error can be automatically recovered from
    Recoverable,
    /// Operation failed but the app can continue
    Degraded,
    /// Critical error requiring restart or user action
    Fatal,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recoverable => write!(f, "Recoverable"),
            Self::Degraded => write!(f, "Degraded"),
            Self::Fatal => write!(f, "Fatal"),
        }
    }
}

/// Main error type for Fairway
#[derive(Error, Debug)]
pub enum AppError {
    // ===== Network Errors =====
    /// Network request failed
    #[error("Network error: {message}")]
    NetworkError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Network timeout
    #[error("Network timeout after {seconds}s: {operation}")]
    NetworkTimeout { operation: String, seconds: u64 },

    /// Connection lost during operation
    #[error("Connection lost: {message}")]
    ConnectionLost { message: String },

    /// Invalid URL provided
    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },

    // ===== Storage Errors =====
    /// Database operation failed
    #[error("Database error: {message}")]
    DatabaseError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database is corrupted and needs repair
    #[error("Database corrupted: {details}")]
    DatabaseCorrupted { details: String },

    /// Local storage quota exhausted
    #[error("Storage quota exceeded: {details}")]
    StorageQuotaExceeded { details: String },

    /// Database migration failed
    #[error("Migration failed: {version} - {reason}")]
    MigrationFailed { version: String, reason: String },

    /// Database is locked by another connection
    #[error("Database locked: {operation}")]
    DatabaseLocked { operation: String },

    /// Record not found in database
    #[error("Record not found: {entity} with {identifier}")]
    RecordNotFound { entity: String, identifier: String },

    // ===== Sync Errors =====
    /// Remote side refused a mutation (validation or conflict)
    #[error("Remote rejected {entity} mutation (HTTP {status}): {reason}")]
    RemoteRejected {
        entity: String,
        status: u16,
        reason: String,
    },

    /// Queue item state transition not allowed
    #[error("Invalid queue transition for {item}: {from} -> {to}")]
    InvalidTransition {
        item: String,
        from: String,
        to: String,
    },

    // ===== Configuration Errors =====
    /// Invalid configuration
    #[error("Invalid configuration: {setting} = '{value}' ({reason})")]
    InvalidConfiguration {
        setting: String,
        value: String,
        reason: String,
    },

    // ===== File System Errors =====
    /// General I/O error
    #[error("I/O error: {message}")]
    IoError {
        message: String,
        #[source]
        source: io::Error,
    },

    // ===== Generic Errors =====
    /// Generic internal error
    #[error("Internal error: {message}")]
    InternalError { message: String },

    /// Invalid argument provided
    #[error("Invalid argument: {argument} - {reason}")]
    InvalidArgument { argument: String, reason: String },
}

impl AppError {
    /// Returns the severity level of this error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // Recoverable - can retry automatically
            Self::NetworkError { .. }
            | Self::NetworkTimeout { .. }
            | Self::ConnectionLost { .. }
            | Self::DatabaseLocked { .. } => ErrorSeverity::Recoverable,

            // Fatal - the local mutation path cannot continue
            Self::DatabaseCorrupted { .. }
            | Self::StorageQuotaExceeded { .. }
            | Self::MigrationFailed { .. } => ErrorSeverity::Fatal,

            // Context-dependent - default to degraded
            _ => ErrorSeverity::Degraded,
        }
    }

    /// Returns the recommended recovery action for this error
    pub fn recovery_action(&self) -> RecoveryAction {
        match self {
            Self::NetworkTimeout { .. } | Self::ConnectionLost { .. } => {
                RecoveryAction::RetryImmediate
            }

            Self::NetworkError { .. } | Self::DatabaseLocked { .. } => {
                RecoveryAction::RetryWithBackoff
            }

            Self::DatabaseCorrupted { .. } => RecoveryAction::RepairDatabase,

            Self::MigrationFailed { .. } => RecoveryAction::SafeShutdown,

            // Default to user intervention for safety
            _ => RecoveryAction::UserIntervention,
        }
    }

    /// Returns a user-friendly error message suitable for display in the UI
    pub fn user_message(&self) -> String {
        match self {
            Self::NetworkError { .. } | Self::NetworkTimeout { .. } => {
                "Cannot reach the server. Your changes are saved and will sync later.".to_string()
            }
            Self::ConnectionLost { .. } => {
                "Connection was interrupted. Changes will sync when you're back online."
                    .to_string()
            }
            Self::InvalidUrl { .. } => "The sync server address is not valid.".to_string(),

            Self::DatabaseError { .. } | Self::DatabaseLocked { .. } => {
                "Local storage is temporarily unavailable. Please try again.".to_string()
            }
            Self::DatabaseCorrupted { .. } => {
                "Local trip data is damaged and needs repair.".to_string()
            }
            Self::StorageQuotaExceeded { .. } => {
                "Your device is out of storage. Free up space to keep saving changes.".to_string()
            }
            Self::MigrationFailed { .. } => {
                "Failed to update local storage. Please restart the app.".to_string()
            }
            Self::RecordNotFound { .. } => "The requested item was not found.".to_string(),

            Self::RemoteRejected { entity, .. } => {
                format!("The server rejected a change to a {}. Edit it or discard it.", entity)
            }
            Self::InvalidTransition { .. } => {
                "That change is already being synced.".to_string()
            }

            Self::InvalidConfiguration { setting, .. } => {
                format!("Invalid setting: {}. Please check your configuration.", setting)
            }

            Self::IoError { .. } => "A file operation failed. Please try again.".to_string(),
            Self::InternalError { .. } => {
                "An unexpected error occurred. Please try again.".to_string()
            }
            Self::InvalidArgument { .. } => "Invalid input provided.".to_string(),
        }
    }

    /// Returns true if this error should be logged at ERROR level
    pub fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Fatal
    }

    /// Returns true if this error can be automatically retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.recovery_action(),
            RecoveryAction::RetryImmediate | RecoveryAction::RetryWithBackoff
        )
    }

    /// Returns true for local storage faults (quota, corruption, failed migration)
    pub fn is_storage_fault(&self) -> bool {
        matches!(
            self,
            Self::StorageQuotaExceeded { .. }
                | Self::DatabaseCorrupted { .. }
                | Self::MigrationFailed { .. }
        )
    }

    /// Helper to create a network error from any error type
    pub fn network<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Helper to create a database error from any error type
    ///
    /// SQLite reports quota, corruption and lock conditions only through its
    /// message text, so those are promoted to their dedicated variants here.
    pub fn database<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        let message = message.into();
        let detail = source.to_string();
        let lowered = detail.to_lowercase();

        if lowered.contains("database or disk is full") || lowered.contains("sqlite_full") {
            Self::StorageQuotaExceeded {
                details: format!("{}: {}", message, detail),
            }
        } else if lowered.contains("malformed")
            || lowered.contains("file is not a database")
            || lowered.contains("sqlite_corrupt")
        {
            Self::DatabaseCorrupted {
                details: format!("{}: {}", message, detail),
            }
        } else if lowered.contains("database is locked") {
            Self::DatabaseLocked { operation: message }
        } else {
            Self::DatabaseError {
                message,
                source: Some(Box::new(source)),
            }
        }
    }
}

/// Convenience type alias for Results using AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        Self::IoError {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidArgument {
            argument: "payload".to_string(),
            reason: err.to_string(),
        }
    }
}
