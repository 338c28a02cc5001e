//! Error types for the stylist engine.

use std::time::Duration;

use uuid::Uuid;

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Adapter failure: {0}")]
    Adapter(#[from] AdapterFailure),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Profile store errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Version conflict for user {user_id}: expected {expected}, found {found}")]
    Conflict {
        user_id: String,
        expected: u64,
        found: u64,
    },

    #[error("Corrupt profile for user {user_id}: {reason}")]
    Corrupt { user_id: String, reason: String },
}

impl StorageError {
    /// Whether this is an optimistic-concurrency conflict (retryable from a
    /// fresh load).
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Classified failure from an external service adapter.
///
/// Transient and rate-limited failures are retried with backoff; invalid
/// requests are not.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdapterFailure {
    #[error("Transient failure from {service}: {reason}")]
    Transient { service: String, reason: String },

    #[error("Rate limited by {service}, retry after {retry_after:?}")]
    RateLimited {
        service: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid request to {service}: {reason}")]
    Invalid { service: String, reason: String },
}

impl AdapterFailure {
    /// Whether the retry policy should attempt this call again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::RateLimited { .. })
    }

    /// The service that produced the failure.
    pub fn service(&self) -> &str {
        match self {
            Self::Transient { service, .. }
            | Self::RateLimited { service, .. }
            | Self::Invalid { service, .. } => service,
        }
    }
}

/// Chat-transport errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to send on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Failed to fetch updates on channel {name}: {reason}")]
    FetchFailed { name: String, reason: String },

    #[error("Failed to download media {file_id} on channel {name}: {reason}")]
    MediaDownloadFailed {
        name: String,
        file_id: String,
        reason: String,
    },

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),
}

/// Generation job errors (internal to the coordinator).
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Job {id} is no longer claimed by user {user_id}")]
    ClaimLost { id: Uuid, user_id: String },

    #[error("Job {id} failed: {reason}")]
    Failed { id: Uuid, reason: String },
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
