//! Error types for PODIUM operations

use thiserror::Error;

/// Remote API errors. These never escape the remote client as panics; the
/// caller decides whether a failure means "no data".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Malformed resource path: {path:?}")]
    MalformedPath { path: String },

    #[error("GET {url} failed after {attempts} attempt(s) (last status {last_status:?}): {reason}")]
    Exhausted {
        url: String,
        attempts: u32,
        last_status: Option<u16>,
        reason: String,
    },

    #[error("Unexpected payload shape from {url}: {reason}")]
    Decode { url: String, reason: String },
}

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage backend error: {reason}")]
    Backend { reason: String },

    #[error("Serialization error for {entity}: {reason}")]
    Serialization { entity: &'static str, reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Checkpoint file errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CheckpointError {
    #[error("Checkpoint I/O error on {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Checkpoint at {path} is corrupt: {reason}")]
    Corrupt { path: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config: {reason}")]
    Parse { reason: String },
}

/// Batch ingestion errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("Run interrupted; last committed index {last_committed_index:?}")]
    Interrupted { last_committed_index: Option<usize> },

    #[error("No team with number {number}")]
    TeamNotFound { number: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

/// Master error type for all PODIUM errors.
#[derive(Debug, Clone, Error)]
pub enum PodiumError {
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),
}

/// Result type alias for PODIUM operations.
pub type PodiumResult<T> = Result<T, PodiumError>;
