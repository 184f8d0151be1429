//! PODIUM Core - Entity Types
//!
//! Pure data structures shared by every other crate in the workspace:
//! team records, the qualification status ordering, the checkpoint shape,
//! the error taxonomy and runtime configuration.

pub mod config;
pub mod entities;
pub mod error;
pub mod status;

pub use config::{IngestConfig, LogConfig, RetryConfig, StorageConfig};
pub use entities::{
    Checkpoint, Grade, LeaderboardEntry, LeaderboardQuery, Metadata, Qualification, Team,
    TeamFilter, TeamId, TeamQualificationRow,
};
pub use error::{
    CheckpointError, ConfigError, IngestError, PodiumError, PodiumResult, RemoteError,
    StorageError,
};
pub use status::{QualificationStatus, StatusParseError, UpsertPolicy};

use chrono::{DateTime, Utc};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;
