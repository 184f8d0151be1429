//! PODIUM Storage - Storage Trait, Sessions and Backends
//!
//! Backends implement the small [`StorageTrait`] contract: point reads, full
//! scans and one atomic [`WriteBatch`] apply. Everything the ingestion job
//! needs on top of that (buffered sessions, upsert policies, read queries) is
//! written once against the trait.
//!
//! Two backends ship here: [`MockStorage`] (in memory, with failure
//! injection for tests) and [`LmdbStorage`] (durable, heed/LMDB).

pub mod lmdb;
pub mod mock;
pub mod query;
pub mod session;

pub use lmdb::LmdbStorage;
pub use mock::MockStorage;
pub use session::{Session, TeamUpsert};

use podium_core::{
    LeaderboardEntry, LeaderboardQuery, Metadata, Qualification, QualificationStatus,
    StorageError, Team, TeamFilter, TeamId, TeamQualificationRow, Timestamp,
};
use std::collections::BTreeMap;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// ============================================================================
// WRITE BATCH
// ============================================================================

/// A set of row writes applied atomically by [`StorageTrait::apply`].
///
/// Rows are full replacements; merge policies have already been resolved by
/// the [`Session`] that built the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    pub teams: BTreeMap<TeamId, Team>,
    pub qualifications: BTreeMap<TeamId, QualificationStatus>,
    pub metadata: Option<Metadata>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty() && self.qualifications.is_empty() && self.metadata.is_none()
    }

    /// Number of rows the batch will write.
    pub fn len(&self) -> usize {
        self.teams.len() + self.qualifications.len() + usize::from(self.metadata.is_some())
    }
}

// ============================================================================
// STORAGE TRAIT
// ============================================================================

/// Storage contract for teams, qualifications and the metadata singleton.
pub trait StorageTrait: Send + Sync {
    /// Get a team by id.
    fn team_get(&self, id: TeamId) -> StorageResult<Option<Team>>;

    /// All teams, ordered by id.
    fn teams(&self) -> StorageResult<Vec<Team>>;

    /// Stored status for a team, if it has a qualification row.
    fn qualification_get(&self, team_id: TeamId) -> StorageResult<Option<QualificationStatus>>;

    /// All qualification rows, ordered by team id.
    fn qualifications(&self) -> StorageResult<Vec<Qualification>>;

    /// The metadata singleton (default when never written).
    fn metadata(&self) -> StorageResult<Metadata>;

    /// Apply every write in the batch, or none of them.
    fn apply(&self, batch: &WriteBatch) -> StorageResult<()>;

    // === Sessions ===

    /// Open a buffered session. Nothing it writes is visible to other readers
    /// until [`Session::commit`]; dropping it discards pending writes.
    fn session(&self) -> Session<'_, Self>
    where
        Self: Sized,
    {
        Session::new(self)
    }

    // === Queries ===

    /// Ids of teams matching the filter, ordered by id.
    fn team_ids(&self, filter: &TeamFilter) -> StorageResult<Vec<TeamId>> {
        query::team_ids(self, filter)
    }

    /// Look a team up by its human-facing number.
    fn team_id_by_number(&self, number: &str) -> StorageResult<Option<TeamId>> {
        query::team_id_by_number(self, number)
    }

    /// When the last full ingestion run finished.
    fn metadata_last_update(&self) -> StorageResult<Option<Timestamp>> {
        Ok(self.metadata()?.last_slow_update)
    }

    /// Filtered teams with their stored status, best world rank first.
    fn leaderboard(&self, query: &LeaderboardQuery) -> StorageResult<Vec<LeaderboardEntry>> {
        query::leaderboard(self, query)
    }

    /// Qualification rows joined with their team's number and organization.
    fn team_qualifications(&self) -> StorageResult<Vec<TeamQualificationRow>> {
        query::team_qualifications(self)
    }
}
