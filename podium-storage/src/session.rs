//! Buffered transactional session

use crate::{StorageResult, StorageTrait, WriteBatch};
use podium_core::{Metadata, QualificationStatus, Team, TeamId, Timestamp, UpsertPolicy};

/// Outcome of [`Session::upsert_team`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamUpsert {
    /// First sighting; the full record was stored.
    Created,
    /// Known team; only the skills metrics were refreshed.
    Updated,
}

/// Unit of work over a storage backend.
///
/// Writes accumulate in memory and reach the backend in one atomic
/// [`StorageTrait::apply`] on [`commit`](Session::commit). Reads through the
/// session see its own pending writes first.
pub struct Session<'a, S: StorageTrait + ?Sized> {
    storage: &'a S,
    pending: WriteBatch,
}

impl<'a, S: StorageTrait + ?Sized> Session<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self {
            storage,
            pending: WriteBatch::new(),
        }
    }

    pub fn storage(&self) -> &'a S {
        self.storage
    }

    /// Rows waiting for the next commit.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    // === Reads ===

    pub fn team(&self, id: TeamId) -> StorageResult<Option<Team>> {
        match self.pending.teams.get(&id) {
            Some(team) => Ok(Some(team.clone())),
            None => self.storage.team_get(id),
        }
    }

    pub fn qualification(&self, team_id: TeamId) -> StorageResult<Option<QualificationStatus>> {
        match self.pending.qualifications.get(&team_id) {
            Some(status) => Ok(Some(*status)),
            None => self.storage.qualification_get(team_id),
        }
    }

    pub fn metadata(&self) -> StorageResult<Metadata> {
        match self.pending.metadata {
            Some(metadata) => Ok(metadata),
            None => self.storage.metadata(),
        }
    }

    // === Writes ===

    /// Merge `status` into the team's qualification row under `policy` and
    /// return the status that will be stored.
    pub fn upsert_qualification(
        &mut self,
        team_id: TeamId,
        status: QualificationStatus,
        policy: UpsertPolicy,
    ) -> StorageResult<QualificationStatus> {
        let current = self.qualification(team_id)?;
        let merged = policy.merge(current, status);
        if current != Some(merged) {
            tracing::debug!(
                team_id = %team_id,
                from = ?current,
                to = %merged,
                ?policy,
                "Qualification changed"
            );
        }
        self.pending.qualifications.insert(team_id, merged);
        Ok(merged)
    }

    /// Store a team on first sighting; afterwards refresh only its metrics.
    pub fn upsert_team(&mut self, team: Team) -> StorageResult<TeamUpsert> {
        match self.team(team.id)? {
            Some(mut existing) => {
                existing.refresh_metrics(&team);
                self.pending.teams.insert(existing.id, existing);
                Ok(TeamUpsert::Updated)
            }
            None => {
                self.pending.teams.insert(team.id, team);
                Ok(TeamUpsert::Created)
            }
        }
    }

    pub fn set_metadata_last_update(&mut self, at: Timestamp) -> StorageResult<()> {
        let mut metadata = self.metadata()?;
        metadata.last_slow_update = Some(at);
        self.pending.metadata = Some(metadata);
        Ok(())
    }

    // === Lifecycle ===

    /// Apply pending writes atomically. Returns the number of rows written.
    ///
    /// On failure the pending writes stay buffered.
    pub fn commit(&mut self) -> StorageResult<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        self.storage.apply(&self.pending)?;
        let rows = self.pending.len();
        self.pending = WriteBatch::new();
        tracing::debug!(rows, "Session committed");
        Ok(rows)
    }

    /// Discard pending writes.
    pub fn rollback(&mut self) {
        self.pending = WriteBatch::new();
    }
}

impl<S: StorageTrait + ?Sized> Drop for Session<'_, S> {
    fn drop(&mut self) {
        if self.has_pending() {
            tracing::debug!(
                rows = self.pending_len(),
                "Session dropped with uncommitted writes; discarding"
            );
        }
    }
}
