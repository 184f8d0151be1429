//! In-memory storage for tests

use crate::{StorageResult, StorageTrait, WriteBatch};
use podium_core::{Metadata, Qualification, QualificationStatus, StorageError, Team, TeamId};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Tables {
    teams: BTreeMap<TeamId, Team>,
    qualifications: BTreeMap<TeamId, QualificationStatus>,
    metadata: Metadata,
}

/// In-memory mock storage with failure injection.
///
/// Clones share the same tables, so a test can keep a handle for assertions
/// while the code under test owns another.
#[derive(Debug, Clone, Default)]
pub struct MockStorage {
    tables: Arc<RwLock<Tables>>,
    failing_teams: Arc<RwLock<HashSet<TeamId>>>,
    fail_commits: Arc<AtomicBool>,
    commits: Arc<AtomicUsize>,
}

impl MockStorage {
    /// Create a new mock storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock storage pre-populated with teams.
    pub fn with_teams(teams: impl IntoIterator<Item = Team>) -> Self {
        let storage = Self::new();
        if let Ok(mut tables) = storage.tables.write() {
            for team in teams {
                tables.teams.insert(team.id, team);
            }
        }
        storage
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| StorageError::LockPoisoned)
    }

    // === Seeding ===

    /// Store a team directly, bypassing sessions.
    pub fn insert_team(&self, team: Team) -> StorageResult<()> {
        self.write()?.teams.insert(team.id, team);
        Ok(())
    }

    /// Store a qualification row directly, bypassing sessions and policies.
    pub fn insert_qualification(
        &self,
        team_id: TeamId,
        status: QualificationStatus,
    ) -> StorageResult<()> {
        self.write()?.qualifications.insert(team_id, status);
        Ok(())
    }

    // === Failure injection ===

    /// Make every read of this team's rows fail with a backend error.
    pub fn fail_reads_for(&self, team_id: TeamId) {
        if let Ok(mut failing) = self.failing_teams.write() {
            failing.insert(team_id);
        }
    }

    /// Make every subsequent [`StorageTrait::apply`] fail (or succeed again).
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    fn check_readable(&self, team_id: TeamId) -> StorageResult<()> {
        let failing = self
            .failing_teams
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        if failing.contains(&team_id) {
            return Err(StorageError::Backend {
                reason: format!("injected read failure for team {}", team_id),
            });
        }
        Ok(())
    }

    // === Inspection ===

    /// Number of successful batch applies.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn team_count(&self) -> usize {
        self.read().map(|t| t.teams.len()).unwrap_or(0)
    }

    pub fn qualification_count(&self) -> usize {
        self.read().map(|t| t.qualifications.len()).unwrap_or(0)
    }
}

impl StorageTrait for MockStorage {
    fn team_get(&self, id: TeamId) -> StorageResult<Option<Team>> {
        self.check_readable(id)?;
        Ok(self.read()?.teams.get(&id).cloned())
    }

    fn teams(&self) -> StorageResult<Vec<Team>> {
        Ok(self.read()?.teams.values().cloned().collect())
    }

    fn qualification_get(&self, team_id: TeamId) -> StorageResult<Option<QualificationStatus>> {
        self.check_readable(team_id)?;
        Ok(self.read()?.qualifications.get(&team_id).copied())
    }

    fn qualifications(&self) -> StorageResult<Vec<Qualification>> {
        Ok(self
            .read()?
            .qualifications
            .iter()
            .map(|(team_id, status)| Qualification::new(*team_id, *status))
            .collect())
    }

    fn metadata(&self) -> StorageResult<Metadata> {
        Ok(self.read()?.metadata)
    }

    fn apply(&self, batch: &WriteBatch) -> StorageResult<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StorageError::TransactionFailed {
                reason: "injected commit failure".to_string(),
            });
        }

        let mut tables = self.write()?;
        for (id, team) in &batch.teams {
            tables.teams.insert(*id, team.clone());
        }
        for (id, status) in &batch.qualifications {
            tables.qualifications.insert(*id, *status);
        }
        if let Some(metadata) = batch.metadata {
            tables.metadata = metadata;
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
