//! Season skills sync: creates teams and refreshes their ranking metrics.

use podium_core::{Grade, IngestConfig, StorageError};
use podium_remote::{HttpTransport, RemoteClient};
use podium_storage::{StorageTrait, TeamUpsert};

/// Bounds for one skills sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkillsLimits {
    /// Stop after this many teams.
    pub team_limit: usize,
    /// Commit after every this many teams.
    pub commit_interval: usize,
}

impl SkillsLimits {
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            team_limit: config.skills_team_limit,
            commit_interval: config.skills_commit_interval.max(1),
        }
    }
}

impl Default for SkillsLimits {
    fn default() -> Self {
        Self::from_config(&IngestConfig::default())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkillsSyncReport {
    pub created: usize,
    pub updated: usize,
}

impl SkillsSyncReport {
    pub fn total(&self) -> usize {
        self.created + self.updated
    }
}

/// Pull the season skills leaderboard for `grade` into storage.
///
/// New teams are stored in full; known teams get their four metrics
/// replaced and keep their descriptive fields. A failed fetch is logged and
/// yields an empty report; storage failures are returned.
pub async fn sync_skills<T, S>(
    client: &RemoteClient<T>,
    storage: &S,
    grade: &Grade,
    limits: &SkillsLimits,
) -> Result<SkillsSyncReport, StorageError>
where
    T: HttpTransport,
    S: StorageTrait,
{
    let mut report = SkillsSyncReport::default();

    let entries = match client.skills_rankings(grade).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!(grade = %grade, error = %e, "Skills ranking fetch failed");
            return Ok(report);
        }
    };
    tracing::info!(grade = %grade, entries = entries.len(), "Syncing skills rankings");

    let commit_interval = limits.commit_interval.max(1);
    let mut session = storage.session();
    for entry in &entries {
        if report.total() >= limits.team_limit {
            tracing::warn!(limit = limits.team_limit, "Skills team limit reached");
            break;
        }

        match session.upsert_team(entry.to_team())? {
            TeamUpsert::Created => report.created += 1,
            TeamUpsert::Updated => report.updated += 1,
        }

        if report.total() % commit_interval == 0 {
            session.commit()?;
            tracing::info!(
                created = report.created,
                updated = report.updated,
                "Progress: {} updated, {} created",
                report.updated,
                report.created
            );
        }
    }
    session.commit()?;

    tracing::info!(
        grade = %grade,
        created = report.created,
        updated = report.updated,
        "Completed: {} teams updated, {} teams created",
        report.updated,
        report.created
    );
    Ok(report)
}
