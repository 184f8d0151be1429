//! Qualification status resolution

use async_trait::async_trait;
use podium_core::{IngestError, Qualification, QualificationStatus, TeamId};
use podium_remote::{Award, HttpTransport, RemoteClient, ReqwestTransport};
use std::collections::HashSet;
use std::sync::Arc;

/// Anything that can produce a team's qualification for the pipeline.
#[async_trait]
pub trait QualificationSource: Send + Sync {
    async fn resolve(&self, team_id: TeamId) -> Result<Qualification, IngestError>;
}

/// Highest status named by any award's qualification list.
pub fn status_from_awards(awards: &[Award]) -> QualificationStatus {
    QualificationStatus::highest_of(awards.iter().flat_map(Award::qualification_names))
}

/// Derives a team's status from its season awards.
///
/// Remote failures resolve to `NONE` rather than erroring, so one bad lookup
/// never stops a batch. Teams in the pre-qualified set resolve to `WORLD`
/// without a remote call.
pub struct QualificationResolver<T = ReqwestTransport> {
    client: Arc<RemoteClient<T>>,
    prequalified: HashSet<TeamId>,
}

impl<T: HttpTransport> QualificationResolver<T> {
    pub fn new(client: Arc<RemoteClient<T>>) -> Self {
        Self {
            client,
            prequalified: HashSet::new(),
        }
    }

    pub fn with_prequalified(mut self, teams: impl IntoIterator<Item = TeamId>) -> Self {
        self.prequalified.extend(teams);
        self
    }

    /// Treat every team registered for `event_id` as already WORLD.
    ///
    /// A failed fetch is logged and leaves the set unchanged.
    pub async fn load_prequalified(&mut self, event_id: i64) -> usize {
        match self.client.event_team_ids(event_id).await {
            Ok(ids) => {
                let count = ids.len();
                self.prequalified.extend(ids);
                tracing::info!(event_id, teams = count, "Loaded pre-qualified teams");
                count
            }
            Err(e) => {
                tracing::warn!(event_id, error = %e, "Could not load pre-qualified teams");
                0
            }
        }
    }

    /// Status for one team. Never fails.
    pub async fn resolve_status(&self, team_id: TeamId) -> QualificationStatus {
        if self.prequalified.contains(&team_id) {
            return QualificationStatus::World;
        }

        match self.client.team_awards(team_id).await {
            Ok(awards) => status_from_awards(&awards),
            Err(e) => {
                tracing::warn!(
                    team_id = %team_id,
                    error = %e,
                    "Award lookup failed; treating team as unqualified"
                );
                QualificationStatus::None
            }
        }
    }
}

#[async_trait]
impl<T: HttpTransport> QualificationSource for QualificationResolver<T> {
    async fn resolve(&self, team_id: TeamId) -> Result<Qualification, IngestError> {
        let status = self.resolve_status(team_id).await;
        Ok(Qualification::new(team_id, status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn award(names: Option<&[&str]>) -> Award {
        Award {
            title: "Award".to_string(),
            qualifications: names.map(|n| n.iter().map(|s| s.to_string()).collect()),
            team_winners: vec![],
        }
    }

    #[test]
    fn test_status_from_awards_takes_maximum() {
        let awards = vec![
            award(Some(&["Regional Championship"])),
            award(None),
            award(Some(&["Judges Choice", "World Championship"])),
        ];
        assert_eq!(status_from_awards(&awards), QualificationStatus::World);
    }

    #[test]
    fn test_status_from_awards_empty_or_unknown() {
        assert_eq!(status_from_awards(&[]), QualificationStatus::None);
        assert_eq!(
            status_from_awards(&[award(Some(&["Some Invitational"]))]),
            QualificationStatus::None
        );
    }
}
