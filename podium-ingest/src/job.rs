//! Scheduled ingestion job and administrative operations

use crate::pipeline::{IngestionPipeline, RunReport};
use crate::progress::ProgressTracker;
use crate::resolver::QualificationResolver;
use crate::schedule::RefreshSchedule;
use crate::signature::{apply_qualifications, collect_signature_qualifications};
use crate::skills::{sync_skills, SkillsLimits, SkillsSyncReport};
use chrono::Utc;
use podium_core::{
    Checkpoint, Grade, IngestConfig, IngestError, QualificationStatus, Timestamp, UpsertPolicy,
};
use podium_remote::{HttpTransport, RemoteClient, ReqwestTransport};
use podium_storage::StorageTrait;
use std::sync::Arc;
use tokio::sync::watch;

/// How a job invocation should treat the schedule and the checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Run even if the last full run is recent.
    pub force: bool,
    /// Resume from an existing checkpoint.
    pub resume: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            force: false,
            resume: true,
        }
    }
}

/// What one full run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub skills: Vec<(Grade, SkillsSyncReport)>,
    pub signature_qualified: usize,
    pub run: RunReport,
    pub finished_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The last full run is recent enough.
    NotDue { last_update: Option<Timestamp> },
    Completed(JobReport),
}

/// Snapshot for the `status` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    pub checkpoint: Option<Checkpoint>,
    pub last_update: Option<Timestamp>,
}

/// Skills sync, Signature sweep and the qualification pipeline, run as one
/// unit and gated by the metadata timestamp.
pub struct IngestJob<S, T = ReqwestTransport> {
    config: IngestConfig,
    storage: Arc<S>,
    client: Arc<RemoteClient<T>>,
    schedule: RefreshSchedule,
    shutdown: watch::Receiver<bool>,
}

impl<S, T> IngestJob<S, T>
where
    S: StorageTrait,
    T: HttpTransport,
{
    pub fn new(config: IngestConfig, storage: Arc<S>, client: Arc<RemoteClient<T>>) -> Self {
        let schedule = RefreshSchedule::from_config(&config);
        let (_, shutdown) = watch::channel(false);
        Self {
            config,
            storage,
            client,
            schedule,
            shutdown,
        }
    }

    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn interrupted(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Run the full ingestion if it is due, forced, or left unfinished.
    ///
    /// The metadata timestamp is written only after the pipeline completes.
    /// A readable checkpoint from an interrupted run makes the job due
    /// regardless of the schedule, and the run picks up where it stopped.
    pub async fn run(&self, options: RunOptions) -> Result<JobOutcome, IngestError> {
        let pending = if options.resume {
            self.pending_checkpoint()
        } else {
            None
        };
        let resuming = pending.is_some();

        let last_update = self.storage.metadata_last_update()?;
        if !options.force && !resuming && !self.schedule.is_due(last_update, Utc::now()) {
            tracing::info!(last_update = ?last_update, "Full refresh not due; skipping");
            return Ok(JobOutcome::NotDue { last_update });
        }
        if let Some(checkpoint) = &pending {
            tracing::info!(
                resume_index = checkpoint.resume_index(),
                total = checkpoint.total_teams,
                "Unfinished run found; resuming qualification pass"
            );
        }
        let mut skills = Vec::new();
        let mut signature_qualified = 0;

        // A resumed run picks up the qualification pass where it stopped.
        if !resuming {
            let limits = SkillsLimits::from_config(&self.config);
            for grade in self.skills_grades() {
                if self.interrupted() {
                    return Err(IngestError::Interrupted {
                        last_committed_index: None,
                    });
                }
                let report = sync_skills(&self.client, self.storage.as_ref(), &grade, &limits).await?;
                skills.push((grade, report));
            }

            if self.interrupted() {
                return Err(IngestError::Interrupted {
                    last_committed_index: None,
                });
            }
            let qualifications = collect_signature_qualifications(&self.client).await;
            signature_qualified = apply_qualifications(self.storage.as_ref(), &qualifications)?;
            tracing::info!(teams = signature_qualified, "Applied Signature event qualifications");
        }

        let mut resolver = QualificationResolver::new(Arc::clone(&self.client));
        if let Some(event_id) = self.config.worlds_event_id {
            resolver.load_prequalified(event_id).await;
        }

        let teams = self.storage.team_ids(&self.config.team_filter)?;
        let mut pipeline = IngestionPipeline::new(
            Arc::clone(&self.storage),
            Arc::new(resolver),
            ProgressTracker::from_config(&self.config),
            self.config.commit_interval,
        )
        .with_shutdown(self.shutdown.clone());
        let run = pipeline.run(&teams, options.resume).await?;

        let finished_at = Utc::now();
        let mut session = self.storage.session();
        session.set_metadata_last_update(finished_at)?;
        session.commit()?;

        Ok(JobOutcome::Completed(JobReport {
            skills,
            signature_qualified,
            run,
            finished_at,
        }))
    }

    /// The checkpoint left by an unfinished run. An unreadable file counts as
    /// no checkpoint, so the run starts over with every step.
    fn pending_checkpoint(&self) -> Option<Checkpoint> {
        match ProgressTracker::load(&self.config.checkpoint_path) {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable checkpoint; running every step");
                None
            }
        }
    }

    fn skills_grades(&self) -> Vec<Grade> {
        match &self.config.team_filter.grade {
            Some(grade) => vec![grade.clone()],
            None => vec![Grade::MiddleSchool, Grade::HighSchool],
        }
    }

    /// Overwrite a team's status, bypassing the monotonic rule.
    pub fn correct_qualification(
        &self,
        number: &str,
        status: QualificationStatus,
    ) -> Result<QualificationStatus, IngestError> {
        let team_id = self
            .storage
            .team_id_by_number(number)?
            .ok_or_else(|| IngestError::TeamNotFound {
                number: number.to_string(),
            })?;

        let mut session = self.storage.session();
        let previous = session.qualification(team_id)?;
        let stored = session.upsert_qualification(team_id, status, UpsertPolicy::Unconditional)?;
        session.commit()?;

        tracing::info!(
            number,
            team_id = %team_id,
            previous = ?previous,
            status = %stored,
            "Qualification corrected"
        );
        Ok(stored)
    }

    pub fn status(&self) -> Result<JobStatus, IngestError> {
        Ok(JobStatus {
            checkpoint: ProgressTracker::load(&self.config.checkpoint_path)?,
            last_update: self.storage.metadata_last_update()?,
        })
    }
}
