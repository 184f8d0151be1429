//! Checkpointed batch processor for qualification statuses.
//!
//! # Lifecycle
//!
//! 1. The [`ProgressTracker`] yields the start index (0, or the position after
//!    the last checkpoint when resuming).
//! 2. Teams are visited by position from there. Resume is positional, so the
//!    team list must be the same (same filter, same order) across runs.
//! 3. Each team is resolved, merged into the session with the monotonic
//!    policy, and recorded in the tracker.
//! 4. Every `commit_interval` items the session is committed and only then
//!    is the checkpoint written, so the checkpoint never runs ahead of
//!    durable data.
//! 5. A failed item is logged and skipped.
//! 6. On shutdown or a fatal storage error the buffered writes are committed
//!    best-effort, the checkpoint is rewound to the last committed position,
//!    and the error is returned.

use crate::progress::ProgressTracker;
use crate::resolver::QualificationSource;
use podium_core::{IngestError, QualificationStatus, TeamId, UpsertPolicy};
use podium_storage::{Session, StorageTrait};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::Instrument;
use uuid::Uuid;

/// Status label recorded for items that could not be processed.
pub const FAILED_LABEL: &str = "FAILED";

/// Outcome of one invocation of [`IngestionPipeline::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Items handled by this invocation, including failed ones.
    pub processed: usize,
    /// Items that were logged and skipped.
    pub failed: usize,
    /// Position the run started from.
    pub start_index: usize,
    /// Length of the team list.
    pub total: usize,
}

pub struct IngestionPipeline<S, Q> {
    storage: Arc<S>,
    source: Arc<Q>,
    tracker: ProgressTracker,
    commit_interval: usize,
    shutdown: watch::Receiver<bool>,
}

impl<S, Q> IngestionPipeline<S, Q>
where
    S: StorageTrait,
    Q: QualificationSource,
{
    pub fn new(
        storage: Arc<S>,
        source: Arc<Q>,
        tracker: ProgressTracker,
        commit_interval: usize,
    ) -> Self {
        let (_, shutdown) = watch::channel(false);
        Self {
            storage,
            source,
            tracker,
            commit_interval: commit_interval.max(1),
            shutdown,
        }
    }

    /// Stop cooperatively once `shutdown` flips to `true`. The flag is checked
    /// before each item, so an in-flight lookup finishes first.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Process `teams`, resuming from the checkpoint when `resume` is set.
    pub async fn run(&mut self, teams: &[TeamId], resume: bool) -> Result<RunReport, IngestError> {
        let span = tracing::info_span!(
            "qualification_run",
            run_id = %Uuid::now_v7(),
            teams = teams.len(),
            resume
        );
        self.run_inner(teams, resume).instrument(span).await
    }

    async fn run_inner(&mut self, teams: &[TeamId], resume: bool) -> Result<RunReport, IngestError> {
        let total = teams.len();
        let mut start_index = self.tracker.initialize(total, resume);
        if start_index > total {
            tracing::warn!(
                start_index,
                total,
                "Checkpoint is past the end of the team list; nothing left to process"
            );
            start_index = total;
        }

        let storage = Arc::clone(&self.storage);
        let mut session = storage.session();

        let mut committed = start_index.checked_sub(1).and_then(|index| {
            let team_id = self
                .tracker
                .checkpoint()
                .last_processed_team_id
                .or_else(|| teams.get(index).copied())?;
            Some((index, team_id))
        });
        let mut last_processed = committed;
        let mut report = RunReport {
            processed: 0,
            failed: 0,
            start_index,
            total,
        };

        for (index, team_id) in teams.iter().copied().enumerate().skip(start_index) {
            if *self.shutdown.borrow() {
                tracing::warn!(index, "Shutdown requested");
                let last_committed =
                    abort(&mut self.tracker, &mut session, committed, last_processed);
                tracing::warn!(
                    last_committed_index = ?last_committed,
                    "INTERRUPTED: progress committed to database. Run again to resume."
                );
                return Err(IngestError::Interrupted {
                    last_committed_index: last_committed,
                });
            }

            let label = match self.process(&mut session, index, team_id).await {
                Ok(status) => status.as_db_str(),
                Err(e) => {
                    tracing::error!(index, team_id = %team_id, error = %e, "Failed to process team; skipping");
                    report.failed += 1;
                    FAILED_LABEL
                }
            };
            report.processed += 1;
            last_processed = Some((index, team_id));
            self.tracker.update_progress(index, team_id, label, false);

            if report.processed % self.commit_interval == 0 {
                if let Err(e) = session.commit() {
                    tracing::error!(index, error = %e, "Commit failed");
                    let last_committed =
                        abort(&mut self.tracker, &mut session, committed, last_processed);
                    tracing::error!(
                        last_committed_index = ?last_committed,
                        "ERROR: {}. Run again to resume.",
                        e
                    );
                    return Err(IngestError::Storage(e));
                }
                committed = last_processed;
                self.tracker.persist();
                tracing::info!(
                    processed = report.processed,
                    index,
                    "Database committed at {} teams",
                    report.processed
                );
            }
        }

        if let Err(e) = session.commit() {
            tracing::error!(error = %e, "Final commit failed");
            abort(&mut self.tracker, &mut session, committed, last_processed);
            return Err(IngestError::Storage(e));
        }

        if let Some((index, team_id)) = last_processed.filter(|_| report.processed > 0) {
            self.tracker.update_progress(index, team_id, "DONE", true);
        }
        self.tracker.complete();

        tracing::info!(
            processed = report.processed,
            failed = report.failed,
            start_index = report.start_index,
            total = report.total,
            "Qualification run finished"
        );
        Ok(report)
    }

    async fn process(
        &self,
        session: &mut Session<'_, S>,
        index: usize,
        team_id: TeamId,
    ) -> Result<QualificationStatus, IngestError> {
        let qualification = self.source.resolve(team_id).await?;
        let stored =
            session.upsert_qualification(team_id, qualification.status, UpsertPolicy::Monotonic)?;
        tracing::debug!(
            index,
            team_id = %team_id,
            resolved = %qualification.status,
            stored = %stored,
            "Team processed"
        );
        Ok(qualification.status)
    }
}

/// Commit what is buffered if possible, then save the checkpoint at the last
/// position known to be durable. Returns that position's index.
fn abort<S: StorageTrait + ?Sized>(
    tracker: &mut ProgressTracker,
    session: &mut Session<'_, S>,
    committed: Option<(usize, TeamId)>,
    last_processed: Option<(usize, TeamId)>,
) -> Option<usize> {
    let durable = match session.commit() {
        Ok(_) => last_processed,
        Err(e) => {
            tracing::error!(error = %e, "Best-effort commit failed; buffered writes are lost");
            session.rollback();
            committed
        }
    };
    tracker.save_committed(durable);
    durable.map(|(index, _)| index)
}
