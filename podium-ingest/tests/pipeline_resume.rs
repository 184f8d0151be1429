//! Checkpoint and resume behaviour of the qualification pipeline.

use async_trait::async_trait;
use podium_core::{IngestError, Qualification, QualificationStatus, StorageError, TeamId};
use podium_ingest::{IngestionPipeline, ProgressTracker, QualificationResolver, QualificationSource};
use podium_remote::RemoteClient;
use podium_storage::StorageTrait;
use podium_test_utils::fixtures::{team, test_config};
use podium_test_utils::remote::{respond_team_awards, team_awards_url};
use podium_test_utils::{MockStorage, MockTransport};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;

/// Source with scripted statuses that records every lookup. It can request
/// shutdown while resolving a given team, or never return for one.
#[derive(Default)]
struct ScriptedSource {
    statuses: HashMap<TeamId, QualificationStatus>,
    stop_at: Option<(TeamId, watch::Sender<bool>)>,
    hang_at: HashSet<TeamId>,
    calls: Mutex<Vec<TeamId>>,
}

impl ScriptedSource {
    fn with_status(mut self, id: i64, status: QualificationStatus) -> Self {
        self.statuses.insert(TeamId(id), status);
        self
    }

    fn stopping_at(mut self, id: i64, shutdown: watch::Sender<bool>) -> Self {
        self.stop_at = Some((TeamId(id), shutdown));
        self
    }

    fn hanging_at(mut self, id: i64) -> Self {
        self.hang_at.insert(TeamId(id));
        self
    }

    fn calls(&self) -> Vec<i64> {
        self.calls.lock().unwrap().iter().map(|id| id.get()).collect()
    }
}

#[async_trait]
impl QualificationSource for ScriptedSource {
    async fn resolve(&self, team_id: TeamId) -> Result<Qualification, IngestError> {
        self.calls.lock().unwrap().push(team_id);
        if self.hang_at.contains(&team_id) {
            std::future::pending::<()>().await;
        }
        if let Some((stop_id, shutdown)) = &self.stop_at {
            if *stop_id == team_id {
                let _ = shutdown.send(true);
            }
        }
        let status = self.statuses.get(&team_id).copied().unwrap_or_default();
        Ok(Qualification::new(team_id, status))
    }
}

fn ids(raw: &[i64]) -> Vec<TeamId> {
    raw.iter().copied().map(TeamId).collect()
}

fn storage_with(raw: &[i64]) -> Arc<MockStorage> {
    Arc::new(MockStorage::with_teams(
        raw.iter().map(|id| team(*id, &format!("{}A", id))),
    ))
}

fn pipeline<Q: QualificationSource>(
    storage: &Arc<MockStorage>,
    source: &Arc<Q>,
    checkpoint: &Path,
    commit_interval: usize,
) -> IngestionPipeline<MockStorage, Q> {
    IngestionPipeline::new(
        Arc::clone(storage),
        Arc::clone(source),
        ProgressTracker::new(checkpoint),
        commit_interval,
    )
}

fn status_of(storage: &MockStorage, id: i64) -> Option<QualificationStatus> {
    storage.qualification_get(TeamId(id)).unwrap()
}

// ============================================================================
// FULL RUNS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_awards_resolve_to_stored_statuses() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("progress.json");
    let config = test_config(&checkpoint);

    let mock = MockTransport::new();
    respond_team_awards(&mock, 101, &["World Championship"]);
    respond_team_awards(&mock, 102, &[]);
    let client = Arc::new(RemoteClient::with_transport(mock.clone(), &config));
    let resolver = Arc::new(QualificationResolver::new(client));

    let storage = storage_with(&[101, 102]);
    let mut pipeline = pipeline(&storage, &resolver, &checkpoint, config.commit_interval);
    let report = pipeline.run(&ids(&[101, 102]), true).await.unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(report.start_index, 0);
    assert_eq!(status_of(&storage, 101), Some(QualificationStatus::World));
    assert_eq!(status_of(&storage, 102), Some(QualificationStatus::None));
    assert!(!checkpoint.exists(), "completed run must delete its checkpoint");
    assert_eq!(mock.calls_to(&team_awards_url(101)), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_award_lookup_resolves_to_none() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("progress.json");
    let config = test_config(&checkpoint);

    // Nothing scripted: every lookup is a 404 and exhausts its retries.
    let mock = MockTransport::new();
    let client = Arc::new(RemoteClient::with_transport(mock.clone(), &config));
    let resolver = Arc::new(QualificationResolver::new(client));

    let storage = storage_with(&[7]);
    let mut pipeline = pipeline(&storage, &resolver, &checkpoint, 1);
    let report = pipeline.run(&ids(&[7]), true).await.unwrap();

    assert_eq!(report.failed, 0);
    assert_eq!(status_of(&storage, 7), Some(QualificationStatus::None));
    assert_eq!(
        mock.calls_to(&team_awards_url(7)),
        config.retry.max_attempts as usize
    );
}

#[tokio::test(start_paused = true)]
async fn test_lower_resolved_status_never_downgrades() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("progress.json");
    let storage = storage_with(&[1, 2]);
    storage
        .insert_qualification(TeamId(1), QualificationStatus::World)
        .unwrap();

    let source = Arc::new(
        ScriptedSource::default()
            .with_status(1, QualificationStatus::Regional)
            .with_status(2, QualificationStatus::Regional),
    );
    pipeline(&storage, &source, &checkpoint, 10)
        .run(&ids(&[1, 2]), true)
        .await
        .unwrap();

    assert_eq!(status_of(&storage, 1), Some(QualificationStatus::World));
    assert_eq!(status_of(&storage, 2), Some(QualificationStatus::Regional));
}

#[tokio::test(start_paused = true)]
async fn test_commits_every_interval_plus_final() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("progress.json");
    let storage = storage_with(&[1, 2, 3, 4, 5]);
    let source = Arc::new(ScriptedSource::default());

    pipeline(&storage, &source, &checkpoint, 2)
        .run(&ids(&[1, 2, 3, 4, 5]), true)
        .await
        .unwrap();

    // Two interval commits (after 2 and 4 items) and one final commit.
    assert_eq!(storage.commit_count(), 3);
    assert_eq!(storage.qualification_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_empty_team_list_completes() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("progress.json");
    let storage = Arc::new(MockStorage::new());
    let source = Arc::new(ScriptedSource::default());

    let report = pipeline(&storage, &source, &checkpoint, 2)
        .run(&[], true)
        .await
        .unwrap();

    assert_eq!(report.processed, 0);
    assert_eq!(report.total, 0);
    assert_eq!(storage.commit_count(), 0);
    assert!(!checkpoint.exists());
}

// ============================================================================
// INTERRUPTION AND RESUME
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_interrupt_then_resume_processes_only_the_rest() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("progress.json");
    let storage = storage_with(&[101, 102]);
    let teams = ids(&[101, 102]);

    let (tx, rx) = watch::channel(false);
    let first = Arc::new(
        ScriptedSource::default()
            .with_status(101, QualificationStatus::World)
            .stopping_at(101, tx),
    );
    let err = pipeline(&storage, &first, &checkpoint, 1)
        .with_shutdown(rx)
        .run(&teams, true)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        IngestError::Interrupted {
            last_committed_index: Some(0)
        }
    ));
    assert_eq!(first.calls(), vec![101]);
    assert_eq!(status_of(&storage, 101), Some(QualificationStatus::World));
    assert_eq!(status_of(&storage, 102), None);

    let saved = ProgressTracker::load(&checkpoint).unwrap().unwrap();
    assert_eq!(saved.last_processed_index, 0);
    assert_eq!(saved.last_processed_team_id, Some(TeamId(101)));
    assert_eq!(saved.processed_count, 1);

    let second = Arc::new(ScriptedSource::default().with_status(102, QualificationStatus::Regional));
    let report = pipeline(&storage, &second, &checkpoint, 1)
        .run(&teams, true)
        .await
        .unwrap();

    assert_eq!(second.calls(), vec![102]);
    assert_eq!(report.start_index, 1);
    assert_eq!(report.processed, 1);
    assert_eq!(status_of(&storage, 102), Some(QualificationStatus::Regional));
    assert!(!checkpoint.exists());
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_commits_buffered_writes() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("progress.json");
    let storage = storage_with(&[1, 2, 3]);

    let (tx, rx) = watch::channel(false);
    let source = Arc::new(
        ScriptedSource::default()
            .with_status(1, QualificationStatus::Regional)
            .with_status(2, QualificationStatus::World)
            .stopping_at(2, tx),
    );
    let err = pipeline(&storage, &source, &checkpoint, 10)
        .with_shutdown(rx)
        .run(&ids(&[1, 2, 3]), true)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        IngestError::Interrupted {
            last_committed_index: Some(1)
        }
    ));
    assert_eq!(status_of(&storage, 1), Some(QualificationStatus::Regional));
    assert_eq!(status_of(&storage, 2), Some(QualificationStatus::World));
    assert_eq!(
        ProgressTracker::load(&checkpoint).unwrap().unwrap().resume_index(),
        2
    );
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_with_failing_commit_rewinds_checkpoint() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("progress.json");
    let storage = storage_with(&[1, 2, 3]);
    storage.set_fail_commits(true);

    let (tx, rx) = watch::channel(false);
    let source = Arc::new(ScriptedSource::default().stopping_at(2, tx));
    let err = pipeline(&storage, &source, &checkpoint, 10)
        .with_shutdown(rx)
        .run(&ids(&[1, 2, 3]), true)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        IngestError::Interrupted {
            last_committed_index: None
        }
    ));
    assert_eq!(storage.qualification_count(), 0);
    let saved = ProgressTracker::load(&checkpoint).unwrap().unwrap();
    assert_eq!(saved.last_processed_index, -1);
    assert_eq!(saved.resume_index(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_crash_resumes_after_last_committed_index() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("progress.json");
    let storage = storage_with(&[1, 2, 3, 4, 5]);
    let teams = ids(&[1, 2, 3, 4, 5]);

    // The fifth lookup never returns; dropping the run mid-flight stands in
    // for the process dying.
    let crashing = Arc::new(ScriptedSource::default().hanging_at(5));
    let mut run = pipeline(&storage, &crashing, &checkpoint, 2);
    let outcome = tokio::time::timeout(Duration::from_secs(60), run.run(&teams, true)).await;
    assert!(outcome.is_err(), "run should still be blocked on team 5");
    drop(run);

    let saved = ProgressTracker::load(&checkpoint).unwrap().unwrap();
    assert_eq!(saved.last_processed_index, 3);
    assert_eq!(storage.qualification_count(), 4);

    let source = Arc::new(ScriptedSource::default());
    let report = pipeline(&storage, &source, &checkpoint, 2)
        .run(&teams, true)
        .await
        .unwrap();

    assert_eq!(source.calls(), vec![5]);
    assert_eq!(report.start_index, 4);
    assert_eq!(storage.qualification_count(), 5);
}

// The pipeline has no schedule; skipping a recent run happens in the job
// (see `test_recent_run_is_not_due`).
#[tokio::test(start_paused = true)]
async fn test_rerun_after_completion_reprocesses_without_changing_statuses() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("progress.json");
    let storage = storage_with(&[1, 2, 3]);
    let teams = ids(&[1, 2, 3]);
    let source = Arc::new(
        ScriptedSource::default()
            .with_status(1, QualificationStatus::World)
            .with_status(3, QualificationStatus::Regional),
    );

    pipeline(&storage, &source, &checkpoint, 2)
        .run(&teams, true)
        .await
        .unwrap();
    let first = storage.qualifications().unwrap();

    let report = pipeline(&storage, &source, &checkpoint, 2)
        .run(&teams, true)
        .await
        .unwrap();

    assert_eq!(report.start_index, 0);
    assert_eq!(storage.qualifications().unwrap(), first);
}

#[tokio::test(start_paused = true)]
async fn test_fresh_run_ignores_existing_checkpoint() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("progress.json");
    let storage = storage_with(&[1, 2]);
    let (tx, rx) = watch::channel(false);
    let stopping = Arc::new(ScriptedSource::default().stopping_at(1, tx));
    let _ = pipeline(&storage, &stopping, &checkpoint, 1)
        .with_shutdown(rx)
        .run(&ids(&[1, 2]), true)
        .await;
    assert!(checkpoint.exists());

    let source = Arc::new(ScriptedSource::default());
    let report = pipeline(&storage, &source, &checkpoint, 1)
        .run(&ids(&[1, 2]), false)
        .await
        .unwrap();

    assert_eq!(report.start_index, 0);
    assert_eq!(source.calls(), vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_corrupt_checkpoint_starts_over() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("progress.json");
    std::fs::write(&checkpoint, "{ this is not json").unwrap();

    let storage = storage_with(&[1, 2]);
    let source = Arc::new(ScriptedSource::default());
    let report = pipeline(&storage, &source, &checkpoint, 1)
        .run(&ids(&[1, 2]), true)
        .await
        .unwrap();

    assert_eq!(report.start_index, 0);
    assert_eq!(source.calls(), vec![1, 2]);
    assert!(!checkpoint.exists());
}

#[tokio::test(start_paused = true)]
async fn test_checkpoint_past_end_processes_nothing() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("progress.json");
    let mut stale = podium_core::Checkpoint::fresh(10);
    stale.last_processed_index = 9;
    std::fs::write(&checkpoint, serde_json::to_string(&stale).unwrap()).unwrap();

    let storage = storage_with(&[1, 2]);
    let source = Arc::new(ScriptedSource::default());
    let report = pipeline(&storage, &source, &checkpoint, 1)
        .run(&ids(&[1, 2]), true)
        .await
        .unwrap();

    assert_eq!(report.processed, 0);
    assert_eq!(report.start_index, 2);
    assert!(source.calls().is_empty());
    assert!(!checkpoint.exists());
}

// ============================================================================
// FAILURES
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_item_failure_is_skipped() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("progress.json");
    let storage = storage_with(&[1, 2, 3]);
    storage.fail_reads_for(TeamId(2));

    let source = Arc::new(ScriptedSource::default().with_status(3, QualificationStatus::World));
    let report = pipeline(&storage, &source, &checkpoint, 1)
        .run(&ids(&[1, 2, 3]), true)
        .await
        .unwrap();

    assert_eq!(report.processed, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(source.calls(), vec![1, 2, 3]);
    assert_eq!(status_of(&storage, 3), Some(QualificationStatus::World));
    assert_eq!(storage.qualification_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_commit_failure_is_fatal() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("progress.json");
    let storage = storage_with(&[1, 2, 3]);
    storage.set_fail_commits(true);

    let source = Arc::new(ScriptedSource::default());
    let err = pipeline(&storage, &source, &checkpoint, 1)
        .run(&ids(&[1, 2, 3]), true)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        IngestError::Storage(StorageError::TransactionFailed { .. })
    ));
    assert_eq!(source.calls(), vec![1]);
    let saved = ProgressTracker::load(&checkpoint).unwrap().unwrap();
    assert_eq!(saved.resume_index(), 0);
}

// ============================================================================
// PROPERTIES
// ============================================================================

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(future)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Interrupting anywhere and resuming visits every team exactly once
        /// across the two runs.
        #[test]
        fn prop_interrupt_and_resume_covers_every_team(
            total in 1usize..20,
            stop_seed in any::<usize>(),
            commit_interval in 1usize..6,
        ) {
            let stop = stop_seed % total;
            let raw: Vec<i64> = (1..=total as i64).collect();
            let teams = ids(&raw);
            let dir = TempDir::new().unwrap();
            let checkpoint = dir.path().join("progress.json");
            let storage = storage_with(&raw);

            let (tx, rx) = watch::channel(false);
            let first = Arc::new(ScriptedSource::default().stopping_at(raw[stop], tx));
            let outcome = block_on(
                pipeline(&storage, &first, &checkpoint, commit_interval)
                    .with_shutdown(rx)
                    .run(&teams, true),
            );

            let second = Arc::new(ScriptedSource::default());
            if stop + 1 < total {
                let interrupted = matches!(
                    outcome,
                    Err(IngestError::Interrupted { last_committed_index: Some(index) }) if index == stop
                );
                prop_assert!(interrupted);
                block_on(pipeline(&storage, &second, &checkpoint, commit_interval).run(&teams, true))
                    .unwrap();
            } else {
                // Stopping on the last team lets the run finish.
                prop_assert!(outcome.is_ok());
            }

            let mut visited = first.calls();
            visited.extend(second.calls());
            prop_assert_eq!(visited, raw);
            prop_assert_eq!(storage.qualification_count(), total);
            prop_assert!(!checkpoint.exists());
        }
    }
}
