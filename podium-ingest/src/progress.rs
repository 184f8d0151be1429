//! Durable progress tracking for the qualification run.
//!
//! The tracker owns the checkpoint file. Its presence on disk means the last
//! run did not finish; [`ProgressTracker::initialize`] reads it back and
//! returns the position to resume from. Saves are atomic (temp file, fsync,
//! rename) so a crash mid-save leaves either the old or the new checkpoint.

use chrono::Utc;
use podium_core::{Checkpoint, CheckpointError, IngestConfig, TeamId};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Progress lines are logged every this many items.
const LOG_EVERY: u64 = 10;

/// Lifecycle of one tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    /// Not initialized yet.
    Fresh,
    /// Initialized from an existing checkpoint; nothing processed this run.
    Resuming,
    Running,
    Completed,
}

/// Tracks the position of a long-running batch and persists it on demand.
#[derive(Debug)]
pub struct ProgressTracker {
    path: PathBuf,
    state: TrackerState,
    checkpoint: Checkpoint,
    started: Option<Instant>,
}

impl ProgressTracker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: TrackerState::Fresh,
            checkpoint: Checkpoint::fresh(0),
            started: None,
        }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(&config.checkpoint_path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// Snapshot of the in-memory checkpoint.
    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Read the checkpoint at `path`, if any.
    pub fn load(path: &Path) -> Result<Option<Checkpoint>, CheckpointError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CheckpointError::Io {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })
            }
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| CheckpointError::Corrupt {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
    }

    /// Prepare for a run over `total` items and return the index to start at.
    ///
    /// With `resume` and a readable checkpoint this is the position after the
    /// last saved item. A corrupt checkpoint is logged and the run starts
    /// from 0. Otherwise a fresh checkpoint replaces whatever was on disk, so
    /// a run in progress is visible before its first commit.
    pub fn initialize(&mut self, total: usize, resume: bool) -> usize {
        self.started = Some(Instant::now());
        let total_teams = total as u64;

        if resume {
            match Self::load(&self.path) {
                Ok(Some(mut checkpoint)) => {
                    let start = checkpoint.resume_index();
                    checkpoint.total_teams = total_teams;
                    tracing::info!(
                        start_index = start,
                        team_id = ?checkpoint.last_processed_team_id,
                        processed = checkpoint.processed_count,
                        total,
                        "RESUMING from index {} (team_id: {:?}). Already processed: {}/{} teams",
                        start,
                        checkpoint.last_processed_team_id.map(TeamId::get),
                        checkpoint.processed_count,
                        total
                    );
                    self.checkpoint = checkpoint;
                    self.state = TrackerState::Resuming;
                    return start;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to load progress file, starting fresh");
                }
            }
        }

        tracing::info!(total, "STARTING new qualification run for {} teams", total);
        self.clear();
        self.checkpoint = Checkpoint::fresh(total_teams);
        self.state = TrackerState::Running;
        self.persist();
        0
    }

    /// Record that the item at `index` was handled.
    ///
    /// Counters always advance. A progress line is logged every tenth item
    /// and on forced updates; the checkpoint is written only when forced.
    pub fn update_progress(
        &mut self,
        index: usize,
        team_id: TeamId,
        status_label: &str,
        force_save: bool,
    ) {
        self.set_position(Some((index, team_id)));
        self.state = TrackerState::Running;

        if self.checkpoint.processed_count % LOG_EVERY == 0 || force_save {
            self.log_progress(team_id, status_label);
        }
        if force_save {
            self.persist();
        }
    }

    /// Move the saved position back to `last` (or to before the first item)
    /// and write it out. Used when a run stops before its buffered writes are
    /// known to be durable.
    pub fn save_committed(&mut self, last: Option<(usize, TeamId)>) {
        self.set_position(last);
        self.persist();
    }

    /// Write the current checkpoint. Failures are logged, not returned; the
    /// run carries on and a later save may succeed.
    pub fn persist(&mut self) {
        self.checkpoint.timestamp = Utc::now();
        if let Err(e) = write_atomic(&self.path, &self.checkpoint) {
            tracing::error!(error = %e, "ERROR: Failed to save progress file");
        }
    }

    /// Log the summary and delete the checkpoint.
    pub fn complete(&mut self) {
        let elapsed = self.elapsed_secs();
        tracing::info!(
            processed = self.checkpoint.processed_count,
            elapsed_secs = elapsed,
            "COMPLETED qualification run for {} teams in {:.0}s ({:.1}m)",
            self.checkpoint.processed_count,
            elapsed,
            elapsed / 60.0
        );
        self.clear();
        self.state = TrackerState::Completed;
    }

    fn set_position(&mut self, last: Option<(usize, TeamId)>) {
        match last {
            Some((index, team_id)) => {
                self.checkpoint.last_processed_index = index as i64;
                self.checkpoint.last_processed_team_id = Some(team_id);
                self.checkpoint.processed_count = index as u64 + 1;
            }
            None => {
                self.checkpoint.last_processed_index = -1;
                self.checkpoint.last_processed_team_id = None;
                self.checkpoint.processed_count = 0;
            }
        }
    }

    fn log_progress(&self, team_id: TeamId, status_label: &str) {
        let processed = self.checkpoint.processed_count;
        let total = self.checkpoint.total_teams;
        let elapsed = self.elapsed_secs();
        let avg = if processed > 0 {
            elapsed / processed as f64
        } else {
            0.0
        };
        let remaining = avg * total.saturating_sub(processed) as f64;
        let percent = if total > 0 {
            processed as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        tracing::info!(
            processed,
            total,
            team_id = %team_id,
            status = status_label,
            "Progress: {}/{} ({:.1}%) | Current team_id: {} | Status: {} | Elapsed: {:.0}s | Avg: {:.2}s/team | Est. remaining: {:.0}s ({:.1}m)",
            processed,
            total,
            percent,
            team_id,
            status_label,
            elapsed,
            avg,
            remaining,
            remaining / 60.0
        );
    }

    fn elapsed_secs(&self) -> f64 {
        self.started
            .map(|started| started.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn clear(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "Failed to delete progress file");
            }
        }
    }
}

fn write_atomic(path: &Path, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
    let io_err = |e: std::io::Error| CheckpointError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let contents =
        serde_json::to_vec_pretty(checkpoint).map_err(|e| CheckpointError::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let mut file = fs::File::create(&tmp).map_err(io_err)?;
    file.write_all(&contents).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    drop(file);
    fs::rename(&tmp, path).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tracker(dir: &TempDir) -> ProgressTracker {
        ProgressTracker::new(dir.path().join("qualification_progress.json"))
    }

    #[test]
    fn test_fresh_start_returns_zero() {
        let dir = TempDir::new().unwrap();
        let mut t = tracker(&dir);
        assert_eq!(t.state(), TrackerState::Fresh);
        assert_eq!(t.initialize(5, true), 0);
        assert_eq!(t.state(), TrackerState::Running);

        let saved = ProgressTracker::load(t.path()).unwrap().unwrap();
        assert_eq!(saved.last_processed_index, -1);
        assert_eq!(saved.processed_count, 0);
        assert_eq!(saved.total_teams, 5);
    }

    #[test]
    fn test_unforced_updates_do_not_touch_disk() {
        let dir = TempDir::new().unwrap();
        let mut t = tracker(&dir);
        t.initialize(20, true);
        for i in 0..15 {
            t.update_progress(i, TeamId(i as i64), "NONE", false);
        }
        let saved = ProgressTracker::load(t.path()).unwrap().unwrap();
        assert_eq!(saved.resume_index(), 0);
        assert_eq!(t.checkpoint().processed_count, 15);
    }

    #[test]
    fn test_forced_save_then_resume() {
        let dir = TempDir::new().unwrap();
        let mut first = tracker(&dir);
        first.initialize(10, true);
        first.update_progress(3, TeamId(44), "WORLD", true);

        let saved = ProgressTracker::load(first.path()).unwrap().unwrap();
        assert_eq!(saved.last_processed_index, 3);
        assert_eq!(saved.last_processed_team_id, Some(TeamId(44)));
        assert_eq!(saved.processed_count, 4);
        assert_eq!(saved.total_teams, 10);

        let mut second = tracker(&dir);
        assert_eq!(second.initialize(10, true), 4);
        assert_eq!(second.state(), TrackerState::Resuming);
    }

    #[test]
    fn test_no_resume_replaces_stale_checkpoint() {
        let dir = TempDir::new().unwrap();
        let mut first = tracker(&dir);
        first.initialize(10, true);
        first.update_progress(6, TeamId(7), "NONE", true);

        let mut second = tracker(&dir);
        assert_eq!(second.initialize(10, false), 0);
        let saved = ProgressTracker::load(second.path()).unwrap().unwrap();
        assert_eq!(saved.resume_index(), 0);
        assert_eq!(saved.last_processed_team_id, None);
    }

    #[test]
    fn test_corrupt_checkpoint_replaced_by_fresh_one() {
        let dir = TempDir::new().unwrap();
        let mut t = tracker(&dir);
        fs::write(t.path(), "{ not json").unwrap();

        assert!(matches!(
            ProgressTracker::load(t.path()),
            Err(CheckpointError::Corrupt { .. })
        ));
        assert_eq!(t.initialize(10, true), 0);
        let saved = ProgressTracker::load(t.path()).unwrap().unwrap();
        assert_eq!(saved.resume_index(), 0);
        assert_eq!(saved.total_teams, 10);
    }

    #[test]
    fn test_complete_removes_checkpoint() {
        let dir = TempDir::new().unwrap();
        let mut t = tracker(&dir);
        t.initialize(2, true);
        t.update_progress(1, TeamId(2), "NONE", true);
        assert!(t.path().exists());
        t.complete();
        assert!(!t.path().exists());
        assert_eq!(t.state(), TrackerState::Completed);
    }

    #[test]
    fn test_save_committed_rewinds_position() {
        let dir = TempDir::new().unwrap();
        let mut t = tracker(&dir);
        t.initialize(10, true);
        t.update_progress(8, TeamId(9), "NONE", false);
        t.save_committed(Some((4, TeamId(5))));
        let saved = ProgressTracker::load(t.path()).unwrap().unwrap();
        assert_eq!(saved.resume_index(), 5);

        t.save_committed(None);
        let saved = ProgressTracker::load(t.path()).unwrap().unwrap();
        assert_eq!(saved.resume_index(), 0);
    }

    #[test]
    fn test_save_failure_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        // The checkpoint path is a directory, so the final rename fails.
        let target = dir.path().join("occupied");
        fs::create_dir_all(target.join("child")).unwrap();
        let mut t = ProgressTracker::new(&target);
        t.initialize(3, false);
        t.update_progress(0, TeamId(1), "NONE", true);
        assert_eq!(t.checkpoint().processed_count, 1);
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let dir = TempDir::new().unwrap();
        let mut t = tracker(&dir);
        t.initialize(3, true);
        t.update_progress(0, TeamId(1), "NONE", true);
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["qualification_progress.json".to_string()]);
    }
}
