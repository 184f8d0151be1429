//! PODIUM Ingest - Resumable Qualification Ingestion
//!
//! The job that keeps stored qualification statuses current:
//!
//! - [`skills`]: pulls the season skills leaderboard and creates or refreshes teams
//! - [`signature`]: grants WORLD to headline award winners at Signature events
//! - [`pipeline`]: walks every stored team, resolves its status from its awards,
//!   and merges it with the monotonic policy, checkpointing as it goes
//! - [`job`]: runs the three in order when a refresh is due
//!
//! An interrupted run leaves a checkpoint behind and picks up after the last
//! committed team on the next invocation.

pub mod cli;
pub mod job;
pub mod pipeline;
pub mod progress;
pub mod resolver;
pub mod schedule;
pub mod signature;
pub mod skills;
pub mod telemetry;

pub use cli::{Cli, CliError, Command};
pub use job::{IngestJob, JobOutcome, JobReport, JobStatus, RunOptions};
pub use pipeline::{IngestionPipeline, RunReport, FAILED_LABEL};
pub use progress::{ProgressTracker, TrackerState};
pub use resolver::{status_from_awards, QualificationResolver, QualificationSource};
pub use schedule::RefreshSchedule;
pub use signature::{apply_qualifications, collect_signature_qualifications};
pub use skills::{sync_skills, SkillsLimits, SkillsSyncReport};
pub use telemetry::init_logging;
