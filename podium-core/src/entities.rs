//! Persisted entities and query shapes

use crate::{QualificationStatus, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// IDENTITY
// ============================================================================

/// Team identifier. The remote API's id doubles as the local primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(pub i64);

impl TeamId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for TeamId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// TEAM
// ============================================================================

/// Grade-level category as reported by the skills feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Grade {
    MiddleSchool,
    HighSchool,
    College,
    Other(String),
}

impl Grade {
    /// Label used by the remote API (and in query strings).
    pub fn as_api_str(&self) -> &str {
        match self {
            Grade::MiddleSchool => "Middle School",
            Grade::HighSchool => "High School",
            Grade::College => "College",
            Grade::Other(label) => label,
        }
    }
}

impl From<String> for Grade {
    fn from(label: String) -> Self {
        match label.trim().to_lowercase().as_str() {
            "middle school" => Grade::MiddleSchool,
            "high school" => Grade::HighSchool,
            "college" => Grade::College,
            _ => Grade::Other(label),
        }
    }
}

impl From<&str> for Grade {
    fn from(label: &str) -> Self {
        Grade::from(label.to_string())
    }
}

impl From<Grade> for String {
    fn from(grade: Grade) -> Self {
        grade.as_api_str().to_string()
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_api_str())
    }
}

/// A competing team plus its latest skills metrics.
///
/// The four metrics are refreshed wholesale on every skills sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    /// Human-facing team code, e.g. "2054V". Unique.
    pub number: String,
    pub organization: String,
    pub country: String,
    pub region: String,
    pub grade: Grade,
    pub world_rank: u32,
    pub score: u32,
    pub programming: u32,
    pub driver: u32,
}

impl Team {
    /// Copy the skills metrics from a fresher record, keeping descriptive fields.
    pub fn refresh_metrics(&mut self, fresh: &Team) {
        self.world_rank = fresh.world_rank;
        self.score = fresh.score;
        self.programming = fresh.programming;
        self.driver = fresh.driver;
    }
}

// ============================================================================
// QUALIFICATION / METADATA
// ============================================================================

/// One row per team holding its derived status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Qualification {
    pub team_id: TeamId,
    pub status: QualificationStatus,
}

impl Qualification {
    pub fn new(team_id: TeamId, status: QualificationStatus) -> Self {
        Self { team_id, status }
    }
}

/// Singleton bookkeeping row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// When the last full ingestion run finished.
    pub last_slow_update: Option<Timestamp>,
}

// ============================================================================
// CHECKPOINT
// ============================================================================

fn fresh_index() -> i64 {
    -1
}

/// Durable record of batch progress. Presence on disk means the previous run
/// did not finish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Position in the team list traversal; -1 before the first item.
    #[serde(default = "fresh_index")]
    pub last_processed_index: i64,
    #[serde(default)]
    pub last_processed_team_id: Option<TeamId>,
    #[serde(default)]
    pub processed_count: u64,
    #[serde(default)]
    pub total_teams: u64,
    #[serde(default = "Utc::now")]
    pub timestamp: Timestamp,
}

impl Checkpoint {
    /// Checkpoint describing a run that has not processed anything yet.
    pub fn fresh(total_teams: u64) -> Self {
        Self {
            last_processed_index: fresh_index(),
            last_processed_team_id: None,
            processed_count: 0,
            total_teams,
            timestamp: Utc::now(),
        }
    }

    /// Index the next run should start from.
    pub fn resume_index(&self) -> usize {
        usize::try_from(self.last_processed_index.saturating_add(1)).unwrap_or(0)
    }
}

// ============================================================================
// QUERY SHAPES
// ============================================================================

/// Filter applied when listing teams for a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TeamFilter {
    pub region: Option<String>,
    pub grade: Option<Grade>,
}

impl TeamFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_grade(mut self, grade: Grade) -> Self {
        self.grade = Some(grade);
        self
    }

    pub fn matches(&self, team: &Team) -> bool {
        let region_ok = self
            .region
            .as_deref()
            .map_or(true, |region| team.region == region);
        let grade_ok = self.grade.as_ref().map_or(true, |grade| &team.grade == grade);
        region_ok && grade_ok
    }
}

/// Leaderboard read contract used by the downstream read API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaderboardQuery {
    pub filter: TeamFilter,
    /// Teams whose stored status is in this list are left out.
    pub exclude_statuses: Vec<QualificationStatus>,
    pub limit: Option<usize>,
}

/// One leaderboard line: the team and its stored status (NONE when no row).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub team: Team,
    pub status: QualificationStatus,
}

/// Joined team/qualification row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamQualificationRow {
    pub number: String,
    pub organization: String,
    pub status: QualificationStatus,
}
