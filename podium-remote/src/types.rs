//! RobotEvents response schemas
//!
//! Only the fields the ingestion job reads are modelled. Required fields are
//! left without `#[serde(default)]` so a payload missing them fails to decode.

use podium_core::{Grade, Team, TeamId};
use serde::Deserialize;

// ============================================================================
// PAGINATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub current_page: Option<u32>,
    pub last_page: u32,
}

/// Paginated list envelope: `{ meta: {...}, data: [...] }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Paged<T> {
    #[serde(default)]
    pub meta: Option<PageMeta>,
    pub data: Vec<T>,
}

impl<T> Paged<T> {
    /// Last page number, 1 when the envelope carries no pagination metadata.
    pub fn last_page(&self) -> u32 {
        self.meta.as_ref().map_or(1, |meta| meta.last_page.max(1))
    }
}

// ============================================================================
// AWARDS / EVENTS
// ============================================================================

/// `{ id, name }` reference to another resource.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdRef {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TeamWinner {
    pub team: IdRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Award {
    #[serde(default)]
    pub title: String,
    /// Event names this award qualifies for; the API sends `null` or omits it
    /// for non-qualifying awards.
    #[serde(default)]
    pub qualifications: Option<Vec<String>>,
    #[serde(default, rename = "teamWinners")]
    pub team_winners: Vec<TeamWinner>,
}

impl Award {
    pub fn qualification_names(&self) -> impl Iterator<Item = &str> {
        self.qualifications
            .iter()
            .flatten()
            .map(String::as_str)
    }

    pub fn title_contains_any(&self, needles: &[&str]) -> bool {
        needles.iter().any(|needle| self.title.contains(needle))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventSummary {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub awards_finalized: bool,
}

// ============================================================================
// SKILLS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SkillsTeam {
    pub id: i64,
    /// Team number, e.g. "2054V".
    pub team: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub country: String,
    #[serde(default, rename = "eventRegion")]
    pub event_region: Option<String>,
    #[serde(rename = "gradeLevel")]
    pub grade_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SkillsScores {
    pub score: u32,
    pub programming: u32,
    pub driver: u32,
}

/// One line of the season skills leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SkillsEntry {
    pub team: SkillsTeam,
    pub rank: u32,
    pub scores: SkillsScores,
}

impl SkillsEntry {
    pub fn team_id(&self) -> TeamId {
        TeamId(self.team.id)
    }

    /// Full team record. An empty or missing region falls back to the country.
    pub fn to_team(&self) -> Team {
        let region = self
            .team
            .event_region
            .as_deref()
            .map(str::trim)
            .filter(|region| !region.is_empty())
            .unwrap_or(&self.team.country)
            .to_string();

        Team {
            id: self.team_id(),
            number: self.team.team.clone(),
            organization: self.team.organization.clone(),
            country: self.team.country.clone(),
            region,
            grade: Grade::from(self.team.grade_level.as_str()),
            world_rank: self.rank,
            score: self.scores.score,
            programming: self.scores.programming,
            driver: self.scores.driver,
        }
    }
}
