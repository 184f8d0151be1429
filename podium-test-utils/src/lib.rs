//! PODIUM Test Utilities
//!
//! Shared test infrastructure for the PODIUM workspace:
//! - Fixtures for teams and configuration
//! - RobotEvents JSON bodies and the URLs the client requests them from
//! - Proptest generators for statuses and team ids

pub use podium_remote::{MockReply, MockTransport};
pub use podium_storage::MockStorage;

pub use podium_core::{
    Grade, IngestConfig, Qualification, QualificationStatus, RetryConfig, Team, TeamFilter,
    TeamId,
};

use serde_json::{json, Value};
use std::path::Path;

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    use super::*;

    pub const TEST_API_BASE: &str = "http://robotevents.test/api/v2";
    pub const TEST_SEASONS_BASE: &str = "http://robotevents.test/api";
    pub const TEST_SEASON: u32 = 190;
    pub const TEST_TOKEN: &str = "test-token";

    /// A high school team in Texas with empty metrics.
    pub fn team(id: i64, number: &str) -> Team {
        Team {
            id: TeamId(id),
            number: number.to_string(),
            organization: format!("{} Robotics", number),
            country: "United States".to_string(),
            region: "Texas".to_string(),
            grade: Grade::HighSchool,
            world_rank: 0,
            score: 0,
            programming: 0,
            driver: 0,
        }
    }

    pub fn team_in(id: i64, number: &str, region: &str, grade: Grade) -> Team {
        Team {
            region: region.to_string(),
            grade,
            ..team(id, number)
        }
    }

    pub fn ranked_team(id: i64, number: &str, world_rank: u32) -> Team {
        Team {
            world_rank,
            score: 1000u32.saturating_sub(world_rank),
            ..team(id, number)
        }
    }

    /// Configuration pointing at the mock hosts, with millisecond backoff so
    /// retries stay cheap under a paused clock.
    pub fn test_config(checkpoint_path: &Path) -> IngestConfig {
        IngestConfig {
            api_token: TEST_TOKEN.to_string(),
            api_base_url: TEST_API_BASE.to_string(),
            seasons_base_url: TEST_SEASONS_BASE.to_string(),
            season: TEST_SEASON,
            retry: RetryConfig {
                max_attempts: 2,
                base_delay_ms: 1,
                max_delay_ms: 4,
            },
            commit_interval: 2,
            checkpoint_path: checkpoint_path.to_path_buf(),
            skills_commit_interval: 2,
            ..IngestConfig::default()
        }
    }
}

// ============================================================================
// REMOTE BODIES AND URLS
// ============================================================================

pub mod remote {
    use super::fixtures::{TEST_API_BASE, TEST_SEASON, TEST_SEASONS_BASE};
    use super::*;

    /// `{ meta, data }` envelope for page `current` of `last`.
    pub fn page(data: Vec<Value>, current: u32, last: u32) -> String {
        json!({
            "meta": { "current_page": current, "last_page": last },
            "data": data,
        })
        .to_string()
    }

    /// Single-page envelope.
    pub fn single_page(data: Vec<Value>) -> String {
        page(data, 1, 1)
    }

    pub fn award(title: &str, qualifications: &[&str], winners: &[i64]) -> Value {
        let qualifications = if qualifications.is_empty() {
            Value::Null
        } else {
            json!(qualifications)
        };
        let winners: Vec<Value> = winners
            .iter()
            .map(|id| json!({ "team": { "id": id, "name": format!("T{}", id) } }))
            .collect();
        json!({
            "title": title,
            "qualifications": qualifications,
            "teamWinners": winners,
        })
    }

    pub fn event(id: i64, awards_finalized: bool) -> Value {
        json!({
            "id": id,
            "name": format!("Signature Event {}", id),
            "awards_finalized": awards_finalized,
        })
    }

    pub fn team_ref(id: i64) -> Value {
        json!({ "id": id, "name": format!("T{}", id) })
    }

    pub fn skills_entry(id: i64, number: &str, grade: &str, rank: u32, score: u32) -> Value {
        json!({
            "team": {
                "id": id,
                "team": number,
                "organization": format!("{} Robotics", number),
                "country": "United States",
                "eventRegion": "Texas",
                "gradeLevel": grade,
            },
            "rank": rank,
            "scores": {
                "score": score,
                "programming": score / 2,
                "driver": score - score / 2,
            },
        })
    }

    /// The skills feed is a bare list, not an envelope.
    pub fn skills_body(entries: Vec<Value>) -> String {
        Value::Array(entries).to_string()
    }

    pub fn team_awards_url(team_id: i64) -> String {
        format!(
            "{}/teams/{}/awards?season%5B%5D={}",
            TEST_API_BASE, team_id, TEST_SEASON
        )
    }

    pub fn signature_events_url() -> String {
        format!(
            "{}/events?season%5B%5D={}&level%5B%5D=Signature&myEvents=false",
            TEST_API_BASE, TEST_SEASON
        )
    }

    pub fn event_awards_url(event_id: i64) -> String {
        format!("{}/events/{}/awards", TEST_API_BASE, event_id)
    }

    pub fn event_teams_url(event_id: i64) -> String {
        format!("{}/events/{}/teams", TEST_API_BASE, event_id)
    }

    pub fn skills_url(grade: &Grade) -> String {
        format!(
            "{}/seasons/{}/skills?post_season=0&grade_level={}",
            TEST_SEASONS_BASE,
            TEST_SEASON,
            grade.as_api_str().replace(' ', "%20")
        )
    }

    /// Script a team's award list with one award carrying `qualifications`.
    pub fn respond_team_awards(mock: &MockTransport, team_id: i64, qualifications: &[&str]) {
        mock.respond_json(
            team_awards_url(team_id),
            single_page(vec![award("Excellence Award", qualifications, &[team_id])]),
        );
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use proptest::prelude::*;

    pub fn arb_status() -> impl Strategy<Value = QualificationStatus> {
        prop_oneof![
            Just(QualificationStatus::None),
            Just(QualificationStatus::Regional),
            Just(QualificationStatus::World),
        ]
    }

    pub fn arb_team_id() -> impl Strategy<Value = TeamId> {
        (1i64..200_000).prop_map(TeamId)
    }

    /// Event names as they appear in award qualification lists, including
    /// ones that qualify for nothing.
    pub fn arb_qualification_name() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("World Championship".to_string()),
            Just("VEX Robotics World Championship".to_string()),
            Just("Texas Region State Championship".to_string()),
            Just("Regional Championship".to_string()),
            Just("League Finals".to_string()),
            "[a-zA-Z ]{0,24}",
        ]
    }

    pub fn arb_team_number() -> impl Strategy<Value = String> {
        "[0-9]{1,5}[A-Z]?"
    }

    pub fn arb_team() -> impl Strategy<Value = Team> {
        (arb_team_id(), arb_team_number(), 0u32..5000).prop_map(|(id, number, rank)| Team {
            world_rank: rank,
            ..fixtures::team(id.get(), &number)
        })
    }
}
