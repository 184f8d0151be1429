//! Qualification status ordering and merge policies

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Advancement tier derived from a team's awards.
///
/// Ordering comes from [`QualificationStatus::rank`], not from the order the
/// variants are declared in: `None < Regional < World`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum QualificationStatus {
    /// No qualifying award found (or the lookup failed)
    #[default]
    None,
    /// Qualified for a regional/state championship
    Regional,
    /// Qualified for the world championship
    World,
}

/// Award qualification names recognised by [`QualificationStatus::from_award_qualification`].
/// Matching is case-insensitive on the trimmed name.
const AWARD_QUALIFICATIONS: &[(&str, QualificationStatus)] = &[
    ("world championship", QualificationStatus::World),
    ("world champion", QualificationStatus::World),
    ("vex robotics world championship", QualificationStatus::World),
    ("vex worlds", QualificationStatus::World),
    ("worlds", QualificationStatus::World),
    ("regional championship", QualificationStatus::Regional),
    ("regional champion", QualificationStatus::Regional),
    ("state championship", QualificationStatus::Regional),
    ("national championship", QualificationStatus::Regional),
    ("region championship", QualificationStatus::Regional),
];

impl QualificationStatus {
    /// All statuses in ascending rank order.
    pub const ALL: [QualificationStatus; 3] = [
        QualificationStatus::None,
        QualificationStatus::Regional,
        QualificationStatus::World,
    ];

    /// Explicit total order used for every comparison.
    pub fn rank(self) -> u8 {
        match self {
            QualificationStatus::None => 0,
            QualificationStatus::Regional => 1,
            QualificationStatus::World => 2,
        }
    }

    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            QualificationStatus::None => "NONE",
            QualificationStatus::Regional => "REGIONAL",
            QualificationStatus::World => "WORLD",
        }
    }

    /// Parse from database string representation (case-insensitive, strict).
    pub fn from_db_str(s: &str) -> Result<Self, StatusParseError> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(QualificationStatus::None),
            "regional" => Ok(QualificationStatus::Regional),
            "world" => Ok(QualificationStatus::World),
            _ => Err(StatusParseError(s.to_string())),
        }
    }

    /// Parse an administrative label. Anything unrecognised is `None`.
    pub fn from_admin_label(s: &str) -> Self {
        Self::from_db_str(s).unwrap_or(QualificationStatus::None)
    }

    /// Map one entry of an award's `qualifications` list to a status.
    ///
    /// Unknown names map to `None`.
    pub fn from_award_qualification(name: &str) -> Self {
        let needle = name.trim().to_lowercase();
        AWARD_QUALIFICATIONS
            .iter()
            .find(|(known, _)| *known == needle)
            .map(|(_, status)| *status)
            .unwrap_or(QualificationStatus::None)
    }

    /// Highest status found in a list of award qualification names.
    pub fn highest_of<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .map(Self::from_award_qualification)
            .max()
            .unwrap_or(QualificationStatus::None)
    }
}

impl Ord for QualificationStatus {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for QualificationStatus {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for QualificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for QualificationStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid qualification status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusParseError(pub String);

impl fmt::Display for StatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid qualification status: {}", self.0)
    }
}

impl std::error::Error for StatusParseError {}

/// How a new status is merged with the stored one.
///
/// Both policies are in use; callers pick one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpsertPolicy {
    /// Replace only if the incoming status ranks strictly higher. Never downgrades.
    Monotonic,
    /// Always overwrite. Used for administrative corrections.
    Unconditional,
}

impl UpsertPolicy {
    /// Resolve the status to store given the current row (if any).
    pub fn merge(
        self,
        current: Option<QualificationStatus>,
        incoming: QualificationStatus,
    ) -> QualificationStatus {
        match (self, current) {
            (_, None) => incoming,
            (UpsertPolicy::Unconditional, Some(_)) => incoming,
            (UpsertPolicy::Monotonic, Some(existing)) => existing.max(incoming),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
