//! Runtime configuration
//!
//! Configuration comes from a TOML file when one is given, otherwise from
//! `PODIUM_*` environment variables. Either way the API token may be supplied
//! through `PODIUM_API_TOKEN` or `ROBOTEVENTS_AUTH_TOKEN` so it never has to be
//! written to disk.

use crate::{ConfigError, Grade, TeamFilter};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://www.robotevents.com/api/v2";
pub const DEFAULT_SEASONS_BASE_URL: &str = "https://www.robotevents.com/api";
pub const DEFAULT_SEASON: u32 = 197;
pub const DEFAULT_COMMIT_INTERVAL: usize = 10;
pub const DEFAULT_REFRESH_THRESHOLD_SECS: u64 = 7 * 24 * 60 * 60;

const TOKEN_ENV_VARS: [&str; 2] = ["PODIUM_API_TOKEN", "ROBOTEVENTS_AUTH_TOKEN"];

/// Retry policy for remote calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RetryConfig {
    /// Total attempts per call, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds
    pub base_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 2_000,
            max_delay_ms: 60_000,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Durable store location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StorageConfig {
    /// Directory holding the LMDB environment.
    pub path: PathBuf,
    pub map_size_mb: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/podium"),
            map_size_mb: 256,
        }
    }
}

/// Log sink settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LogConfig {
    /// Append-only log file; console output mirrors it.
    pub path: PathBuf,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Emit JSON lines instead of plain text.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("qualification_progress.log"),
            filter: "podium=info,info".to_string(),
            json: false,
        }
    }
}

/// Master configuration for the ingestion job.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct IngestConfig {
    pub api_token: String,
    pub api_base_url: String,
    /// Host serving the unauthenticated season skills feed.
    pub seasons_base_url: String,
    pub season: u32,
    pub request_timeout_ms: u64,
    pub retry: RetryConfig,
    /// Items between durable commits of the qualification run.
    pub commit_interval: usize,
    pub checkpoint_path: PathBuf,
    pub team_filter: TeamFilter,
    /// Event whose registered teams are treated as already WORLD-qualified.
    pub worlds_event_id: Option<i64>,
    pub refresh_threshold_secs: u64,
    pub skills_team_limit: usize,
    pub skills_commit_interval: usize,
    pub storage: StorageConfig,
    pub log: LogConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            seasons_base_url: DEFAULT_SEASONS_BASE_URL.to_string(),
            season: DEFAULT_SEASON,
            request_timeout_ms: 30_000,
            retry: RetryConfig::default(),
            commit_interval: DEFAULT_COMMIT_INTERVAL,
            checkpoint_path: PathBuf::from("qualification_progress.json"),
            team_filter: TeamFilter::default(),
            worlds_event_id: None,
            refresh_threshold_secs: DEFAULT_REFRESH_THRESHOLD_SECS,
            skills_team_limit: 10_000,
            skills_commit_interval: 100,
            storage: StorageConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfig")
            .field("api_token", &"[REDACTED]")
            .field("api_base_url", &self.api_base_url)
            .field("seasons_base_url", &self.seasons_base_url)
            .field("season", &self.season)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("retry", &self.retry)
            .field("commit_interval", &self.commit_interval)
            .field("checkpoint_path", &self.checkpoint_path)
            .field("team_filter", &self.team_filter)
            .field("worlds_event_id", &self.worlds_event_id)
            .field("refresh_threshold_secs", &self.refresh_threshold_secs)
            .field("skills_team_limit", &self.skills_team_limit)
            .field("skills_commit_interval", &self.skills_commit_interval)
            .field("storage", &self.storage)
            .field("log", &self.log)
            .finish()
    }
}

impl IngestConfig {
    /// Load from a TOML file, then fill the token from the environment if the
    /// file leaves it empty.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let mut config = Self::from_toml_str(&contents)?;
        if config.api_token.trim().is_empty() {
            if let Some(token) = token_from_env() {
                config.api_token = token;
            }
        }
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })
    }

    /// Create IngestConfig from environment variables.
    ///
    /// Environment variables:
    /// - `PODIUM_API_TOKEN` / `ROBOTEVENTS_AUTH_TOKEN`: bearer token (required)
    /// - `PODIUM_API_BASE_URL`, `PODIUM_SEASONS_BASE_URL`, `PODIUM_SEASON`
    /// - `PODIUM_REQUEST_TIMEOUT_MS`
    /// - `PODIUM_MAX_ATTEMPTS`, `PODIUM_BASE_DELAY_MS`, `PODIUM_MAX_DELAY_MS`
    /// - `PODIUM_COMMIT_INTERVAL`, `PODIUM_CHECKPOINT_PATH`
    /// - `PODIUM_TEAM_REGION`, `PODIUM_TEAM_GRADE`, `PODIUM_WORLDS_EVENT_ID`
    /// - `PODIUM_REFRESH_THRESHOLD_SECS`
    /// - `PODIUM_SKILLS_TEAM_LIMIT`, `PODIUM_SKILLS_COMMIT_INTERVAL`
    /// - `PODIUM_STORAGE_PATH`, `PODIUM_STORAGE_MAP_SIZE_MB`
    /// - `PODIUM_LOG_PATH`, `PODIUM_LOG_FILTER`, `PODIUM_LOG_JSON`
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            api_token: token_from_env().unwrap_or_default(),
            api_base_url: env_or("PODIUM_API_BASE_URL", defaults.api_base_url),
            seasons_base_url: env_or("PODIUM_SEASONS_BASE_URL", defaults.seasons_base_url),
            season: env_parse("PODIUM_SEASON", defaults.season),
            request_timeout_ms: env_parse("PODIUM_REQUEST_TIMEOUT_MS", defaults.request_timeout_ms),
            retry: RetryConfig {
                max_attempts: env_parse("PODIUM_MAX_ATTEMPTS", defaults.retry.max_attempts),
                base_delay_ms: env_parse("PODIUM_BASE_DELAY_MS", defaults.retry.base_delay_ms),
                max_delay_ms: env_parse("PODIUM_MAX_DELAY_MS", defaults.retry.max_delay_ms),
            },
            commit_interval: env_parse("PODIUM_COMMIT_INTERVAL", defaults.commit_interval),
            checkpoint_path: std::env::var("PODIUM_CHECKPOINT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.checkpoint_path),
            team_filter: TeamFilter {
                region: std::env::var("PODIUM_TEAM_REGION").ok(),
                grade: std::env::var("PODIUM_TEAM_GRADE").ok().map(Grade::from),
            },
            worlds_event_id: std::env::var("PODIUM_WORLDS_EVENT_ID")
                .ok()
                .and_then(|s| s.parse().ok()),
            refresh_threshold_secs: env_parse(
                "PODIUM_REFRESH_THRESHOLD_SECS",
                defaults.refresh_threshold_secs,
            ),
            skills_team_limit: env_parse("PODIUM_SKILLS_TEAM_LIMIT", defaults.skills_team_limit),
            skills_commit_interval: env_parse(
                "PODIUM_SKILLS_COMMIT_INTERVAL",
                defaults.skills_commit_interval,
            ),
            storage: StorageConfig {
                path: std::env::var("PODIUM_STORAGE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.path),
                map_size_mb: env_parse("PODIUM_STORAGE_MAP_SIZE_MB", defaults.storage.map_size_mb),
            },
            log: LogConfig {
                path: std::env::var("PODIUM_LOG_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.log.path),
                filter: env_or("PODIUM_LOG_FILTER", defaults.log.filter),
                json: std::env::var("PODIUM_LOG_JSON")
                    .map(|s| s == "true" || s == "1")
                    .unwrap_or(defaults.log.json),
            },
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn refresh_threshold(&self) -> Duration {
        Duration::from_secs(self.refresh_threshold_secs)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_token.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "api_token".to_string(),
            });
        }

        for (field, url) in [
            ("api_base_url", &self.api_base_url),
            ("seasons_base_url", &self.seasons_base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: url.clone(),
                    reason: "must be an http(s) URL".to_string(),
                });
            }
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_attempts".to_string(),
                value: "0".to_string(),
                reason: "at least one attempt is required".to_string(),
            });
        }

        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::InvalidValue {
                field: "retry.base_delay_ms".to_string(),
                value: self.retry.base_delay_ms.to_string(),
                reason: format!(
                    "must not exceed retry.max_delay_ms ({})",
                    self.retry.max_delay_ms
                ),
            });
        }

        for (field, value) in [
            ("commit_interval", self.commit_interval),
            ("skills_commit_interval", self.skills_commit_interval),
            ("storage.map_size_mb", self.storage.map_size_mb),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: "0".to_string(),
                    reason: "must be greater than 0".to_string(),
                });
            }
        }

        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms".to_string(),
                value: "0".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

fn token_from_env() -> Option<String> {
    TOKEN_ENV_VARS
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.trim().is_empty())
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

// =============================================================================
// TESTS
// =============================================================================
