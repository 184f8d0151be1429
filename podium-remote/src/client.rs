//! RobotEvents client with retry and backoff

use crate::backoff::Backoff;
use crate::transport::{HttpTransport, ReqwestTransport};
use crate::types::{Award, EventSummary, IdRef, Paged, SkillsEntry};
use crate::RemoteResult;
use podium_core::{ConfigError, Grade, IngestConfig, RemoteError, RetryConfig, TeamId};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// Longest response body excerpt carried in errors and log lines.
const BODY_EXCERPT_LEN: usize = 200;

/// Reject anything that is not a plain resource path below the API base.
pub fn validate_path(path: &str) -> RemoteResult<()> {
    let malformed = !path.starts_with('/')
        || path.starts_with("//")
        || path.contains("://")
        || path.chars().any(|c| c.is_whitespace() || c.is_control());
    if malformed {
        return Err(RemoteError::MalformedPath {
            path: path.to_string(),
        });
    }
    Ok(())
}

/// Authenticated client for the RobotEvents v2 API.
pub struct RemoteClient<T = ReqwestTransport> {
    transport: T,
    base_url: String,
    seasons_base_url: String,
    token: SecretString,
    season: u32,
    retry: RetryConfig,
    backoff: Backoff,
}

impl RemoteClient<ReqwestTransport> {
    /// Build a reqwest-backed client from configuration.
    pub fn from_config(config: &IngestConfig) -> Result<Self, ConfigError> {
        let transport =
            ReqwestTransport::new(config.request_timeout()).map_err(|e| ConfigError::InvalidValue {
                field: "request_timeout_ms".to_string(),
                value: config.request_timeout_ms.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: HttpTransport> RemoteClient<T> {
    pub fn with_transport(transport: T, config: &IngestConfig) -> Self {
        Self {
            transport,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            seasons_base_url: config.seasons_base_url.trim_end_matches('/').to_string(),
            token: SecretString::from(config.api_token.clone()),
            season: config.season,
            retry: config.retry.clone(),
            backoff: Backoff::from_config(&config.retry),
        }
    }

    pub fn season(&self) -> u32 {
        self.season
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Absolute URL for an API resource path.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET an API resource and return the parsed JSON body.
    ///
    /// Transport failures and non-2xx statuses are retried with backoff.
    /// A malformed path fails immediately without touching the network.
    pub async fn request(&self, path: &str) -> RemoteResult<Value> {
        if let Err(err) = validate_path(path) {
            tracing::error!(path, "Refusing malformed API path");
            return Err(err);
        }
        let url = self.url_for(path);
        let body = self.get_with_retry(&url, true).await?;
        parse_json(&url, &body)
    }

    /// GET an API resource and decode it into `D`. Shape mismatches are
    /// reported as `RemoteError::Decode`.
    pub async fn request_as<D: DeserializeOwned>(&self, path: &str) -> RemoteResult<D> {
        let value = self.request(path).await?;
        decode(&self.url_for(path), value)
    }

    /// Follow `meta.last_page` and collect `data` from every page.
    pub async fn request_all_pages<D: DeserializeOwned>(&self, path: &str) -> RemoteResult<Vec<D>> {
        let first: Paged<D> = self.request_as(path).await?;
        let last_page = first.last_page();
        let mut items = first.data;

        let separator = if path.contains('?') { '&' } else { '?' };
        for page in 2..=last_page {
            let page_path = format!("{}{}page={}", path, separator, page);
            let next: Paged<D> = self.request_as(&page_path).await?;
            items.extend(next.data);
        }

        Ok(items)
    }

    // ========================================================================
    // ENDPOINTS
    // ========================================================================

    /// Awards won by a team in the configured season.
    pub async fn team_awards(&self, team_id: TeamId) -> RemoteResult<Vec<Award>> {
        let path = format!("/teams/{}/awards?season%5B%5D={}", team_id, self.season);
        self.request_all_pages(&path).await
    }

    /// Signature-level events of the configured season.
    pub async fn signature_events(&self) -> RemoteResult<Vec<EventSummary>> {
        let path = format!(
            "/events?season%5B%5D={}&level%5B%5D=Signature&myEvents=false",
            self.season
        );
        self.request_all_pages(&path).await
    }

    /// Awards handed out at an event.
    pub async fn event_awards(&self, event_id: i64) -> RemoteResult<Vec<Award>> {
        self.request_all_pages(&format!("/events/{}/awards", event_id))
            .await
    }

    /// Ids of every team registered for an event.
    pub async fn event_team_ids(&self, event_id: i64) -> RemoteResult<Vec<TeamId>> {
        let teams: Vec<IdRef> = self
            .request_all_pages(&format!("/events/{}/teams", event_id))
            .await?;
        Ok(teams.into_iter().map(|team| TeamId(team.id)).collect())
    }

    /// Season skills leaderboard for one grade. Served from the public
    /// seasons host, so no bearer token is sent.
    pub async fn skills_rankings(&self, grade: &Grade) -> RemoteResult<Vec<SkillsEntry>> {
        let url = format!(
            "{}/seasons/{}/skills?post_season=0&grade_level={}",
            self.seasons_base_url,
            self.season,
            urlencoding::encode(grade.as_api_str())
        );
        let body = self.get_with_retry(&url, false).await?;
        let value = parse_json(&url, &body)?;
        decode(&url, value)
    }

    // ========================================================================
    // RETRY LOOP
    // ========================================================================

    async fn get_with_retry(&self, url: &str, authenticated: bool) -> RemoteResult<String> {
        let bearer = authenticated.then(|| self.token.expose_secret());
        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_status = None;
        let mut last_reason = String::new();

        for attempt in 0..max_attempts {
            match self.transport.get(url, bearer).await {
                Ok(response) if response.is_success() => {
                    if attempt > 0 {
                        tracing::info!(
                            url,
                            attempts = attempt + 1,
                            "API request recovered after retry"
                        );
                    }
                    return Ok(response.body);
                }
                Ok(response) => {
                    last_status = Some(response.status);
                    last_reason = excerpt(&response.body);
                    tracing::error!(
                        url,
                        attempt = attempt + 1,
                        max_attempts,
                        status = response.status,
                        body = %last_reason,
                        "API request failed"
                    );
                }
                Err(err) => {
                    last_status = None;
                    last_reason = err.to_string();
                    tracing::error!(
                        url,
                        attempt = attempt + 1,
                        max_attempts,
                        error = %err,
                        "API request failed"
                    );
                }
            }

            if attempt + 1 < max_attempts {
                let delay = self.backoff.delay(attempt);
                tracing::debug!(url, delay_ms = delay.as_millis() as u64, "Backing off");
                tokio::time::sleep(delay).await;
            }
        }

        tracing::error!(
            url,
            attempts = max_attempts,
            last_status = ?last_status,
            "API request exhausted retries"
        );
        Err(RemoteError::Exhausted {
            url: url.to_string(),
            attempts: max_attempts,
            last_status,
            reason: last_reason,
        })
    }
}

impl<T> fmt::Debug for RemoteClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteClient")
            .field("base_url", &self.base_url)
            .field("seasons_base_url", &self.seasons_base_url)
            .field("season", &self.season)
            .field("token", &"[REDACTED]")
            .field("retry", &self.retry)
            .finish()
    }
}

fn parse_json(url: &str, body: &str) -> RemoteResult<Value> {
    serde_json::from_str(body).map_err(|e| RemoteError::Decode {
        url: url.to_string(),
        reason: format!("invalid JSON: {}", e),
    })
}

fn decode<D: DeserializeOwned>(url: &str, value: Value) -> RemoteResult<D> {
    serde_json::from_value(value).map_err(|e| {
        tracing::warn!(url, error = %e, "Response did not match expected schema");
        RemoteError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        }
    })
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_LEN).collect()
}
