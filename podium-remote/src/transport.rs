//! HTTP transport seam
//!
//! [`RemoteClient`](crate::RemoteClient) talks to the network only through
//! [`HttpTransport`]. Production uses [`ReqwestTransport`]; tests use
//! [`MockTransport`], which replays scripted replies and records every call.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

/// A completed HTTP exchange, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced a response (DNS, connect, timeout, body read).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// Minimal GET-only transport.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue a GET. `bearer` adds an `Authorization: Bearer` header.
    async fn get(&self, url: &str, bearer: Option<&str>) -> Result<HttpResponse, TransportError>;
}

// ============================================================================
// REQWEST TRANSPORT
// ============================================================================

/// reqwest-backed transport with a per-request timeout.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, bearer: Option<&str>) -> Result<HttpResponse, TransportError> {
        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/json");
        if let Some(token) = bearer {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError(format!("HTTP request failed: {}", e)))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError(format!("Failed to read response body: {}", e)))?;

        Ok(HttpResponse { status, body })
    }
}

// ============================================================================
// MOCK TRANSPORT
// ============================================================================

/// Scripted reply for [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    Response(HttpResponse),
    TransportFailure(String),
}

impl MockReply {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        MockReply::Response(HttpResponse::new(status, body))
    }

    pub fn status(status: u16) -> Self {
        MockReply::Response(HttpResponse::new(status, ""))
    }

    pub fn transport_failure(reason: impl Into<String>) -> Self {
        MockReply::TransportFailure(reason.into())
    }
}

/// One call observed by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub url: String,
    pub bearer: Option<String>,
    pub at: tokio::time::Instant,
}

#[derive(Debug, Default)]
struct MockState {
    queued: HashMap<String, VecDeque<MockReply>>,
    sticky: HashMap<String, MockReply>,
    calls: Vec<RecordedCall>,
}

/// In-memory transport for tests.
///
/// Queued replies for a URL are consumed first, in order; after that the
/// sticky reply (if any) is returned on every call. Unknown URLs get a 404.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Always answer `url` with this reply once the queue is drained.
    pub fn respond(&self, url: impl Into<String>, reply: MockReply) {
        self.state().sticky.insert(url.into(), reply);
    }

    /// Answer `url` with a 200 JSON body.
    pub fn respond_json(&self, url: impl Into<String>, body: impl Into<String>) {
        self.respond(url, MockReply::json(200, body));
    }

    /// Answer the next call to `url` with this reply.
    pub fn enqueue(&self, url: impl Into<String>, reply: MockReply) {
        self.state()
            .queued
            .entry(url.into())
            .or_default()
            .push_back(reply);
    }

    /// All calls made so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    /// Number of calls made to `url`.
    pub fn calls_to(&self, url: &str) -> usize {
        self.state().calls.iter().filter(|c| c.url == url).count()
    }

    pub fn total_calls(&self) -> usize {
        self.state().calls.len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get(&self, url: &str, bearer: Option<&str>) -> Result<HttpResponse, TransportError> {
        let reply = {
            let mut state = self.state();
            state.calls.push(RecordedCall {
                url: url.to_string(),
                bearer: bearer.map(str::to_string),
                at: tokio::time::Instant::now(),
            });
            let queued = state.queued.get_mut(url).and_then(VecDeque::pop_front);
            queued.or_else(|| state.sticky.get(url).cloned())
        };

        match reply {
            Some(MockReply::Response(response)) => Ok(response),
            Some(MockReply::TransportFailure(reason)) => Err(TransportError(reason)),
            None => Ok(HttpResponse::new(404, "{\"message\":\"not found\"}")),
        }
    }
}
