// crates/triage-providers/src/queue.rs
// ============================================================================
// Module: HTTP Submission Queue
// Description: Client for the pending list and pending detail endpoints.
// Purpose: Fetch queue snapshots and candidate bodies with hard limits.
// Dependencies: triage-core, reqwest, serde, serde_json, url
// ============================================================================

//! ## Overview
//! The list endpoint answers `{items: [{id, ...}]}`; the detail endpoint
//! answers `{ok, body, error}` for `?id=<id>`. Responses are size-limited and
//! redirects are not followed. The maintainer token travels in a configured
//! header and never appears in [`SubmissionQueue::describe`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use reqwest::blocking::Client;
use reqwest::blocking::RequestBuilder;
use reqwest::header::ACCEPT;
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use serde_json::Value;
use triage_core::PendingId;
use triage_core::QueueError;
use triage_core::SubmissionQueue;
use url::Url;

use crate::http::build_client;
use crate::http::check_url;
use crate::http::read_response_limited;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Maintainer token and the header carrying it.
#[derive(Clone, PartialEq, Eq)]
pub struct QueueAuth {
    /// Header name.
    pub header: String,
    /// Token value.
    pub token: String,
}

impl fmt::Debug for QueueAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueAuth")
            .field("header", &self.header)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Configuration for the queue client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpQueueConfig {
    /// Queue base URL; endpoint paths are appended to it.
    pub base_url: Url,
    /// Pending list path.
    pub list_path: String,
    /// Pending detail path.
    pub detail_path: String,
    /// Optional maintainer token.
    pub auth: Option<QueueAuth>,
    /// Allow cleartext HTTP.
    pub allow_http: bool,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum response size in bytes.
    pub max_response_bytes: usize,
    /// User agent string.
    pub user_agent: String,
}

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Pending list response.
#[derive(Deserialize)]
struct ListResponse {
    /// Pending entries; absent means empty.
    #[serde(default)]
    items: Option<Vec<Value>>,
}

/// Pending detail response.
#[derive(Deserialize)]
struct DetailResponse {
    /// Whether the queue could serve the item.
    #[serde(default)]
    ok: bool,
    /// Candidate body.
    #[serde(default)]
    body: Option<Value>,
    /// Queue-reported error.
    #[serde(default)]
    error: Option<Value>,
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Submission queue reached over HTTP.
pub struct HttpSubmissionQueue {
    /// Client configuration.
    config: HttpQueueConfig,
    /// Resolved list endpoint.
    list_url: Url,
    /// Resolved detail endpoint, without the id query.
    detail_url: Url,
    /// HTTP client.
    client: Client,
}

impl HttpSubmissionQueue {
    /// Creates a queue client.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Invalid`] when the endpoints are not valid URLs
    /// and [`QueueError::Transport`] when the client cannot be built.
    pub fn new(config: HttpQueueConfig) -> Result<Self, QueueError> {
        check_url(&config.base_url, config.allow_http).map_err(QueueError::Invalid)?;
        let list_url = endpoint(&config.base_url, &config.list_path)?;
        let detail_url = endpoint(&config.base_url, &config.detail_path)?;
        let client = build_client(config.timeout_ms, &config.user_agent, None)
            .map_err(QueueError::Transport)?;
        Ok(Self {
            config,
            list_url,
            detail_url,
            client,
        })
    }

    /// Builds a GET with the standard headers and the token when configured.
    fn get(&self, url: &Url) -> RequestBuilder {
        let mut request = self
            .client
            .get(url.as_str())
            .header(ACCEPT, "application/json")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(auth) = &self.config.auth {
            request = request.header(auth.header.as_str(), auth.token.as_str());
        }
        request
    }

    /// Sends a GET and returns the size-limited body of a success response.
    fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>, QueueError> {
        let mut response = self.get(url).send().map_err(|err| {
            if err.is_timeout() {
                QueueError::Transport("queue request timed out".to_string())
            } else {
                QueueError::Transport("queue request failed".to_string())
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(QueueError::Status(status.as_u16()));
        }
        read_response_limited(&mut response, self.config.max_response_bytes)
            .map_err(QueueError::Invalid)
    }
}

impl SubmissionQueue for HttpSubmissionQueue {
    fn describe(&self) -> String {
        self.config.base_url.to_string()
    }

    fn list_pending(&self) -> Result<Vec<PendingId>, QueueError> {
        let bytes = self.fetch_bytes(&self.list_url)?;
        let response: ListResponse = serde_json::from_slice(&bytes)
            .map_err(|err| QueueError::Invalid(format!("pending list: {err}")))?;
        Ok(response.items.unwrap_or_default().iter().filter_map(entry_id).collect())
    }

    fn fetch(&self, id: &PendingId) -> Result<Value, QueueError> {
        let mut url = self.detail_url.clone();
        url.query_pairs_mut().append_pair("id", id.as_str());
        let bytes = self.fetch_bytes(&url)?;
        let response: DetailResponse = serde_json::from_slice(&bytes)
            .map_err(|err| QueueError::Invalid(format!("pending detail: {err}")))?;
        if !response.ok {
            let reason = match response.error {
                Some(Value::String(text)) => text,
                Some(other) => other.to_string(),
                None => "unknown".to_string(),
            };
            return Err(QueueError::Rejected(reason));
        }
        match response.body {
            Some(body @ Value::Object(_)) => Ok(body),
            _ => Err(QueueError::Invalid("body_not_object".to_string())),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Appends an endpoint path to the base URL.
fn endpoint(base: &Url, path: &str) -> Result<Url, QueueError> {
    let joined = format!("{}{path}", base.as_str().trim_end_matches('/'));
    Url::parse(&joined).map_err(|err| QueueError::Invalid(format!("endpoint {joined}: {err}")))
}

/// Extracts a non-empty id from a list entry; other entries are skipped.
fn entry_id(entry: &Value) -> Option<PendingId> {
    match entry.get("id")? {
        Value::String(id) if !id.trim().is_empty() => Some(PendingId::new(id.trim())),
        Value::Number(id) => Some(PendingId::new(id.to_string())),
        _ => None,
    }
}
