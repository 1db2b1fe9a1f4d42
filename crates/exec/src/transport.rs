//! HTTP transport for test invocations.
//!
//! [`UreqTransport`] uses `ureq` (sync) wrapped in
//! `tokio::task::spawn_blocking`. Dropping the returned future abandons the
//! call: the blocking thread finishes on its own and its result goes nowhere.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::io::Read;
use std::time::Duration;

use apiprobe_core::{ErrorKind, ExecutionError, Payload, RequestSpec};
use async_trait::async_trait;
use url::Url;

/// A raw response as received from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Lower-cased names; repeated headers joined with `", "`.
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        HttpResponse {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }
}

/// Failures that prevent a response from arriving at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request could not be built (bad URL, bad header name/value).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    /// DNS, connect, TLS or I/O failure.
    #[error("transport failure: {0}")]
    Network(String),
}

impl TransportError {
    pub fn to_execution_error(&self) -> ExecutionError {
        let kind = match self {
            TransportError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            TransportError::Timeout(_) => ErrorKind::Timeout,
            TransportError::Network(_) => ErrorKind::Transport,
        };
        ExecutionError::new(kind, self.to_string())
    }
}

/// Sends one request and returns whatever the server answered, any status.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &RequestSpec) -> Result<HttpResponse, TransportError>;
}

/// The request URL with `query_params` applied. Parameters already present
/// in the URL are replaced by same-named entries from `query_params`.
pub fn build_url(request: &RequestSpec) -> Result<Url, TransportError> {
    let mut url = Url::parse(&request.url).map_err(|e| {
        TransportError::InvalidRequest(format!("invalid URL '{}': {}", request.url, e))
    })?;

    if !request.query_params.is_empty() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !request.query_params.contains_key(&**key))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        pairs.extend_pairs(kept.iter());
        pairs.extend_pairs(request.query_params.iter());
    }

    Ok(url)
}

/// Response bodies beyond this many bytes are cut off.
pub const DEFAULT_MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

/// Default transport over `ureq`.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    user_agent: Option<String>,
    max_body_bytes: u64,
}

impl UreqTransport {
    /// An agent that returns 4xx/5xx responses instead of erroring, with a
    /// global per-call timeout.
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build();
        UreqTransport {
            agent: ureq::Agent::new_with_config(config),
            user_agent: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Keep at most `max_body_bytes` of each response body. A longer body is
    /// truncated, not rejected, so the status and headers still arrive.
    pub fn with_body_limit(mut self, max_body_bytes: u64) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Send `user-agent: <value>` unless the request sets its own.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Headers as sent: request headers, plus `content-type` for JSON bodies
    /// and the configured user agent where the request has none.
    fn outgoing_headers(&self, request: &RequestSpec, body: Option<&Payload>) -> BTreeMap<String, String> {
        let mut headers = request.headers.clone();
        let has = |headers: &BTreeMap<String, String>, name: &str| {
            headers.keys().any(|k| k.eq_ignore_ascii_case(name))
        };
        if matches!(body, Some(Payload::Json(_))) && !has(&headers, "content-type") {
            headers.insert("content-type".to_string(), "application/json".to_string());
        }
        if let Some(agent) = &self.user_agent {
            if !has(&headers, "user-agent") {
                headers.insert("user-agent".to_string(), agent.clone());
            }
        }
        headers
    }
}

fn classify(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Timeout(_) => TransportError::Timeout(err.to_string()),
        other => TransportError::Network(other.to_string()),
    }
}

/// Read up to `limit` bytes of `reader`, decoding them as lossy UTF-8.
/// Returns the text and whether anything past the limit was dropped.
fn read_body(reader: impl Read, limit: u64) -> std::io::Result<(String, bool)> {
    let mut bytes = Vec::new();
    reader.take(limit.saturating_add(1)).read_to_end(&mut bytes)?;
    let truncated = bytes.len() as u64 > limit;
    if truncated {
        bytes.truncate(limit as usize);
    }
    Ok((String::from_utf8_lossy(&bytes).into_owned(), truncated))
}

#[async_trait]
impl HttpTransport for UreqTransport {
    async fn send(&self, request: &RequestSpec) -> Result<HttpResponse, TransportError> {
        let url = build_url(request)?;
        let verb = request.verb;
        let body = request.body.as_ref().filter(|_| verb.sends_body());
        let headers = self.outgoing_headers(request, body);
        let body_text = body.map(Payload::to_body_string);
        let agent = self.agent.clone();
        let limit = self.max_body_bytes;

        tokio::task::spawn_blocking(move || -> Result<HttpResponse, TransportError> {
            let mut builder = ureq::http::Request::builder()
                .method(verb.as_str())
                .uri(url.as_str());
            for (name, value) in &headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            let invalid = |e: ureq::http::Error| TransportError::InvalidRequest(e.to_string());

            let response = match body_text {
                Some(text) => agent.run(builder.body(text).map_err(invalid)?),
                None => agent.run(builder.body(()).map_err(invalid)?),
            }
            .map_err(classify)?;

            let status = response.status().as_u16();
            let mut headers: BTreeMap<String, String> = BTreeMap::new();
            for (name, value) in response.headers() {
                let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
                match headers.entry(name.as_str().to_string()) {
                    Entry::Occupied(mut existing) => {
                        let joined = existing.get_mut();
                        joined.push_str(", ");
                        joined.push_str(&value);
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(value);
                    }
                }
            }
            let (body, truncated) = read_body(response.into_body().into_reader(), limit)
                .map_err(|e| match e.kind() {
                    std::io::ErrorKind::TimedOut => {
                        TransportError::Timeout(format!("reading body: {}", e))
                    }
                    _ => TransportError::Network(format!("failed to read body: {}", e)),
                })?;
            if truncated {
                tracing::warn!(url = %url, limit, "response body truncated");
            }

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        })
        .await
        .map_err(|e| TransportError::Network(format!("task join error: {}", e)))?
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
