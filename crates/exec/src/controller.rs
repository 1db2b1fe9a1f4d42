//! Execution controller: runs a composed request, single-shot or as a
//! bounded pagination loop, under a session's busy guard.
//!
//! Every expected failure (bad URL, network error, timeout, non-2xx) ends
//! up in an [`ExecutionResult`]'s `error`; `execute` itself never fails.

use std::num::NonZeroU32;
use std::sync::Arc;

use apiprobe_core::{ErrorKind, ExecutionError, ExecutionResult, Payload, RequestSpec};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::history::ExecutionHistory;
use crate::pagination::{first_page, next_page};
use crate::session::TestSession;
use crate::transport::{build_url, HttpResponse, HttpTransport};

/// Request bound for a paginated run whose policy sets none.
pub const DEFAULT_MAX_ITERATIONS: NonZeroU32 = match NonZeroU32::new(10) {
    Some(n) => n,
    None => unreachable!(),
};

/// Body fields consulted, in order, for a server-supplied error message.
const ERROR_FIELDS: [&str; 4] = ["error", "message", "detail", "error_description"];

/// Why a run stopped issuing requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Not paginated: exactly one request.
    SinglePage,
    /// The server signalled there are no further pages.
    NoMorePages,
    MaxIterations,
    /// The last page failed; it is still included in `pages`.
    PageFailed,
}

/// Everything one `execute` call produced, pages in request order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub execution_id: String,
    pub paginated: bool,
    pub pages: Vec<ExecutionResult>,
    pub stop: StopReason,
    /// RFC 3339 timestamp of the first request.
    pub started_at: String,
}

impl ExecutionReport {
    pub fn first(&self) -> Option<&ExecutionResult> {
        self.pages.first()
    }

    pub fn last(&self) -> Option<&ExecutionResult> {
        self.pages.last()
    }

    /// True when every page succeeded.
    pub fn success(&self) -> bool {
        !self.pages.is_empty() && self.pages.iter().all(|p| p.success)
    }
}

/// What happened to an `execute` call.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The run finished and its report was applied to the session.
    Completed(ExecutionReport),
    /// Another run was already in flight on the session; nothing was sent.
    Rejected,
    /// The session cancelled the run; any late result was discarded.
    Cancelled,
}

impl RunOutcome {
    pub fn report(&self) -> Option<&ExecutionReport> {
        match self {
            RunOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }

    pub fn into_report(self) -> Option<ExecutionReport> {
        match self {
            RunOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }
}

pub struct ExecutionController {
    transport: Arc<dyn HttpTransport>,
    default_max_iterations: NonZeroU32,
    history: Option<Arc<ExecutionHistory>>,
}

impl ExecutionController {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        ExecutionController {
            transport,
            default_max_iterations: DEFAULT_MAX_ITERATIONS,
            history: None,
        }
    }

    /// Bound applied when a paginated request's policy sets no `max_iterations`.
    pub fn with_default_max_iterations(mut self, max: NonZeroU32) -> Self {
        self.default_max_iterations = max;
        self
    }

    /// Record every applied report in `history`.
    pub fn with_history(mut self, history: Arc<ExecutionHistory>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn history(&self) -> Option<&Arc<ExecutionHistory>> {
        self.history.as_ref()
    }

    /// Run `spec` on behalf of `session`.
    ///
    /// Refused if the session already has a run in flight. The in-flight call
    /// races the session's cancellation; once cancelled, the call is
    /// abandoned and its result never reaches the session.
    pub async fn execute(
        &self,
        session: &TestSession,
        spec: &RequestSpec,
        paginated: bool,
    ) -> RunOutcome {
        let guard = match session.begin() {
            Ok(guard) => guard,
            Err(busy) => {
                tracing::debug!(url = %spec.url, "{}", busy);
                return RunOutcome::Rejected;
            }
        };
        let mut token = guard.token();

        let report = tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::info!(run = guard.run(), "test run cancelled");
                return RunOutcome::Cancelled;
            }
            report = self.run(spec, paginated) => report,
        };

        if !guard.complete(report.clone()) {
            tracing::info!(
                execution_id = %report.execution_id,
                "discarding result of cancelled run"
            );
            return RunOutcome::Cancelled;
        }

        tracing::info!(
            execution_id = %report.execution_id,
            pages = report.pages.len(),
            stop = ?report.stop,
            success = report.success(),
            "test run finished"
        );
        if let Some(history) = &self.history {
            history.record(report.clone());
        }
        RunOutcome::Completed(report)
    }

    /// Issue the request(s) for one run, without any session bookkeeping.
    ///
    /// Pagination only applies when `paginated` is set and the request
    /// carries an enabled policy; otherwise exactly one request is sent.
    pub async fn run(&self, spec: &RequestSpec, paginated: bool) -> ExecutionReport {
        let execution_id = new_execution_id();
        let started_at = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string());

        let policy = if paginated {
            spec.active_pagination()
        } else {
            None
        };

        let Some(policy) = policy else {
            let mut result = self.issue(spec).await;
            result.execution_id = Some(execution_id.clone());
            return ExecutionReport {
                execution_id,
                paginated: false,
                pages: vec![result],
                stop: StopReason::SinglePage,
                started_at,
            };
        };

        let max = policy
            .max_iterations
            .unwrap_or(self.default_max_iterations)
            .get() as usize;
        let mut request = first_page(spec, policy);
        let mut pages = Vec::new();

        let stop = loop {
            let mut result = self.issue(&request).await;
            result.execution_id = Some(execution_id.clone());
            let next = if result.success {
                next_page(policy, &request, &result)
            } else {
                None
            };
            let failed = !result.success;
            pages.push(result);

            if failed {
                break StopReason::PageFailed;
            }
            match next {
                None => break StopReason::NoMorePages,
                Some(_) if pages.len() >= max => break StopReason::MaxIterations,
                Some(next) => request = next,
            }
        };

        ExecutionReport {
            execution_id,
            paginated: true,
            pages,
            stop,
            started_at,
        }
    }

    /// One HTTP call. Never fails: transport errors become a result with
    /// `status: None`.
    async fn issue(&self, request: &RequestSpec) -> ExecutionResult {
        let request_url = build_url(request)
            .map(String::from)
            .unwrap_or_else(|_| request.url.clone());
        tracing::debug!(verb = %request.verb, url = %request_url, "sending request");

        match self.transport.send(request).await {
            Ok(response) => classify_response(request_url, response),
            Err(err) => {
                tracing::warn!(url = %request_url, error = %err, "request did not complete");
                ExecutionResult::failed(request_url, err.to_execution_error())
            }
        }
    }
}

/// Turn a raw response into a result: success iff 2xx, with an error
/// message taken from the body when the server supplied one.
pub fn classify_response(request_url: String, response: HttpResponse) -> ExecutionResult {
    let success = ExecutionResult::is_success_status(response.status);
    let body = Payload::parse(&response.body);
    let error = (!success).then(|| {
        ExecutionError::new(
            ErrorKind::Http,
            extract_error_message(response.status, body.as_ref()),
        )
    });
    ExecutionResult {
        success,
        status: Some(response.status),
        response_headers: response.headers,
        response_body: body,
        execution_id: None,
        error,
        request_url,
    }
}

/// The server's own error message if the body carries one, else a message
/// built from the status code.
pub fn extract_error_message(status: u16, body: Option<&Payload>) -> String {
    if let Some(Value::Object(fields)) = body.and_then(Payload::as_json) {
        for name in ERROR_FIELDS {
            match fields.get(name) {
                Some(Value::String(message)) if !message.trim().is_empty() => {
                    return message.clone();
                }
                Some(Value::Object(nested)) => {
                    if let Some(Value::String(message)) = nested.get("message") {
                        return message.clone();
                    }
                }
                _ => {}
            }
        }
    }
    let reason = ureq::http::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("unknown status");
    format!("request failed with status {} ({})", status, reason)
}

fn new_execution_id() -> String {
    format!("{:016x}", rand::random::<u64>())
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
