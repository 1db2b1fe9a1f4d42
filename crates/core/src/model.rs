//! Data model shared by the composer, the execution controller and the
//! persistence linker.
//!
//! Account and method records are owned by the platform stores; they are
//! deserialized leniently (absent fields default to empty/false) because
//! the platform omits fields it has never set.

use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ──────────────────────────────────────────────
// Configuration records
// ──────────────────────────────────────────────

/// One key/value editing row (a header or a query parameter).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        KeyValue {
            key: key.into(),
            value: value.into(),
        }
    }

    /// A row with a blank key is an unfinished editing row and is never sent.
    pub fn is_blank(&self) -> bool {
        self.key.trim().is_empty()
    }
}

/// Connection defaults shared by every method invoked through an account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountConfig {
    pub account_id: String,
    #[serde(default)]
    pub name: String,
    /// Absolute base URL or path prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_override: Option<String>,
    /// Ordered; keys may repeat (last one wins when merged).
    #[serde(default)]
    pub default_headers: Vec<KeyValue>,
    #[serde(default)]
    pub save_data: bool,
}

/// A configured API endpoint template within a namespace.
///
/// Written back in full by the schema linker, so every field the platform
/// sent survives the round trip: unknown fields are carried in `extra`, and
/// an absent `urlOverride` is written as `""` rather than dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodConfig {
    pub method_id: String,
    #[serde(default)]
    pub name: String,
    /// Verb as stored by the platform, e.g. `"GET"`. See [`MethodConfig::verb`].
    #[serde(default)]
    pub http_verb: String,
    #[serde(default, serialize_with = "empty_if_none")]
    pub url_override: Option<String>,
    #[serde(default)]
    pub default_query_params: Vec<KeyValue>,
    #[serde(default)]
    pub default_headers: Vec<KeyValue>,
    #[serde(default)]
    pub save_data: bool,
    /// Back-reference to the last response schema saved for this method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn empty_if_none<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(value.as_deref().unwrap_or(""))
}

impl MethodConfig {
    /// The method's verb, falling back to `GET` when the stored string is
    /// empty or unrecognised.
    pub fn verb(&self) -> HttpVerb {
        self.http_verb.parse().unwrap_or_default()
    }
}

// ──────────────────────────────────────────────
// HttpVerb
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpVerb {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Patch => "PATCH",
            HttpVerb::Delete => "DELETE",
            HttpVerb::Head => "HEAD",
            HttpVerb::Options => "OPTIONS",
        }
    }

    /// Whether a request body is transmitted for this verb.
    pub fn sends_body(self) -> bool {
        matches!(self, HttpVerb::Post | HttpVerb::Put | HttpVerb::Patch)
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpVerb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpVerb::Get),
            "POST" => Ok(HttpVerb::Post),
            "PUT" => Ok(HttpVerb::Put),
            "PATCH" => Ok(HttpVerb::Patch),
            "DELETE" => Ok(HttpVerb::Delete),
            "HEAD" => Ok(HttpVerb::Head),
            "OPTIONS" => Ok(HttpVerb::Options),
            other => Err(format!("unknown HTTP verb '{}'", other)),
        }
    }
}

// ──────────────────────────────────────────────
// Payload
// ──────────────────────────────────────────────

/// A request or response body: parsed JSON when it parses, the raw text
/// otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Json(serde_json::Value),
    Raw(String),
}

impl Payload {
    /// Parse body text. Blank text is no body at all.
    pub fn parse(text: &str) -> Option<Payload> {
        if text.trim().is_empty() {
            return None;
        }
        Some(match serde_json::from_str(text) {
            Ok(value) => Payload::Json(value),
            Err(_) => Payload::Raw(text.to_string()),
        })
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Raw(_) => None,
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Payload::Json(_))
    }

    /// Text to put on the wire.
    pub fn to_body_string(&self) -> String {
        match self {
            Payload::Json(value) => value.to_string(),
            Payload::Raw(text) => text.clone(),
        }
    }
}

// ──────────────────────────────────────────────
// Pagination
// ──────────────────────────────────────────────

/// Where the next page cursor comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CursorSource {
    /// `rel="next"` target of the response `Link` header.
    #[default]
    LinkHeader,
    /// JSON pointer (RFC 6901) into the response body. A token found there
    /// goes into the page parameter; an absolute URL replaces the request URL.
    BodyField { pointer: String },
    /// Numeric page counter; stops on a short or empty array page.
    PageNumber { start: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationPolicy {
    pub enabled: bool,
    /// Upper bound on requests issued in one paginated run. Unset means the
    /// controller's configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<NonZeroU32>,
    pub page_param_name: String,
    pub limit_param_name: String,
    pub default_limit: u32,
    #[serde(default)]
    pub cursor: CursorSource,
}

impl Default for PaginationPolicy {
    fn default() -> Self {
        PaginationPolicy {
            enabled: true,
            max_iterations: None,
            page_param_name: "page".to_string(),
            limit_param_name: "limit".to_string(),
            default_limit: 50,
            cursor: CursorSource::LinkHeader,
        }
    }
}

// ──────────────────────────────────────────────
// Requests
// ──────────────────────────────────────────────

/// What the user typed into the test form, layered on top of the account
/// and method defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserEdits {
    pub headers: Vec<KeyValue>,
    pub query_params: Vec<KeyValue>,
    pub body: Option<String>,
    /// Replaces the resolved URL when non-blank.
    pub url: Option<String>,
    pub pagination: Option<PaginationPolicy>,
}

/// A concrete request, ready for the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSpec {
    pub verb: HttpVerb,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub query_params: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Payload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationPolicy>,
}

impl RequestSpec {
    pub fn new(verb: HttpVerb, url: impl Into<String>) -> Self {
        RequestSpec {
            verb,
            url: url.into(),
            headers: BTreeMap::new(),
            query_params: BTreeMap::new(),
            body: None,
            pagination: None,
        }
    }

    /// The pagination policy, if one is attached and switched on.
    pub fn active_pagination(&self) -> Option<&PaginationPolicy> {
        self.pagination.as_ref().filter(|p| p.enabled)
    }
}

// ──────────────────────────────────────────────
// Execution results
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// DNS, connection or I/O failure.
    Transport,
    Timeout,
    /// The request could not be built (bad URL, bad header).
    InvalidRequest,
    /// The server answered with a non-2xx status.
    Http,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ExecutionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ExecutionError {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// The outcome of one HTTP call. Always renderable: failures are carried in
/// `error`, never raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    /// `None` when no response arrived.
    pub status: Option<u16>,
    pub response_headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<Payload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
    /// URL actually requested, query string included.
    pub request_url: String,
}

impl ExecutionResult {
    pub fn is_success_status(status: u16) -> bool {
        (200..300).contains(&status)
    }

    /// A result for a call that never produced a response.
    pub fn failed(request_url: impl Into<String>, error: ExecutionError) -> Self {
        ExecutionResult {
            success: false,
            status: None,
            response_headers: BTreeMap::new(),
            response_body: None,
            execution_id: None,
            error: Some(error),
            request_url: request_url.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verb_parse_is_case_insensitive() {
        assert_eq!("post".parse::<HttpVerb>(), Ok(HttpVerb::Post));
        assert_eq!(" Patch ".parse::<HttpVerb>(), Ok(HttpVerb::Patch));
        assert!("FETCH".parse::<HttpVerb>().is_err());
    }

    #[test]
    fn unknown_method_verb_falls_back_to_get() {
        let method = MethodConfig {
            http_verb: "bogus".to_string(),
            ..Default::default()
        };
        assert_eq!(method.verb(), HttpVerb::Get);
    }

    #[test]
    fn payload_parse_prefers_json() {
        assert_eq!(
            Payload::parse(r#"{"a":1}"#),
            Some(Payload::Json(serde_json::json!({"a": 1})))
        );
        assert_eq!(
            Payload::parse("{not json"),
            Some(Payload::Raw("{not json".to_string()))
        );
        assert_eq!(Payload::parse("   "), None);
    }

    #[test]
    fn method_record_missing_fields_default() {
        let method: MethodConfig =
            serde_json::from_value(serde_json::json!({"methodId": "m1"})).unwrap();
        assert_eq!(method.method_id, "m1");
        assert_eq!(method.name, "");
        assert!(!method.save_data);
        assert!(method.default_headers.is_empty());
        assert_eq!(method.schema_id, None);
    }

    #[test]
    fn method_round_trip_keeps_unknown_fields() {
        let wire = serde_json::json!({
            "methodId": "m-1",
            "httpVerb": "GET",
            "namespaceId": "ns-1",
            "tags": ["billing"],
            "sampleRequest": {"q": 1}
        });
        let mut method: MethodConfig = serde_json::from_value(wire).unwrap();
        assert_eq!(method.extra.len(), 3);
        method.schema_id = Some("s-1".to_string());

        let back = serde_json::to_value(&method).unwrap();
        assert_eq!(back["namespaceId"], serde_json::json!("ns-1"));
        assert_eq!(back["tags"], serde_json::json!(["billing"]));
        assert_eq!(back["sampleRequest"], serde_json::json!({"q": 1}));
        assert_eq!(back["schemaId"], serde_json::json!("s-1"));
        assert_eq!(back["urlOverride"], serde_json::json!(""));
    }

    #[test]
    fn success_status_range() {
        assert!(ExecutionResult::is_success_status(200));
        assert!(ExecutionResult::is_success_status(299));
        assert!(!ExecutionResult::is_success_status(300));
        assert!(!ExecutionResult::is_success_status(199));
    }

    #[test]
    fn pagination_policy_wire_format() {
        let policy: PaginationPolicy = serde_json::from_value(serde_json::json!({
            "enabled": true,
            "maxIterations": 3,
            "pageParamName": "cursor",
            "limitParamName": "per_page",
            "defaultLimit": 20,
            "cursor": {"type": "bodyField", "pointer": "/meta/next"}
        }))
        .unwrap();
        assert_eq!(policy.max_iterations.map(NonZeroU32::get), Some(3));
        assert_eq!(
            policy.cursor,
            CursorSource::BodyField {
                pointer: "/meta/next".to_string()
            }
        );
    }

    #[test]
    fn zero_max_iterations_is_rejected() {
        let parsed: Result<PaginationPolicy, _> = serde_json::from_value(serde_json::json!({
            "enabled": true,
            "maxIterations": 0,
            "pageParamName": "page",
            "limitParamName": "limit",
            "defaultLimit": 10
        }));
        assert!(parsed.is_err());
    }
}
