//! Next-page extraction for paginated runs.
//!
//! A run starts from [`first_page`] and asks [`next_page`] after every
//! successful response. `None` means the server signalled there is nothing
//! more; the iteration bound is enforced by the controller, not here.

use apiprobe_core::{CursorSource, ExecutionResult, PaginationPolicy, Payload, RequestSpec};
use serde_json::Value;
use url::Url;

/// The first request of a paginated run: the limit parameter and, for page
/// counters, the start page are filled in unless the user already set them.
pub fn first_page(spec: &RequestSpec, policy: &PaginationPolicy) -> RequestSpec {
    let mut request = spec.clone();
    if !policy.limit_param_name.is_empty() {
        request
            .query_params
            .entry(policy.limit_param_name.clone())
            .or_insert_with(|| policy.default_limit.to_string());
    }
    if let CursorSource::PageNumber { start } = policy.cursor {
        request
            .query_params
            .entry(policy.page_param_name.clone())
            .or_insert_with(|| start.to_string());
    }
    request
}

/// The request for the page after `result`, or `None` when there is none.
pub fn next_page(
    policy: &PaginationPolicy,
    current: &RequestSpec,
    result: &ExecutionResult,
) -> Option<RequestSpec> {
    match &policy.cursor {
        CursorSource::LinkHeader => {
            let header = result.response_headers.get("link")?;
            let target = parse_link_next(header)?;
            let resolved = resolve_against(&result.request_url, &target)?;
            Some(follow_url(current, resolved))
        }
        CursorSource::BodyField { pointer } => {
            let body = result.response_body.as_ref()?.as_json()?;
            let token = match body.pointer(pointer)? {
                Value::String(s) if !s.is_empty() => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            if token.starts_with("http://") || token.starts_with("https://") {
                Some(follow_url(current, token))
            } else {
                Some(with_page_param(current, policy, token))
            }
        }
        CursorSource::PageNumber { start } => {
            let items = page_items(result.response_body.as_ref())?;
            let limit = current
                .query_params
                .get(&policy.limit_param_name)
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(policy.default_limit as usize);
            if items.is_empty() || (limit > 0 && items.len() < limit) {
                return None;
            }
            let page = current
                .query_params
                .get(&policy.page_param_name)
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(*start);
            Some(with_page_param(current, policy, (page + 1).to_string()))
        }
    }
}

/// Target of the `rel="next"` entry in an RFC 8288 `Link` header.
pub fn parse_link_next(header: &str) -> Option<String> {
    header.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let target = target.strip_prefix('<')?.strip_suffix('>')?;
        let is_next = parts.any(|param| {
            let Some((name, value)) = param.split_once('=') else {
                return false;
            };
            name.trim().eq_ignore_ascii_case("rel")
                && value
                    .trim()
                    .trim_matches('"')
                    .split_whitespace()
                    .any(|rel| rel.eq_ignore_ascii_case("next"))
        });
        is_next.then(|| target.to_string())
    })
}

/// The array a page-number response is counted by: the body itself, or the
/// first array-valued top-level field of an object body.
fn page_items(body: Option<&Payload>) -> Option<&Vec<Value>> {
    match body?.as_json()? {
        Value::Array(items) => Some(items),
        Value::Object(map) => map.values().find_map(Value::as_array),
        _ => None,
    }
}

fn resolve_against(base: &str, target: &str) -> Option<String> {
    match Url::parse(target) {
        Ok(absolute) => Some(absolute.to_string()),
        Err(_) => Url::parse(base).ok()?.join(target).ok().map(String::from),
    }
}

/// Follow a server-supplied URL. It already carries its own query string, so
/// the composed parameters are dropped.
fn follow_url(current: &RequestSpec, url: String) -> RequestSpec {
    let mut next = current.clone();
    next.url = url;
    next.query_params.clear();
    next
}

fn with_page_param(current: &RequestSpec, policy: &PaginationPolicy, value: String) -> RequestSpec {
    let mut next = current.clone();
    next.query_params
        .insert(policy.page_param_name.clone(), value);
    next
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use apiprobe_core::HttpVerb;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn policy(cursor: CursorSource) -> PaginationPolicy {
        PaginationPolicy {
            cursor,
            default_limit: 2,
            ..Default::default()
        }
    }

    fn result(url: &str, headers: &[(&str, &str)], body: Value) -> ExecutionResult {
        ExecutionResult {
            success: true,
            status: Some(200),
            response_headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            response_body: Some(Payload::Json(body)),
            execution_id: None,
            error: None,
            request_url: url.to_string(),
        }
    }

    #[test]
    fn link_header_next_is_found() {
        let header = r#"<https://api.x.com/items?page=2>; rel="next", <https://api.x.com/items?page=9>; rel="last""#;
        assert_eq!(
            parse_link_next(header).as_deref(),
            Some("https://api.x.com/items?page=2")
        );
    }

    #[test]
    fn link_header_without_next() {
        assert_eq!(parse_link_next(r#"<https://a.io/?p=1>; rel="prev""#), None);
        assert_eq!(parse_link_next(""), None);
    }

    #[test]
    fn link_header_multi_valued_rel() {
        let header = r#"<https://a.io/?p=3>; rel="next last""#;
        assert_eq!(parse_link_next(header).as_deref(), Some("https://a.io/?p=3"));
    }

    #[test]
    fn first_page_fills_limit_unless_user_set_it() {
        let spec = RequestSpec::new(HttpVerb::Get, "https://a.io/items");
        let first = first_page(&spec, &policy(CursorSource::PageNumber { start: 1 }));
        assert_eq!(first.query_params.get("limit").map(String::as_str), Some("2"));
        assert_eq!(first.query_params.get("page").map(String::as_str), Some("1"));

        let mut spec = spec;
        spec.query_params.insert("limit".to_string(), "7".to_string());
        let first = first_page(&spec, &policy(CursorSource::LinkHeader));
        assert_eq!(first.query_params.get("limit").map(String::as_str), Some("7"));
        assert!(!first.query_params.contains_key("page"));
    }

    #[test]
    fn relative_link_resolves_against_request_url() {
        let current = RequestSpec::new(HttpVerb::Get, "https://a.io/items");
        let page = result(
            "https://a.io/items?limit=2",
            &[("link", r#"</items?cursor=abc>; rel="next""#)],
            json!([1, 2]),
        );
        let next = next_page(&policy(CursorSource::LinkHeader), &current, &page).unwrap();
        assert_eq!(next.url, "https://a.io/items?cursor=abc");
        assert!(next.query_params.is_empty());
    }

    #[test]
    fn body_token_goes_into_page_param() {
        let current = RequestSpec::new(HttpVerb::Get, "https://a.io/items");
        let cursor = CursorSource::BodyField {
            pointer: "/meta/next".to_string(),
        };
        let page = result("https://a.io/items", &[], json!({"meta": {"next": "tok-2"}}));
        let next = next_page(&policy(cursor.clone()), &current, &page).unwrap();
        assert_eq!(next.query_params.get("page").map(String::as_str), Some("tok-2"));

        let last = result("https://a.io/items", &[], json!({"meta": {"next": null}}));
        assert!(next_page(&policy(cursor), &current, &last).is_none());
    }

    #[test]
    fn body_url_replaces_request_url() {
        let mut current = RequestSpec::new(HttpVerb::Get, "https://a.io/items");
        current.query_params.insert("limit".to_string(), "2".to_string());
        let cursor = CursorSource::BodyField {
            pointer: "/next".to_string(),
        };
        let page = result(
            "https://a.io/items",
            &[],
            json!({"next": "https://a.io/items?after=9"}),
        );
        let next = next_page(&policy(cursor), &current, &page).unwrap();
        assert_eq!(next.url, "https://a.io/items?after=9");
        assert!(next.query_params.is_empty());
    }

    #[test]
    fn page_number_advances_on_full_page() {
        let mut current = RequestSpec::new(HttpVerb::Get, "https://a.io/items");
        current.query_params.insert("page".to_string(), "4".to_string());
        let page = result("https://a.io/items", &[], json!({"data": [1, 2], "total": 10}));
        let next = next_page(&policy(CursorSource::PageNumber { start: 1 }), &current, &page).unwrap();
        assert_eq!(next.query_params.get("page").map(String::as_str), Some("5"));
    }

    #[test]
    fn page_number_stops_on_short_page() {
        let current = RequestSpec::new(HttpVerb::Get, "https://a.io/items");
        let short = result("https://a.io/items", &[], json!([1]));
        assert!(next_page(&policy(CursorSource::PageNumber { start: 1 }), &current, &short).is_none());
        let empty = result("https://a.io/items", &[], json!([]));
        assert!(next_page(&policy(CursorSource::PageNumber { start: 1 }), &current, &empty).is_none());
    }
}
