//! Request composition: account defaults + method defaults + user edits
//! → [`RequestSpec`].
//!
//! Composition is a pure transform and never fails. The worst outcome is an
//! empty URL, which the caller must fill in before executing; a body that is
//! not valid JSON is sent as raw text and left for the server to reject.

use std::collections::BTreeMap;

use crate::model::{AccountConfig, KeyValue, MethodConfig, Payload, RequestSpec, UserEdits};

/// Join the account and method URL overrides with exactly one slash.
///
/// - both present: `a/` + `/m` drops one slash, `a` + `m` inserts one,
///   otherwise the two are concatenated as-is
/// - one present: used verbatim
/// - neither present: empty string
///
/// Empty strings count as absent.
pub fn resolve_url(account_url: Option<&str>, method_url: Option<&str>) -> String {
    let account_url = account_url.filter(|u| !u.is_empty());
    let method_url = method_url.filter(|u| !u.is_empty());

    match (account_url, method_url) {
        (Some(base), Some(path)) => {
            let base_slash = base.ends_with('/');
            let path_slash = path.starts_with('/');
            if base_slash && path_slash {
                format!("{}{}", base, &path[1..])
            } else if !base_slash && !path_slash {
                format!("{}/{}", base, path)
            } else {
                format!("{}{}", base, path)
            }
        }
        (Some(url), None) | (None, Some(url)) => url.to_string(),
        (None, None) => String::new(),
    }
}

/// Collapse layered key/value rows into a map. Later layers (and later rows
/// within a layer) overwrite earlier ones by exact, case-sensitive key.
/// Blank-key rows are dropped.
fn collapse<'a>(layers: impl IntoIterator<Item = &'a [KeyValue]>) -> BTreeMap<String, String> {
    let mut merged = BTreeMap::new();
    for layer in layers {
        for row in layer.iter().filter(|row| !row.is_blank()) {
            merged.insert(row.key.clone(), row.value.clone());
        }
    }
    merged
}

/// Merge header rows: account defaults, then method defaults, then user rows.
pub fn merge_headers(
    account: &AccountConfig,
    method: &MethodConfig,
    user_rows: &[KeyValue],
) -> BTreeMap<String, String> {
    collapse([
        account.default_headers.as_slice(),
        method.default_headers.as_slice(),
        user_rows,
    ])
}

/// Merge query parameter rows: method defaults, then user rows.
pub fn merge_query_params(method: &MethodConfig, user_rows: &[KeyValue]) -> BTreeMap<String, String> {
    collapse([method.default_query_params.as_slice(), user_rows])
}

/// Parse an edited body. Blank text means no body; text that is not JSON is
/// kept raw.
pub fn parse_body(text: Option<&str>) -> Option<Payload> {
    text.and_then(Payload::parse)
}

/// Build a concrete request for one test invocation.
pub fn compose_request(
    account: &AccountConfig,
    method: &MethodConfig,
    edits: &UserEdits,
) -> RequestSpec {
    let url = match edits.url.as_deref().map(str::trim) {
        Some(explicit) if !explicit.is_empty() => explicit.to_string(),
        _ => resolve_url(
            account.url_override.as_deref(),
            method.url_override.as_deref(),
        ),
    };

    RequestSpec {
        verb: method.verb(),
        url,
        headers: merge_headers(account, method, &edits.headers),
        query_params: merge_query_params(method, &edits.query_params),
        body: parse_body(edits.body.as_deref()),
        pagination: edits.pagination.clone(),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HttpVerb, PaginationPolicy};

    fn kv(key: &str, value: &str) -> KeyValue {
        KeyValue::new(key, value)
    }

    fn account(url: Option<&str>, headers: Vec<KeyValue>) -> AccountConfig {
        AccountConfig {
            account_id: "acct-1".to_string(),
            name: "primary".to_string(),
            url_override: url.map(str::to_string),
            default_headers: headers,
            save_data: false,
        }
    }

    fn method(url: Option<&str>) -> MethodConfig {
        MethodConfig {
            method_id: "m-1".to_string(),
            name: "list users".to_string(),
            http_verb: "GET".to_string(),
            url_override: url.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn url_trailing_and_leading_slash_collapse() {
        assert_eq!(
            resolve_url(Some("https://api.x.com/"), Some("/v1/users")),
            "https://api.x.com/v1/users"
        );
    }

    #[test]
    fn url_missing_slash_is_inserted() {
        assert_eq!(
            resolve_url(Some("https://api.x.com"), Some("v1/users")),
            "https://api.x.com/v1/users"
        );
    }

    #[test]
    fn url_single_slash_concatenates() {
        assert_eq!(
            resolve_url(Some("https://api.x.com/"), Some("v1/users")),
            "https://api.x.com/v1/users"
        );
        assert_eq!(
            resolve_url(Some("https://api.x.com"), Some("/v1/users")),
            "https://api.x.com/v1/users"
        );
    }

    #[test]
    fn url_one_side_verbatim() {
        assert_eq!(resolve_url(Some("https://a.io/"), None), "https://a.io/");
        assert_eq!(resolve_url(None, Some("/v1/x")), "/v1/x");
        assert_eq!(resolve_url(Some(""), Some("/v1/x")), "/v1/x");
    }

    #[test]
    fn url_neither_side_is_empty() {
        assert_eq!(resolve_url(None, None), "");
    }

    #[test]
    fn user_header_overrides_account_default() {
        let acct = account(None, vec![kv("A", "1")]);
        let merged = merge_headers(&acct, &method(None), &[kv("A", "2")]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.get("A").map(String::as_str), Some("2"));
    }

    #[test]
    fn duplicate_account_headers_last_wins() {
        let acct = account(None, vec![kv("X-Env", "dev"), kv("X-Env", "prod")]);
        let merged = merge_headers(&acct, &method(None), &[]);
        assert_eq!(merged.get("X-Env").map(String::as_str), Some("prod"));
    }

    #[test]
    fn header_keys_are_case_sensitive() {
        let acct = account(None, vec![kv("Accept", "text/plain")]);
        let merged = merge_headers(&acct, &method(None), &[kv("accept", "application/json")]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn trailing_empty_editing_row_is_not_sent() {
        let acct = account(None, vec![]);
        let merged = merge_headers(&acct, &method(None), &[kv("Auth", "t"), kv("", "")]);
        assert_eq!(merged.len(), 1);
        assert!(merged.contains_key("Auth"));
    }

    #[test]
    fn empty_key_query_rows_dropped_silently() {
        let params = merge_query_params(&method(None), &[kv("", "x"), kv("q", "rust"), kv("  ", "y")]);
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("q").map(String::as_str), Some("rust"));
    }

    #[test]
    fn user_query_overrides_method_default() {
        let mut m = method(None);
        m.default_query_params = vec![kv("limit", "10"), kv("sort", "asc")];
        let params = merge_query_params(&m, &[kv("limit", "99")]);
        assert_eq!(params.get("limit").map(String::as_str), Some("99"));
        assert_eq!(params.get("sort").map(String::as_str), Some("asc"));
    }

    #[test]
    fn malformed_body_is_sent_raw() {
        assert_eq!(
            parse_body(Some("{\"a\": ")),
            Some(Payload::Raw("{\"a\": ".to_string()))
        );
        assert_eq!(parse_body(None), None);
    }

    #[test]
    fn compose_full_request() {
        let acct = account(Some("https://api.x.com/"), vec![kv("Authorization", "Bearer a")]);
        let mut m = method(Some("/v1/users"));
        m.http_verb = "post".to_string();
        let edits = UserEdits {
            headers: vec![kv("X-Trace", "1"), kv("", "")],
            query_params: vec![kv("page", "2")],
            body: Some(r#"{"name":"ada"}"#.to_string()),
            url: None,
            pagination: Some(PaginationPolicy::default()),
        };

        let spec = compose_request(&acct, &m, &edits);

        assert_eq!(spec.verb, HttpVerb::Post);
        assert_eq!(spec.url, "https://api.x.com/v1/users");
        assert_eq!(spec.headers.len(), 2);
        assert_eq!(spec.query_params.get("page").map(String::as_str), Some("2"));
        assert_eq!(
            spec.body,
            Some(Payload::Json(serde_json::json!({"name": "ada"})))
        );
        assert!(spec.active_pagination().is_some());
    }

    #[test]
    fn explicit_user_url_wins() {
        let acct = account(Some("https://api.x.com"), vec![]);
        let edits = UserEdits {
            url: Some("https://staging.x.com/v2/users".to_string()),
            ..Default::default()
        };
        let spec = compose_request(&acct, &method(Some("v1/users")), &edits);
        assert_eq!(spec.url, "https://staging.x.com/v2/users");
    }
}
