//! Conformance test suite for platform store backends.
//!
//! Any backend implementing [`PlatformStore`] can run this suite to check
//! it behaves the way the test bench expects:
//!
//! - **Lookup**: seeded records are readable, unknown ids give typed errors
//! - **Update**: full-record overwrite, unknown fields preserved, last writer wins
//! - **Schema**: created schemas get distinct ids and are readable by id
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory that creates
//! a fresh store seeded with the given fixtures for each test:
//!
//! ```ignore
//! use apiprobe_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn memory_conformance() {
//!     let report = run_conformance_suite(|fixtures| async move {
//!         fixtures.seed_memory()
//!     })
//!     .await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod lookup;
mod schema;
mod update;

use std::fmt;
use std::future::Future;

use apiprobe_core::{AccountConfig, KeyValue, MethodConfig};

use crate::record::{NamespaceRecord, SchemaPayload, RESPONSE_SCHEMA_TYPE};
use crate::{MemoryPlatform, PlatformStore};

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "lookup", "update").
    pub category: String,
    pub name: String,
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: result.is_ok(),
            message: result.err(),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Records every test starts from.
#[derive(Debug, Clone)]
pub struct ConformanceFixtures {
    /// `ns-main` (with one existing schema id and an extra `tableNames`
    /// field) and `ns-empty` (no accounts).
    pub namespaces: Vec<NamespaceRecord>,
    /// Accounts keyed by namespace id; `ns-main` has two.
    pub accounts: Vec<(String, AccountConfig)>,
    /// `m-list` (GET) and `m-create` (POST).
    pub methods: Vec<MethodConfig>,
}

impl ConformanceFixtures {
    pub fn standard() -> Self {
        let mut main = NamespaceRecord::new(NS_MAIN, "main");
        main.schema_ids.push("schema-existing".to_string());
        main.extra.insert(
            "tableNames".to_string(),
            serde_json::json!(["orders", "customers"]),
        );

        ConformanceFixtures {
            namespaces: vec![main, NamespaceRecord::new(NS_EMPTY, "empty")],
            accounts: vec![
                (
                    NS_MAIN.to_string(),
                    AccountConfig {
                        account_id: "acct-prod".to_string(),
                        name: "production".to_string(),
                        url_override: Some("https://api.example.com/".to_string()),
                        default_headers: vec![KeyValue::new("Accept", "application/json")],
                        save_data: true,
                    },
                ),
                (
                    NS_MAIN.to_string(),
                    AccountConfig {
                        account_id: "acct-sandbox".to_string(),
                        name: "sandbox".to_string(),
                        url_override: Some("https://sandbox.example.com".to_string()),
                        default_headers: Vec::new(),
                        save_data: false,
                    },
                ),
            ],
            methods: vec![
                MethodConfig {
                    method_id: METHOD_LIST.to_string(),
                    name: "list orders".to_string(),
                    http_verb: "GET".to_string(),
                    url_override: Some("/v1/orders".to_string()),
                    default_query_params: vec![KeyValue::new("limit", "20")],
                    default_headers: Vec::new(),
                    save_data: true,
                    schema_id: None,
                    extra: serde_json::Map::from_iter([
                        ("namespaceId".to_string(), serde_json::json!(NS_MAIN)),
                        ("tags".to_string(), serde_json::json!(["orders"])),
                    ]),
                },
                MethodConfig {
                    method_id: METHOD_CREATE.to_string(),
                    name: "create order".to_string(),
                    http_verb: "POST".to_string(),
                    url_override: Some("v1/orders".to_string()),
                    ..Default::default()
                },
            ],
        }
    }

    /// Build a [`MemoryPlatform`] holding these fixtures.
    pub fn seed_memory(self) -> MemoryPlatform {
        let mut store = MemoryPlatform::new();
        for namespace in self.namespaces {
            store = store.with_namespace(namespace);
        }
        for (namespace_id, account) in self.accounts {
            store = store.with_account(&namespace_id, account);
        }
        for method in self.methods {
            store = store.with_method(method);
        }
        store
    }
}

const NS_MAIN: &str = "ns-main";
const NS_EMPTY: &str = "ns-empty";
const METHOD_LIST: &str = "m-list";
const METHOD_CREATE: &str = "m-create";

/// Run the full conformance suite against a store backend.
///
/// The `factory` is called once per test with the standard fixtures and must
/// return a fresh store holding exactly those records.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: PlatformStore,
    F: Fn(ConformanceFixtures) -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(lookup::run_lookup_tests(&factory).await);
    results.extend(update::run_update_tests(&factory).await);
    results.extend(schema::run_schema_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

async fn fresh<S, F, Fut>(factory: &F) -> S
where
    F: Fn(ConformanceFixtures) -> Fut,
    Fut: Future<Output = S>,
{
    factory(ConformanceFixtures::standard()).await
}

fn make_schema_payload(name: &str) -> SchemaPayload {
    SchemaPayload {
        schema_name: name.to_string(),
        method_id: METHOD_LIST.to_string(),
        namespace_id: NS_MAIN.to_string(),
        schema_type: RESPONSE_SCHEMA_TYPE.to_string(),
        shape: apiprobe_core::infer(&serde_json::json!([{"id": 1, "note": null}])),
        is_array: true,
        source_url: "https://api.example.com/v1/orders".to_string(),
    }
}

fn expect_eq<T: PartialEq + fmt::Debug>(what: &str, got: T, want: T) -> Result<(), String> {
    if got == want {
        Ok(())
    } else {
        Err(format!("{}: expected {:?}, got {:?}", what, want, got))
    }
}
