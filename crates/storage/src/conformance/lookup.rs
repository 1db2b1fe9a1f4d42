use std::future::Future;

use super::{expect_eq, fresh, ConformanceFixtures, TestResult, METHOD_LIST, NS_EMPTY, NS_MAIN};
use crate::{PlatformStore, StoreError};

pub(super) async fn run_lookup_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: PlatformStore,
    F: Fn(ConformanceFixtures) -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "lookup",
            "accounts_listed_in_platform_order",
            accounts_listed_in_platform_order(factory).await,
        ),
        TestResult::from_result(
            "lookup",
            "namespace_without_accounts_is_empty",
            namespace_without_accounts_is_empty(factory).await,
        ),
        TestResult::from_result(
            "lookup",
            "accounts_for_unknown_namespace",
            accounts_for_unknown_namespace(factory).await,
        ),
        TestResult::from_result(
            "lookup",
            "get_method_returns_seeded_record",
            get_method_returns_seeded_record(factory).await,
        ),
        TestResult::from_result(
            "lookup",
            "get_unknown_method",
            get_unknown_method(factory).await,
        ),
        TestResult::from_result(
            "lookup",
            "get_namespace_returns_seeded_record",
            get_namespace_returns_seeded_record(factory).await,
        ),
        TestResult::from_result(
            "lookup",
            "get_unknown_namespace",
            get_unknown_namespace(factory).await,
        ),
    ]
}

async fn accounts_listed_in_platform_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PlatformStore,
    F: Fn(ConformanceFixtures) -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await;
    let accounts = s
        .accounts_for_namespace(NS_MAIN)
        .await
        .map_err(|e| format!("accounts_for_namespace failed: {}", e))?;
    let ids: Vec<&str> = accounts.iter().map(|a| a.account_id.as_str()).collect();
    expect_eq("account ids", ids, vec!["acct-prod", "acct-sandbox"])
}

async fn namespace_without_accounts_is_empty<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PlatformStore,
    F: Fn(ConformanceFixtures) -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await;
    let accounts = s
        .accounts_for_namespace(NS_EMPTY)
        .await
        .map_err(|e| format!("accounts_for_namespace failed: {}", e))?;
    expect_eq("account count", accounts.len(), 0)
}

async fn accounts_for_unknown_namespace<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PlatformStore,
    F: Fn(ConformanceFixtures) -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await;
    match s.accounts_for_namespace("ns-missing").await {
        Err(StoreError::NamespaceNotFound { namespace_id }) => {
            expect_eq("namespace_id", namespace_id.as_str(), "ns-missing")
        }
        other => Err(format!("expected NamespaceNotFound, got {:?}", other)),
    }
}

async fn get_method_returns_seeded_record<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PlatformStore,
    F: Fn(ConformanceFixtures) -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await;
    let method = s
        .get_method(METHOD_LIST)
        .await
        .map_err(|e| format!("get_method failed: {}", e))?;
    expect_eq("http_verb", method.http_verb.as_str(), "GET")?;
    expect_eq("url_override", method.url_override.as_deref(), Some("/v1/orders"))?;
    expect_eq("schema_id", method.schema_id, None)
}

async fn get_unknown_method<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PlatformStore,
    F: Fn(ConformanceFixtures) -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await;
    match s.get_method("m-missing").await {
        Err(StoreError::MethodNotFound { method_id }) => {
            expect_eq("method_id", method_id.as_str(), "m-missing")
        }
        other => Err(format!("expected MethodNotFound, got {:?}", other)),
    }
}

async fn get_namespace_returns_seeded_record<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PlatformStore,
    F: Fn(ConformanceFixtures) -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await;
    let namespace = s
        .get_namespace(NS_MAIN)
        .await
        .map_err(|e| format!("get_namespace failed: {}", e))?;
    expect_eq(
        "schema_ids",
        namespace.schema_ids,
        vec!["schema-existing".to_string()],
    )
}

async fn get_unknown_namespace<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PlatformStore,
    F: Fn(ConformanceFixtures) -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await;
    match s.get_namespace("ns-missing").await {
        Err(StoreError::NamespaceNotFound { .. }) => Ok(()),
        other => Err(format!("expected NamespaceNotFound, got {:?}", other)),
    }
}
