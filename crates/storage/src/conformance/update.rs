use std::future::Future;

use super::{expect_eq, fresh, ConformanceFixtures, TestResult, METHOD_CREATE, METHOD_LIST, NS_MAIN};
use crate::{NamespaceRecord, PlatformStore, StoreError};

pub(super) async fn run_update_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: PlatformStore,
    F: Fn(ConformanceFixtures) -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "update",
            "namespace_update_overwrites_schema_ids",
            namespace_update_overwrites_schema_ids(factory).await,
        ),
        TestResult::from_result(
            "update",
            "namespace_update_preserves_extra_fields",
            namespace_update_preserves_extra_fields(factory).await,
        ),
        TestResult::from_result(
            "update",
            "namespace_update_unknown_id",
            namespace_update_unknown_id(factory).await,
        ),
        TestResult::from_result(
            "update",
            "concurrent_namespace_updates_last_writer_wins",
            concurrent_namespace_updates_last_writer_wins(factory).await,
        ),
        TestResult::from_result(
            "update",
            "method_update_sets_schema_id",
            method_update_sets_schema_id(factory).await,
        ),
        TestResult::from_result(
            "update",
            "method_update_preserves_extra_fields",
            method_update_preserves_extra_fields(factory).await,
        ),
        TestResult::from_result(
            "update",
            "method_update_leaves_other_methods",
            method_update_leaves_other_methods(factory).await,
        ),
        TestResult::from_result(
            "update",
            "method_update_unknown_id",
            method_update_unknown_id(factory).await,
        ),
    ]
}

async fn namespace_update_overwrites_schema_ids<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PlatformStore,
    F: Fn(ConformanceFixtures) -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await;
    let mut namespace = s.get_namespace(NS_MAIN).await.map_err(|e| e.to_string())?;
    namespace.schema_ids.push("schema-new".to_string());
    namespace.schema_ids.push("schema-new".to_string());
    s.update_namespace(NS_MAIN, namespace)
        .await
        .map_err(|e| format!("update_namespace failed: {}", e))?;

    let stored = s.get_namespace(NS_MAIN).await.map_err(|e| e.to_string())?;
    expect_eq(
        "schema_ids",
        stored.schema_ids,
        vec![
            "schema-existing".to_string(),
            "schema-new".to_string(),
            "schema-new".to_string(),
        ],
    )
}

async fn namespace_update_preserves_extra_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PlatformStore,
    F: Fn(ConformanceFixtures) -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await;
    let namespace = s.get_namespace(NS_MAIN).await.map_err(|e| e.to_string())?;
    s.update_namespace(NS_MAIN, namespace)
        .await
        .map_err(|e| format!("update_namespace failed: {}", e))?;

    let stored = s.get_namespace(NS_MAIN).await.map_err(|e| e.to_string())?;
    expect_eq(
        "tableNames",
        stored.extra.get("tableNames").cloned(),
        Some(serde_json::json!(["orders", "customers"])),
    )
}

async fn namespace_update_unknown_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PlatformStore,
    F: Fn(ConformanceFixtures) -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await;
    match s
        .update_namespace("ns-missing", NamespaceRecord::new("ns-missing", "ghost"))
        .await
    {
        Err(StoreError::NamespaceNotFound { .. }) => Ok(()),
        other => Err(format!("expected NamespaceNotFound, got {:?}", other)),
    }
}

// Two read-modify-write cycles that both read before either writes: the
// second write replaces the first, so one appended id is lost.
async fn concurrent_namespace_updates_last_writer_wins<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: PlatformStore,
    F: Fn(ConformanceFixtures) -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await;
    let mut first = s.get_namespace(NS_MAIN).await.map_err(|e| e.to_string())?;
    let mut second = s.get_namespace(NS_MAIN).await.map_err(|e| e.to_string())?;

    first.schema_ids.push("schema-a".to_string());
    second.schema_ids.push("schema-b".to_string());
    s.update_namespace(NS_MAIN, first)
        .await
        .map_err(|e| e.to_string())?;
    s.update_namespace(NS_MAIN, second)
        .await
        .map_err(|e| e.to_string())?;

    let stored = s.get_namespace(NS_MAIN).await.map_err(|e| e.to_string())?;
    expect_eq(
        "schema_ids",
        stored.schema_ids,
        vec!["schema-existing".to_string(), "schema-b".to_string()],
    )
}

async fn method_update_sets_schema_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PlatformStore,
    F: Fn(ConformanceFixtures) -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await;
    let mut method = s.get_method(METHOD_LIST).await.map_err(|e| e.to_string())?;
    let before = method.clone();
    method.schema_id = Some("schema-9".to_string());
    s.update_method(METHOD_LIST, method)
        .await
        .map_err(|e| format!("update_method failed: {}", e))?;

    let stored = s.get_method(METHOD_LIST).await.map_err(|e| e.to_string())?;
    expect_eq("schema_id", stored.schema_id.as_deref(), Some("schema-9"))?;
    expect_eq("name", stored.name, before.name)?;
    expect_eq(
        "default_query_params",
        stored.default_query_params,
        before.default_query_params,
    )
}

async fn method_update_preserves_extra_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PlatformStore,
    F: Fn(ConformanceFixtures) -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await;
    let mut method = s.get_method(METHOD_LIST).await.map_err(|e| e.to_string())?;
    expect_eq(
        "tags before update",
        method.extra.get("tags").cloned(),
        Some(serde_json::json!(["orders"])),
    )?;
    method.schema_id = Some("schema-9".to_string());
    s.update_method(METHOD_LIST, method)
        .await
        .map_err(|e| e.to_string())?;

    let stored = s.get_method(METHOD_LIST).await.map_err(|e| e.to_string())?;
    expect_eq(
        "namespaceId",
        stored.extra.get("namespaceId").cloned(),
        Some(serde_json::json!(NS_MAIN)),
    )?;
    expect_eq(
        "tags",
        stored.extra.get("tags").cloned(),
        Some(serde_json::json!(["orders"])),
    )
}

async fn method_update_leaves_other_methods<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PlatformStore,
    F: Fn(ConformanceFixtures) -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await;
    let mut method = s.get_method(METHOD_LIST).await.map_err(|e| e.to_string())?;
    method.schema_id = Some("schema-9".to_string());
    s.update_method(METHOD_LIST, method)
        .await
        .map_err(|e| e.to_string())?;

    let other = s.get_method(METHOD_CREATE).await.map_err(|e| e.to_string())?;
    expect_eq("other schema_id", other.schema_id, None)
}

async fn method_update_unknown_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PlatformStore,
    F: Fn(ConformanceFixtures) -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await;
    let ghost = apiprobe_core::MethodConfig {
        method_id: "m-missing".to_string(),
        ..Default::default()
    };
    match s.update_method("m-missing", ghost).await {
        Err(StoreError::MethodNotFound { .. }) => Ok(()),
        other => Err(format!("expected MethodNotFound, got {:?}", other)),
    }
}
