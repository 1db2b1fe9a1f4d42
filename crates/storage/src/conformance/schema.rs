use std::future::Future;

use super::{expect_eq, fresh, make_schema_payload, ConformanceFixtures, TestResult};
use crate::{PlatformStore, StoreError};

pub(super) async fn run_schema_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: PlatformStore,
    F: Fn(ConformanceFixtures) -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "schema",
            "created_schema_readable_by_id",
            created_schema_readable_by_id(factory).await,
        ),
        TestResult::from_result(
            "schema",
            "created_schemas_get_distinct_ids",
            created_schemas_get_distinct_ids(factory).await,
        ),
        TestResult::from_result(
            "schema",
            "get_unknown_schema",
            get_unknown_schema(factory).await,
        ),
    ]
}

async fn created_schema_readable_by_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PlatformStore,
    F: Fn(ConformanceFixtures) -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await;
    let payload = make_schema_payload("orders response");
    let schema_id = s
        .create_schema(payload.clone())
        .await
        .map_err(|e| format!("create_schema failed: {}", e))?;
    if schema_id.is_empty() {
        return Err("create_schema returned an empty id".to_string());
    }

    let saved = s
        .get_schema(&schema_id)
        .await
        .map_err(|e| format!("get_schema failed: {}", e))?;
    expect_eq("saved", saved, payload.into_saved(schema_id))
}

async fn created_schemas_get_distinct_ids<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PlatformStore,
    F: Fn(ConformanceFixtures) -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await;
    let first = s
        .create_schema(make_schema_payload("a"))
        .await
        .map_err(|e| e.to_string())?;
    let second = s
        .create_schema(make_schema_payload("a"))
        .await
        .map_err(|e| e.to_string())?;
    if first == second {
        return Err(format!("both schemas were assigned id '{}'", first));
    }
    Ok(())
}

async fn get_unknown_schema<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PlatformStore,
    F: Fn(ConformanceFixtures) -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await;
    match s.get_schema("schema-missing").await {
        Err(StoreError::SchemaNotFound { schema_id }) => {
            expect_eq("schema_id", schema_id.as_str(), "schema-missing")
        }
        other => Err(format!("expected SchemaNotFound, got {:?}", other)),
    }
}
