//! HttpPlatformStore against a local axum server standing in for the
//! platform REST API.

use std::sync::{Arc, Mutex};

use apiprobe_core::infer;
use apiprobe_storage::{
    AccountStore, HttpPlatformStore, MethodStore, NamespaceStore, SchemaPayload, SchemaStore,
    StoreError, RESPONSE_SCHEMA_TYPE,
};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

#[derive(Clone, Default)]
struct Platform {
    writes: Arc<Mutex<Vec<(String, Value)>>>,
}

async fn accounts(headers: HeaderMap, Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "Bearer secret")
        .unwrap_or(false);
    if !authorized {
        return Err(StatusCode::UNAUTHORIZED);
    }
    if id != "ns-1" {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(json!([
        {"accountId": "a-1", "name": "prod", "urlOverride": "https://api.x.com/",
         "defaultHeaders": [{"key": "Accept", "value": "application/json"}]}
    ])))
}

async fn get_method(Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
    match id.as_str() {
        "m-1" => Ok(Json(json!({
            "methodId": "m-1",
            "httpVerb": "GET",
            "urlOverride": "/v1/users",
            "namespaceId": "ns-1",
            "tags": ["users"],
            "sampleRequest": {"limit": 5}
        }))),
        "orders/list" => Ok(Json(json!({
            "methodId": "orders/list",
            "httpVerb": "GET",
            "namespaceId": "ns-1"
        }))),
        _ => Err(StatusCode::NOT_FOUND),
    }
}

async fn put_method(
    State(platform): State<Platform>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    platform
        .writes
        .lock()
        .unwrap()
        .push((format!("methods/{}", id), body));
    StatusCode::NO_CONTENT
}

async fn get_namespace(Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
    if id == "ns-1" {
        Ok(Json(json!({"namespaceId": "ns-1", "name": "core", "schemaIds": ["s-0"], "region": "eu"})))
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

async fn put_namespace(
    State(platform): State<Platform>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    platform
        .writes
        .lock()
        .unwrap()
        .push((format!("namespaces/{}", id), body));
    StatusCode::OK
}

async fn create_schema(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    assert_eq!(body["schemaType"], json!("response"));
    (StatusCode::CREATED, Json(json!({"schemaId": "schema-77"})))
}

async fn get_schema(Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
    Err(if id == "broken" {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::NOT_FOUND
    })
}

async fn spawn_platform() -> (String, Platform) {
    let platform = Platform::default();
    let app = Router::new()
        .route("/namespaces/{id}/accounts", get(accounts))
        .route("/namespaces/{id}", get(get_namespace).put(put_namespace))
        .route("/methods/{id}", get(get_method).put(put_method))
        .route("/schemas", post(create_schema))
        .route("/schemas/{id}", get(get_schema))
        .with_state(platform.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/", addr), platform)
}

#[tokio::test]
async fn reads_accounts_with_bearer_token() {
    let (base, _) = spawn_platform().await;
    let store = HttpPlatformStore::new(&base).with_auth_token("secret");

    let accounts = store.accounts_for_namespace("ns-1").await.unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].account_id, "a-1");
    assert_eq!(accounts[0].default_headers[0].key, "Accept");
}

#[tokio::test]
async fn missing_token_is_backend_error() {
    let (base, _) = spawn_platform().await;
    let store = HttpPlatformStore::new(&base);

    let err = store.accounts_for_namespace("ns-1").await.unwrap_err();
    assert!(matches!(err, StoreError::Backend(msg) if msg.contains("401")));
}

#[tokio::test]
async fn not_found_maps_to_typed_errors() {
    let (base, _) = spawn_platform().await;
    let store = HttpPlatformStore::new(&base);

    assert_eq!(
        store.get_method("m-404").await.unwrap_err(),
        StoreError::MethodNotFound {
            method_id: "m-404".to_string()
        }
    );
    assert_eq!(
        store.get_schema("s-404").await.unwrap_err(),
        StoreError::SchemaNotFound {
            schema_id: "s-404".to_string()
        }
    );
    assert!(matches!(
        store.get_schema("broken").await.unwrap_err(),
        StoreError::Backend(_)
    ));
}

#[tokio::test]
async fn method_write_back_sends_full_record() {
    let (base, platform) = spawn_platform().await;
    let store = HttpPlatformStore::new(&base);

    let mut method = store.get_method("m-1").await.unwrap();
    assert_eq!(method.name, "");
    method.schema_id = Some("schema-77".to_string());
    store.update_method("m-1", method).await.unwrap();

    let writes = platform.writes.lock().unwrap().clone();
    assert_eq!(writes.len(), 1);
    let (path, body) = &writes[0];
    assert_eq!(path, "methods/m-1");
    assert_eq!(body["schemaId"], json!("schema-77"));
    assert_eq!(body["urlOverride"], json!("/v1/users"));
    assert_eq!(body["saveData"], json!(false));
    assert_eq!(body["defaultHeaders"], json!([]));
    assert_eq!(body["namespaceId"], json!("ns-1"));
    assert_eq!(body["tags"], json!(["users"]));
    assert_eq!(body["sampleRequest"], json!({"limit": 5}));
}

#[tokio::test]
async fn ids_with_reserved_characters_stay_one_segment() {
    let (base, platform) = spawn_platform().await;
    let store = HttpPlatformStore::new(&base);

    let mut method = store.get_method("orders/list").await.unwrap();
    assert_eq!(method.method_id, "orders/list");
    method.schema_id = Some("schema-77".to_string());
    store.update_method("orders/list", method).await.unwrap();

    let writes = platform.writes.lock().unwrap().clone();
    let (path, body) = &writes[0];
    assert_eq!(path, "methods/orders/list");
    assert_eq!(body["urlOverride"], json!(""));
    assert_eq!(body["namespaceId"], json!("ns-1"));

    assert_eq!(
        store.get_method("m-1?x=1").await.unwrap_err(),
        StoreError::MethodNotFound {
            method_id: "m-1?x=1".to_string()
        }
    );
}

#[tokio::test]
async fn one_store_serves_many_calls() {
    let (base, _) = spawn_platform().await;
    let store = HttpPlatformStore::new(&base)
        .with_auth_token("secret")
        .with_timeout(std::time::Duration::from_secs(5));

    for _ in 0..5 {
        assert_eq!(store.get_method("m-1").await.unwrap().method_id, "m-1");
        assert_eq!(store.accounts_for_namespace("ns-1").await.unwrap().len(), 1);
    }
}

#[tokio::test]
async fn namespace_write_back_keeps_unknown_fields() {
    let (base, platform) = spawn_platform().await;
    let store = HttpPlatformStore::new(&base);

    let mut namespace = store.get_namespace("ns-1").await.unwrap();
    namespace.schema_ids.push("schema-77".to_string());
    store.update_namespace("ns-1", namespace).await.unwrap();

    let writes = platform.writes.lock().unwrap().clone();
    let (_, body) = &writes[0];
    assert_eq!(body["schemaIds"], json!(["s-0", "schema-77"]));
    assert_eq!(body["region"], json!("eu"));
}

#[tokio::test]
async fn create_schema_returns_assigned_id() {
    let (base, _) = spawn_platform().await;
    let store = HttpPlatformStore::new(&base);

    let payload = SchemaPayload {
        schema_name: "users".to_string(),
        method_id: "m-1".to_string(),
        namespace_id: "ns-1".to_string(),
        schema_type: RESPONSE_SCHEMA_TYPE.to_string(),
        shape: infer(&json!({"id": 1})),
        is_array: false,
        source_url: "https://api.x.com/v1/users".to_string(),
    };
    assert_eq!(store.create_schema(payload).await.unwrap(), "schema-77");
}
