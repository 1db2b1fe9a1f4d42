//! Platform REST backend.
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` so callers
//! stay on the async runtime. One agent, and so one connection pool, is
//! shared by every call on a store. Ids are percent-encoded as single path
//! segments. Endpoints:
//!
//! - `GET  {base}/namespaces/{id}/accounts`
//! - `GET  {base}/methods/{id}`, `PUT {base}/methods/{id}`
//! - `GET  {base}/namespaces/{id}`, `PUT {base}/namespaces/{id}`
//! - `POST {base}/schemas` → `{"schemaId": "..."}`, `GET {base}/schemas/{id}`

use std::time::Duration;

use apiprobe_core::{AccountConfig, MethodConfig};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::error::StoreError;
use crate::record::{NamespaceRecord, SavedSchema, SchemaPayload};
use crate::traits::{AccountStore, MethodStore, NamespaceStore, SchemaStore};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Store backend talking to the platform's REST API.
#[derive(Debug, Clone)]
pub struct HttpPlatformStore {
    base_url: String,
    auth_token: Option<String>,
    agent: ureq::Agent,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedSchema {
    schema_id: String,
}

impl HttpPlatformStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpPlatformStore {
            base_url: base_url.into(),
            auth_token: None,
            agent: build_agent(DEFAULT_TIMEOUT),
        }
    }

    /// Send `Authorization: Bearer <token>` on every call.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    /// The base URL extended by `segments`, each encoded as one path
    /// segment (`/`, `?` and `#` inside an id are escaped).
    pub fn endpoint(&self, segments: &[&str]) -> Result<String, StoreError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            StoreError::Backend(format!("invalid platform URL '{}': {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|()| {
                StoreError::Backend(format!("platform URL '{}' cannot take a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url.into())
    }

    /// Issue one call and return `(status, body text)`.
    async fn call(
        &self,
        method: &'static str,
        segments: &[&str],
        body: Option<serde_json::Value>,
    ) -> Result<(u16, String), StoreError> {
        let url = self.endpoint(segments)?;
        let token = self.auth_token.clone();
        let agent = self.agent.clone();

        tracing::debug!(method, url = %url, "platform store call");

        tokio::task::spawn_blocking(move || -> Result<(u16, String), StoreError> {
            let mut builder = ureq::http::Request::builder()
                .method(method)
                .uri(url.as_str())
                .header("accept", "application/json");
            if let Some(token) = &token {
                builder = builder.header("authorization", format!("Bearer {}", token));
            }

            let response = match body {
                Some(json) => {
                    let request = builder
                        .header("content-type", "application/json")
                        .body(json.to_string())
                        .map_err(|e| StoreError::Backend(format!("bad request: {}", e)))?;
                    agent.run(request)
                }
                None => {
                    let request = builder
                        .body(())
                        .map_err(|e| StoreError::Backend(format!("bad request: {}", e)))?;
                    agent.run(request)
                }
            }
            .map_err(|e| StoreError::Backend(format!("{} {} failed: {}", method, url, e)))?;

            let status = response.status().as_u16();
            let text = response
                .into_body()
                .read_to_string()
                .map_err(|e| StoreError::Backend(format!("failed to read response: {}", e)))?;
            Ok((status, text))
        })
        .await
        .map_err(|e| StoreError::Backend(format!("task join error: {}", e)))?
    }

    /// Map a non-2xx status to an error; 404 becomes `not_found`.
    fn check_status(status: u16, text: &str, not_found: StoreError) -> Result<(), StoreError> {
        match status {
            200..=299 => Ok(()),
            404 => Err(not_found),
            _ => Err(StoreError::Backend(format!(
                "platform returned {}: {}",
                status, text
            ))),
        }
    }

    fn decode<T: DeserializeOwned>(text: &str) -> Result<T, StoreError> {
        serde_json::from_str(text)
            .map_err(|e| StoreError::Backend(format!("invalid response body: {}", e)))
    }

    fn encode<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, StoreError> {
        serde_json::to_value(value)
            .map_err(|e| StoreError::Backend(format!("failed to encode request: {}", e)))
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(Some(timeout))
        .build();
    ureq::Agent::new_with_config(config)
}

fn namespace_not_found(namespace_id: &str) -> StoreError {
    StoreError::NamespaceNotFound {
        namespace_id: namespace_id.to_string(),
    }
}

fn method_not_found(method_id: &str) -> StoreError {
    StoreError::MethodNotFound {
        method_id: method_id.to_string(),
    }
}

#[async_trait]
impl AccountStore for HttpPlatformStore {
    async fn accounts_for_namespace(
        &self,
        namespace_id: &str,
    ) -> Result<Vec<AccountConfig>, StoreError> {
        let (status, text) = self
            .call("GET", &["namespaces", namespace_id, "accounts"], None)
            .await?;
        Self::check_status(status, &text, namespace_not_found(namespace_id))?;
        Self::decode(&text)
    }
}

#[async_trait]
impl MethodStore for HttpPlatformStore {
    async fn get_method(&self, method_id: &str) -> Result<MethodConfig, StoreError> {
        let (status, text) = self
            .call("GET", &["methods", method_id], None)
            .await?;
        Self::check_status(status, &text, method_not_found(method_id))?;
        Self::decode(&text)
    }

    async fn update_method(
        &self,
        method_id: &str,
        method: MethodConfig,
    ) -> Result<(), StoreError> {
        let body = Self::encode(&method)?;
        let (status, text) = self
            .call("PUT", &["methods", method_id], Some(body))
            .await?;
        Self::check_status(status, &text, method_not_found(method_id))
    }
}

#[async_trait]
impl NamespaceStore for HttpPlatformStore {
    async fn get_namespace(&self, namespace_id: &str) -> Result<NamespaceRecord, StoreError> {
        let (status, text) = self
            .call("GET", &["namespaces", namespace_id], None)
            .await?;
        Self::check_status(status, &text, namespace_not_found(namespace_id))?;
        Self::decode(&text)
    }

    async fn update_namespace(
        &self,
        namespace_id: &str,
        namespace: NamespaceRecord,
    ) -> Result<(), StoreError> {
        let body = Self::encode(&namespace)?;
        let (status, text) = self
            .call("PUT", &["namespaces", namespace_id], Some(body))
            .await?;
        Self::check_status(status, &text, namespace_not_found(namespace_id))
    }
}

#[async_trait]
impl SchemaStore for HttpPlatformStore {
    async fn create_schema(&self, payload: SchemaPayload) -> Result<String, StoreError> {
        let body = Self::encode(&payload)?;
        let (status, text) = self
            .call("POST", &["schemas"], Some(body))
            .await?;
        if !(200..300).contains(&status) {
            return Err(StoreError::Backend(format!(
                "platform returned {}: {}",
                status, text
            )));
        }
        let created: CreatedSchema = Self::decode(&text)?;
        Ok(created.schema_id)
    }

    async fn get_schema(&self, schema_id: &str) -> Result<SavedSchema, StoreError> {
        let (status, text) = self
            .call("GET", &["schemas", schema_id], None)
            .await?;
        Self::check_status(
            status,
            &text,
            StoreError::SchemaNotFound {
                schema_id: schema_id.to_string(),
            },
        )?;
        Self::decode(&text)
    }
}
