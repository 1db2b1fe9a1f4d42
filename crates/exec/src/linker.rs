//! Schema persistence linker.
//!
//! Saving is a three-step saga, never a transaction:
//!
//! 1. create the schema record
//! 2. append its id to the namespace's `schemaIds`
//! 3. point the method's `schemaId` at it
//!
//! Steps 2 and 3 are best-effort and independent of each other. Neither
//! rolls back step 1: a schema stays saved even if linking it fails. Both
//! are unsynchronised read-modify-write cycles, so concurrent saves against
//! the same namespace can lose an append (last writer wins).

use std::fmt;
use std::sync::Arc;

use apiprobe_core::{infer, InferredSchema, Payload};
use apiprobe_storage::{
    MethodStore, NamespaceStore, PlatformStore, SavedSchema, SchemaPayload, SchemaStore,
    StoreError, RESPONSE_SCHEMA_TYPE,
};
use serde::Serialize;

/// Everything needed to save one response schema.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveSchemaRequest {
    pub shape: InferredSchema,
    pub method_id: String,
    pub namespace_id: String,
    pub schema_name: String,
    /// Whether the sampled response was a top-level JSON array.
    pub is_array: bool,
    pub source_url: String,
}

impl SaveSchemaRequest {
    /// Build a request from a response body: the shape is the inference of
    /// the whole body. A raw (non-JSON) body is described as a string.
    pub fn from_response(
        body: &Payload,
        method_id: impl Into<String>,
        namespace_id: impl Into<String>,
        schema_name: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        let (shape, is_array) = match body {
            Payload::Json(value) => (infer(value), value.is_array()),
            Payload::Raw(text) => (infer(&serde_json::Value::String(text.clone())), false),
        };
        SaveSchemaRequest {
            shape,
            method_id: method_id.into(),
            namespace_id: namespace_id.into(),
            schema_name: schema_name.into(),
            is_array,
            source_url: source_url.into(),
        }
    }

    fn to_payload(&self) -> SchemaPayload {
        SchemaPayload {
            schema_name: self.schema_name.clone(),
            method_id: self.method_id.clone(),
            namespace_id: self.namespace_id.clone(),
            schema_type: RESPONSE_SCHEMA_TYPE.to_string(),
            shape: self.shape.clone(),
            is_array: self.is_array,
            source_url: self.source_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStep {
    CreateSchema,
    LinkNamespace,
    LinkMethod,
}

impl fmt::Display for SaveStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SaveStep::CreateSchema => "create schema",
            SaveStep::LinkNamespace => "link namespace",
            SaveStep::LinkMethod => "link method",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed(String),
    /// Not attempted because the schema was never created.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: SaveStep,
    pub status: StepStatus,
}

/// Outcome of a save, step by step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveReport {
    /// The persisted schema; `None` only when step 1 failed.
    pub saved: Option<SavedSchema>,
    pub steps: Vec<StepReport>,
}

impl SaveReport {
    pub fn schema_id(&self) -> Option<&str> {
        self.saved.as_ref().map(|s| s.schema_id.as_str())
    }

    pub fn status(&self, step: SaveStep) -> Option<&StepStatus> {
        self.steps
            .iter()
            .find(|r| r.step == step)
            .map(|r| &r.status)
    }

    /// Schema saved and both links written.
    pub fn fully_linked(&self) -> bool {
        self.saved.is_some() && self.steps.iter().all(|r| r.status == StepStatus::Succeeded)
    }

    /// Messages of the failed steps, for display.
    pub fn failures(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter_map(|r| match &r.status {
                StepStatus::Failed(message) => Some(format!("{}: {}", r.step, message)),
                _ => None,
            })
            .collect()
    }
}

pub struct SchemaLinker {
    schemas: Arc<dyn SchemaStore>,
    namespaces: Arc<dyn NamespaceStore>,
    methods: Arc<dyn MethodStore>,
}

impl SchemaLinker {
    pub fn new(
        schemas: Arc<dyn SchemaStore>,
        namespaces: Arc<dyn NamespaceStore>,
        methods: Arc<dyn MethodStore>,
    ) -> Self {
        SchemaLinker {
            schemas,
            namespaces,
            methods,
        }
    }

    /// A linker over one backend implementing every store.
    pub fn for_platform<P: PlatformStore + 'static>(platform: Arc<P>) -> Self {
        SchemaLinker {
            schemas: platform.clone(),
            namespaces: platform.clone(),
            methods: platform,
        }
    }

    /// Run the save saga. Never fails as a whole; see [`SaveReport`].
    pub async fn save(&self, request: &SaveSchemaRequest) -> SaveReport {
        let payload = request.to_payload();
        let schema_id = match self.schemas.create_schema(payload.clone()).await {
            Ok(id) => {
                tracing::info!(
                    schema_id = %id,
                    method_id = %request.method_id,
                    "schema created"
                );
                id
            }
            Err(err) => {
                tracing::warn!(method_id = %request.method_id, error = %err, "schema create failed");
                return SaveReport {
                    saved: None,
                    steps: vec![
                        StepReport {
                            step: SaveStep::CreateSchema,
                            status: StepStatus::Failed(err.to_string()),
                        },
                        StepReport {
                            step: SaveStep::LinkNamespace,
                            status: StepStatus::Skipped,
                        },
                        StepReport {
                            step: SaveStep::LinkMethod,
                            status: StepStatus::Skipped,
                        },
                    ],
                };
            }
        };

        let namespace = self.link_namespace(&request.namespace_id, &schema_id).await;
        log_step(SaveStep::LinkNamespace, &schema_id, &namespace);
        let method = self.link_method(&request.method_id, &schema_id).await;
        log_step(SaveStep::LinkMethod, &schema_id, &method);

        SaveReport {
            saved: Some(payload.into_saved(schema_id)),
            steps: vec![
                StepReport {
                    step: SaveStep::CreateSchema,
                    status: StepStatus::Succeeded,
                },
                StepReport {
                    step: SaveStep::LinkNamespace,
                    status: step_status(namespace),
                },
                StepReport {
                    step: SaveStep::LinkMethod,
                    status: step_status(method),
                },
            ],
        }
    }

    async fn link_namespace(&self, namespace_id: &str, schema_id: &str) -> Result<(), StoreError> {
        let mut namespace = self.namespaces.get_namespace(namespace_id).await?;
        namespace.schema_ids.push(schema_id.to_string());
        self.namespaces
            .update_namespace(namespace_id, namespace)
            .await
    }

    async fn link_method(&self, method_id: &str, schema_id: &str) -> Result<(), StoreError> {
        let mut method = self.methods.get_method(method_id).await?;
        method.schema_id = Some(schema_id.to_string());
        self.methods.update_method(method_id, method).await
    }
}

fn step_status(result: Result<(), StoreError>) -> StepStatus {
    match result {
        Ok(()) => StepStatus::Succeeded,
        Err(err) => StepStatus::Failed(err.to_string()),
    }
}

fn log_step(step: SaveStep, schema_id: &str, result: &Result<(), StoreError>) {
    match result {
        Ok(()) => tracing::info!(%step, schema_id, "schema link written"),
        Err(err) => tracing::warn!(%step, schema_id, error = %err, "schema link failed; schema kept"),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
