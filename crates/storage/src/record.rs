use apiprobe_core::InferredSchema;
use serde::{Deserialize, Serialize};

/// `schemaType` of every schema saved from a method test.
pub const RESPONSE_SCHEMA_TYPE: &str = "response";

/// A namespace as stored by the platform.
///
/// Only `schemaIds` is touched by the test bench; every other field is
/// carried through `extra` so a read-modify-write round trip preserves it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceRecord {
    pub namespace_id: String,
    #[serde(default)]
    pub name: String,
    /// Not deduplicated: saving twice appends twice.
    #[serde(default)]
    pub schema_ids: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl NamespaceRecord {
    pub fn new(namespace_id: impl Into<String>, name: impl Into<String>) -> Self {
        NamespaceRecord {
            namespace_id: namespace_id.into(),
            name: name.into(),
            schema_ids: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }
}

/// A schema to be created; the store assigns its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaPayload {
    pub schema_name: String,
    pub method_id: String,
    pub namespace_id: String,
    pub schema_type: String,
    pub shape: InferredSchema,
    /// Whether the sampled response was a top-level JSON array.
    pub is_array: bool,
    #[serde(default)]
    pub source_url: String,
}

impl SchemaPayload {
    /// Attach the id assigned by the store.
    pub fn into_saved(self, schema_id: impl Into<String>) -> SavedSchema {
        SavedSchema {
            schema_id: schema_id.into(),
            schema_name: self.schema_name,
            method_id: self.method_id,
            namespace_id: self.namespace_id,
            schema_type: self.schema_type,
            shape: self.shape,
            is_array: self.is_array,
            source_url: self.source_url,
        }
    }
}

/// A persisted response schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSchema {
    pub schema_id: String,
    pub schema_name: String,
    pub method_id: String,
    pub namespace_id: String,
    pub schema_type: String,
    pub shape: InferredSchema,
    pub is_array: bool,
    #[serde(default)]
    pub source_url: String,
}
