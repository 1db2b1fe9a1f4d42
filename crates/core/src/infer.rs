//! Response-schema inference from a single JSON sample.
//!
//! Two simplifications are deliberate and must not be "fixed":
//!
//! - arrays are described by their **first** element only; an empty array
//!   gets an empty object as its item schema
//! - `required` lists the keys whose value was non-null in this one sample
//!
//! Heterogeneous arrays therefore produce a schema that only matches their
//! first element.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A structural description of a JSON value's shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum InferredSchema {
    Null,
    Array {
        items: Box<InferredSchema>,
    },
    Object {
        properties: BTreeMap<String, InferredSchema>,
        required: BTreeSet<String>,
    },
    Primitive {
        #[serde(rename = "primitiveType")]
        primitive_type: String,
    },
}

impl InferredSchema {
    /// `{kind: "object", properties: {}, required: {}}`.
    pub fn empty_object() -> Self {
        InferredSchema::Object {
            properties: BTreeMap::new(),
            required: BTreeSet::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InferredSchema::Null => "null",
            InferredSchema::Array { .. } => "array",
            InferredSchema::Object { .. } => "object",
            InferredSchema::Primitive { .. } => "primitive",
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, InferredSchema::Array { .. })
    }

    /// Render as a JSON-Schema-style document for display.
    pub fn to_json_schema(&self) -> Value {
        match self {
            InferredSchema::Null => serde_json::json!({ "type": "null" }),
            InferredSchema::Array { items } => serde_json::json!({
                "type": "array",
                "items": items.to_json_schema(),
            }),
            InferredSchema::Object {
                properties,
                required,
            } => {
                let props: serde_json::Map<String, Value> = properties
                    .iter()
                    .map(|(key, schema)| (key.clone(), schema.to_json_schema()))
                    .collect();
                serde_json::json!({
                    "type": "object",
                    "properties": props,
                    "required": required.iter().collect::<Vec<_>>(),
                })
            }
            InferredSchema::Primitive { primitive_type } => {
                serde_json::json!({ "type": primitive_type })
            }
        }
    }
}

/// Runtime type name of a JSON primitive.
fn primitive_type_name(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        // Callers only pass primitives.
        Value::Null => "null",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Infer the structural schema of `value`. Total, deterministic and
/// non-mutating.
pub fn infer(value: &Value) -> InferredSchema {
    match value {
        Value::Null => InferredSchema::Null,
        Value::Array(elements) => {
            let items = match elements.first() {
                Some(first) => infer(first),
                None => InferredSchema::empty_object(),
            };
            InferredSchema::Array {
                items: Box::new(items),
            }
        }
        Value::Object(map) => {
            let mut properties = BTreeMap::new();
            let mut required = BTreeSet::new();
            for (key, child) in map {
                properties.insert(key.clone(), infer(child));
                if !child.is_null() {
                    required.insert(key.clone());
                }
            }
            InferredSchema::Object {
                properties,
                required,
            }
        }
        primitive => InferredSchema::Primitive {
            primitive_type: primitive_type_name(primitive).to_string(),
        },
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
