/// All errors that can be returned by a platform store implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No namespace record with the given id.
    #[error("namespace not found: {namespace_id}")]
    NamespaceNotFound { namespace_id: String },

    /// No method record with the given id.
    #[error("method not found: {method_id}")]
    MethodNotFound { method_id: String },

    /// No saved schema with the given id.
    #[error("schema not found: {schema_id}")]
    SchemaNotFound { schema_id: String },

    /// A backend-specific failure (network, HTTP status, serialization, etc.).
    #[error("store backend error: {0}")]
    Backend(String),
}
