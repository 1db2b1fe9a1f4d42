use apiprobe_core::{AccountConfig, MethodConfig};
use async_trait::async_trait;

use crate::error::StoreError;
use crate::record::{NamespaceRecord, SavedSchema, SchemaPayload};

/// Read-only access to the accounts configured for a namespace.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// All accounts usable by methods in the namespace, in platform order.
    ///
    /// An unknown namespace yields `Err(StoreError::NamespaceNotFound)`.
    async fn accounts_for_namespace(
        &self,
        namespace_id: &str,
    ) -> Result<Vec<AccountConfig>, StoreError>;
}

/// Method records. The test bench only ever changes `schema_id`.
#[async_trait]
pub trait MethodStore: Send + Sync {
    /// Returns `Err(StoreError::MethodNotFound)` if no such method exists.
    async fn get_method(&self, method_id: &str) -> Result<MethodConfig, StoreError>;

    /// Overwrite the method record. The caller passes the full record it read,
    /// with its changes applied.
    async fn update_method(&self, method_id: &str, method: MethodConfig)
        -> Result<(), StoreError>;
}

/// Namespace records.
///
/// There is no compare-and-swap: `update_namespace` overwrites whatever is
/// stored, so two concurrent read-modify-write cycles can lose an update.
#[async_trait]
pub trait NamespaceStore: Send + Sync {
    /// Returns `Err(StoreError::NamespaceNotFound)` if no such namespace exists.
    async fn get_namespace(&self, namespace_id: &str) -> Result<NamespaceRecord, StoreError>;

    /// Overwrite the namespace record in full.
    async fn update_namespace(
        &self,
        namespace_id: &str,
        namespace: NamespaceRecord,
    ) -> Result<(), StoreError>;
}

/// Saved response schemas.
#[async_trait]
pub trait SchemaStore: Send + Sync {
    /// Persist a schema and return its newly assigned id.
    async fn create_schema(&self, payload: SchemaPayload) -> Result<String, StoreError>;

    /// Returns `Err(StoreError::SchemaNotFound)` if no such schema exists.
    async fn get_schema(&self, schema_id: &str) -> Result<SavedSchema, StoreError>;
}

/// A backend implementing every store contract.
pub trait PlatformStore: AccountStore + MethodStore + NamespaceStore + SchemaStore {}

impl<T> PlatformStore for T where T: AccountStore + MethodStore + NamespaceStore + SchemaStore {}
