//! In-memory platform backend with per-operation fault injection.

use std::collections::{BTreeMap, HashSet};

use apiprobe_core::{AccountConfig, MethodConfig};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::record::{NamespaceRecord, SavedSchema, SchemaPayload};
use crate::traits::{AccountStore, MethodStore, NamespaceStore, SchemaStore};

/// A store operation that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    AccountsForNamespace,
    GetMethod,
    UpdateMethod,
    GetNamespace,
    UpdateNamespace,
    CreateSchema,
    GetSchema,
}

#[derive(Debug, Default)]
struct State {
    namespaces: BTreeMap<String, NamespaceRecord>,
    accounts: BTreeMap<String, Vec<AccountConfig>>,
    methods: BTreeMap<String, MethodConfig>,
    schemas: BTreeMap<String, SavedSchema>,
    next_schema_seq: u64,
    failing: HashSet<StoreOp>,
}

impl State {
    fn check(&self, op: StoreOp) -> Result<(), StoreError> {
        if self.failing.contains(&op) {
            return Err(StoreError::Backend(format!("injected failure on {:?}", op)));
        }
        Ok(())
    }
}

/// Holds every platform record in memory.
///
/// Seed it with the `with_*` builders before sharing it; inject failures
/// with [`MemoryPlatform::fail_on`] to exercise partial-failure paths.
#[derive(Debug, Default)]
pub struct MemoryPlatform {
    state: RwLock<State>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(mut self, namespace: NamespaceRecord) -> Self {
        let state = self.state.get_mut();
        state
            .namespaces
            .insert(namespace.namespace_id.clone(), namespace);
        self
    }

    pub fn with_account(mut self, namespace_id: &str, account: AccountConfig) -> Self {
        self.state
            .get_mut()
            .accounts
            .entry(namespace_id.to_string())
            .or_default()
            .push(account);
        self
    }

    pub fn with_method(mut self, method: MethodConfig) -> Self {
        self.state
            .get_mut()
            .methods
            .insert(method.method_id.clone(), method);
        self
    }

    /// Make every subsequent call of `op` fail with a backend error.
    pub async fn fail_on(&self, op: StoreOp) {
        self.state.write().await.failing.insert(op);
    }

    pub async fn clear_failures(&self) {
        self.state.write().await.failing.clear();
    }

    /// Number of saved schemas.
    pub async fn schema_count(&self) -> usize {
        self.state.read().await.schemas.len()
    }
}

#[async_trait]
impl AccountStore for MemoryPlatform {
    async fn accounts_for_namespace(
        &self,
        namespace_id: &str,
    ) -> Result<Vec<AccountConfig>, StoreError> {
        let state = self.state.read().await;
        state.check(StoreOp::AccountsForNamespace)?;
        if !state.namespaces.contains_key(namespace_id) {
            return Err(StoreError::NamespaceNotFound {
                namespace_id: namespace_id.to_string(),
            });
        }
        Ok(state.accounts.get(namespace_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl MethodStore for MemoryPlatform {
    async fn get_method(&self, method_id: &str) -> Result<MethodConfig, StoreError> {
        let state = self.state.read().await;
        state.check(StoreOp::GetMethod)?;
        state
            .methods
            .get(method_id)
            .cloned()
            .ok_or_else(|| StoreError::MethodNotFound {
                method_id: method_id.to_string(),
            })
    }

    async fn update_method(
        &self,
        method_id: &str,
        method: MethodConfig,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.check(StoreOp::UpdateMethod)?;
        match state.methods.get_mut(method_id) {
            Some(existing) => {
                *existing = method;
                Ok(())
            }
            None => Err(StoreError::MethodNotFound {
                method_id: method_id.to_string(),
            }),
        }
    }
}

#[async_trait]
impl NamespaceStore for MemoryPlatform {
    async fn get_namespace(&self, namespace_id: &str) -> Result<NamespaceRecord, StoreError> {
        let state = self.state.read().await;
        state.check(StoreOp::GetNamespace)?;
        state
            .namespaces
            .get(namespace_id)
            .cloned()
            .ok_or_else(|| StoreError::NamespaceNotFound {
                namespace_id: namespace_id.to_string(),
            })
    }

    async fn update_namespace(
        &self,
        namespace_id: &str,
        namespace: NamespaceRecord,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.check(StoreOp::UpdateNamespace)?;
        match state.namespaces.get_mut(namespace_id) {
            Some(existing) => {
                *existing = namespace;
                Ok(())
            }
            None => Err(StoreError::NamespaceNotFound {
                namespace_id: namespace_id.to_string(),
            }),
        }
    }
}

#[async_trait]
impl SchemaStore for MemoryPlatform {
    async fn create_schema(&self, payload: SchemaPayload) -> Result<String, StoreError> {
        let mut state = self.state.write().await;
        state.check(StoreOp::CreateSchema)?;
        state.next_schema_seq += 1;
        let schema_id = format!("schema-{}", state.next_schema_seq);
        state
            .schemas
            .insert(schema_id.clone(), payload.into_saved(schema_id.clone()));
        Ok(schema_id)
    }

    async fn get_schema(&self, schema_id: &str) -> Result<SavedSchema, StoreError> {
        let state = self.state.read().await;
        state.check(StoreOp::GetSchema)?;
        state
            .schemas
            .get(schema_id)
            .cloned()
            .ok_or_else(|| StoreError::SchemaNotFound {
                schema_id: schema_id.to_string(),
            })
    }
}
