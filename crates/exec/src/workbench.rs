//! The method test bench as one object: load configuration, compose,
//! execute, infer, save.

use std::sync::Arc;

use apiprobe_core::{compose_request, infer, AccountConfig, InferredSchema, RequestSpec, UserEdits};
use apiprobe_storage::{AccountStore, HttpPlatformStore, MethodStore, PlatformStore, StoreError};

use crate::config::ProbeConfig;
use crate::controller::{ExecutionController, RunOutcome};
use crate::history::ExecutionHistory;
use crate::linker::{SaveReport, SaveSchemaRequest, SchemaLinker};
use crate::session::TestSession;
use crate::transport::{HttpTransport, UreqTransport};

/// Failures loading the configuration a test run needs. Everything after
/// that (execution, saving) reports failures inside its result instead.
#[derive(Debug, thiserror::Error)]
pub enum WorkbenchError {
    #[error("account '{account_id}' is not configured for namespace '{namespace_id}'")]
    AccountNotFound {
        namespace_id: String,
        account_id: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no [platform] section configured and APIPROBE_PLATFORM_URL is not set")]
    MissingPlatform,
}

pub struct Workbench {
    accounts: Arc<dyn AccountStore>,
    methods: Arc<dyn MethodStore>,
    controller: ExecutionController,
    linker: SchemaLinker,
    config: ProbeConfig,
}

impl Workbench {
    pub fn new<P: PlatformStore + 'static>(
        platform: Arc<P>,
        transport: Arc<dyn HttpTransport>,
        config: ProbeConfig,
    ) -> Self {
        let history = Arc::new(ExecutionHistory::new(config.history.capacity));
        let controller = ExecutionController::new(transport)
            .with_default_max_iterations(config.pagination.max_iterations)
            .with_history(history);
        Workbench {
            accounts: platform.clone(),
            methods: platform.clone(),
            controller,
            linker: SchemaLinker::for_platform(platform),
            config,
        }
    }

    /// A workbench talking to the configured platform REST API, sending test
    /// calls over `ureq`.
    pub fn from_config(config: ProbeConfig) -> Result<Self, WorkbenchError> {
        let platform = config
            .platform
            .as_ref()
            .filter(|p| !p.base_url.trim().is_empty())
            .ok_or(WorkbenchError::MissingPlatform)?;

        let mut store =
            HttpPlatformStore::new(platform.base_url.clone()).with_timeout(config.http.timeout());
        if let Some(token) = &platform.auth_token {
            store = store.with_auth_token(token.clone());
        }

        let mut transport =
            UreqTransport::new(config.http.timeout()).with_body_limit(config.http.max_body_bytes);
        if let Some(agent) = &config.http.user_agent {
            transport = transport.with_user_agent(agent.clone());
        }

        tracing::info!(platform = %platform.base_url, "test bench configured");
        Ok(Self::new(Arc::new(store), Arc::new(transport), config))
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    pub fn history(&self) -> Option<&Arc<ExecutionHistory>> {
        self.controller.history()
    }

    pub async fn accounts(&self, namespace_id: &str) -> Result<Vec<AccountConfig>, WorkbenchError> {
        Ok(self.accounts.accounts_for_namespace(namespace_id).await?)
    }

    /// Load the account and method and compose the request the test form
    /// would send.
    pub async fn prepare(
        &self,
        namespace_id: &str,
        account_id: &str,
        method_id: &str,
        edits: &UserEdits,
    ) -> Result<RequestSpec, WorkbenchError> {
        let account = self
            .accounts(namespace_id)
            .await?
            .into_iter()
            .find(|a| a.account_id == account_id)
            .ok_or_else(|| WorkbenchError::AccountNotFound {
                namespace_id: namespace_id.to_string(),
                account_id: account_id.to_string(),
            })?;
        let method = self.methods.get_method(method_id).await?;
        Ok(compose_request(&account, &method, edits))
    }

    /// Execute on behalf of `session`. A paginated run without a policy on
    /// the request uses the configured default policy.
    pub async fn run(&self, session: &TestSession, spec: &RequestSpec, paginated: bool) -> RunOutcome {
        if paginated && spec.pagination.is_none() {
            let mut spec = spec.clone();
            spec.pagination = Some(self.config.pagination.policy());
            return self.controller.execute(session, &spec, true).await;
        }
        self.controller.execute(session, spec, paginated).await
    }

    /// Shape of the first page of the session's latest report.
    pub fn infer_latest(&self, session: &TestSession) -> Option<InferredSchema> {
        let report = session.latest()?;
        let body = report.first()?.response_body.as_ref()?.as_json()?;
        Some(infer(body))
    }

    pub async fn save_schema(&self, request: &SaveSchemaRequest) -> SaveReport {
        self.linker.save(request).await
    }

    /// Save the shape of the session's latest first-page response. `None`
    /// when the session has no response body to save.
    pub async fn save_latest(
        &self,
        session: &TestSession,
        namespace_id: &str,
        method_id: &str,
        schema_name: &str,
    ) -> Option<SaveReport> {
        let report = session.latest()?;
        let page = report.first()?;
        let body = page.response_body.as_ref()?;
        let request = SaveSchemaRequest::from_response(
            body,
            method_id,
            namespace_id,
            schema_name,
            page.request_url.clone(),
        );
        Some(self.linker.save(&request).await)
    }
}
