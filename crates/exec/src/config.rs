//! Test bench configuration.
//!
//! Loaded from TOML; every field has a default, so an empty file is valid.
//!
//! ```toml
//! [http]
//! timeout_secs = 30
//! max_body_bytes = 10485760
//! user_agent = "apiprobe/0.1"
//!
//! [pagination]
//! max_iterations = 10
//! page_param = "page"
//! limit_param = "limit"
//! default_limit = 50
//!
//! [history]
//! capacity = 50
//!
//! [platform]
//! base_url = "https://platform.example.com/api"
//! auth_token = "..."
//! ```
//!
//! Environment overrides (applied by [`ProbeConfig::apply_env_overrides`]):
//! `APIPROBE_PLATFORM_URL`, `APIPROBE_PLATFORM_TOKEN`,
//! `APIPROBE_HTTP_TIMEOUT_SECS`.

use std::num::{NonZeroU32, NonZeroU64};
use std::path::Path;
use std::time::Duration;

use apiprobe_core::{CursorSource, PaginationPolicy};
use serde::{Deserialize, Serialize};

use crate::controller::DEFAULT_MAX_ITERATIONS;
use crate::transport::DEFAULT_MAX_BODY_BYTES;

pub const ENV_PLATFORM_URL: &str = "APIPROBE_PLATFORM_URL";
pub const ENV_PLATFORM_TOKEN: &str = "APIPROBE_PLATFORM_TOKEN";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "APIPROBE_HTTP_TIMEOUT_SECS";

const DEFAULT_TIMEOUT_SECS: NonZeroU64 = match NonZeroU64::new(30) {
    Some(n) => n,
    None => unreachable!(),
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {name}: '{value}'")]
    InvalidOverride { name: &'static str, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub http: HttpSettings,
    pub pagination: PaginationDefaults,
    pub history: HistorySettings,
    pub platform: Option<PlatformSettings>,
}

/// `[http]` — outgoing test calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Zero is rejected: a zero global timeout would fail every call.
    pub timeout_secs: NonZeroU64,
    /// Response bodies are truncated past this size.
    pub max_body_bytes: u64,
    pub user_agent: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        HttpSettings {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            user_agent: None,
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.get())
    }
}

/// `[pagination]` — used when a paginated run has no explicit policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationDefaults {
    pub max_iterations: NonZeroU32,
    pub page_param: String,
    pub limit_param: String,
    pub default_limit: u32,
}

impl Default for PaginationDefaults {
    fn default() -> Self {
        PaginationDefaults {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            page_param: "page".to_string(),
            limit_param: "limit".to_string(),
            default_limit: 50,
        }
    }
}

impl PaginationDefaults {
    /// An enabled link-header policy with these parameter names. The
    /// iteration bound is left unset so the controller default applies.
    pub fn policy(&self) -> PaginationPolicy {
        PaginationPolicy {
            enabled: true,
            max_iterations: None,
            page_param_name: self.page_param.clone(),
            limit_param_name: self.limit_param.clone(),
            default_limit: self.default_limit,
            cursor: CursorSource::LinkHeader,
        }
    }
}

/// `[history]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    pub capacity: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        HistorySettings { capacity: 50 }
    }
}

/// `[platform]` — the REST backend for accounts, methods, namespaces and
/// schemas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformSettings {
    pub base_url: String,
    pub auth_token: Option<String>,
}

impl ProbeConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `APIPROBE_*` environment variables on top of the file values.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty(ENV_PLATFORM_URL) {
            self.platform.get_or_insert_with(Default::default).base_url = url;
        }
        if let Some(token) = non_empty(ENV_PLATFORM_TOKEN) {
            self.platform.get_or_insert_with(Default::default).auth_token = Some(token);
        }
        if let Some(raw) = non_empty(ENV_HTTP_TIMEOUT_SECS) {
            self.http.timeout_secs = raw.trim().parse().map_err(|_| ConfigError::InvalidOverride {
                name: ENV_HTTP_TIMEOUT_SECS,
                value: raw.clone(),
            })?;
        }
        Ok(())
    }
}

/// Read and parse a configuration file, then apply environment overrides.
pub fn read_config(path: &Path) -> Result<ProbeConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let mut config = ProbeConfig::from_toml_str(&content)?;
    config.apply_env_overrides()?;
    Ok(config)
}
