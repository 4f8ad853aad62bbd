//! Service descriptor values consumed by the framework.
//!
//! Only the fields the orchestration engine and the provider pipeline read
//! are modelled here; function definitions are kept as loosely typed tables
//! for plugins to interpret.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

pub const SERVICE_FILE: &str = "service.toml";
pub const DEFAULT_STAGE: &str = "dev";
pub const DEFAULT_REGION: &str = "us-east-1";

/// Access keys as written in a descriptor. Any field may be missing or empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    #[serde(default)]
    pub session_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_provider_name")]
    pub name: String,
    #[serde(default = "default_stage")]
    pub stage: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub credentials: Option<KeyRecord>,
    /// Pre-existing bucket to deploy into instead of the stack's own.
    #[serde(default)]
    pub deployment_bucket: Option<String>,
    #[serde(default)]
    pub memory_size: Option<u32>,
    #[serde(default)]
    pub timeout: Option<u32>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            stage: default_stage(),
            region: default_region(),
            profile: None,
            credentials: None,
            deployment_bucket: None,
            memory_size: None,
            timeout: None,
        }
    }
}

fn default_provider_name() -> String {
    "aws".to_string()
}

fn default_stage() -> String {
    DEFAULT_STAGE.to_string()
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionConfig {
    #[serde(default)]
    pub handler: Option<String>,
    /// Deployed name; defaults to `{service}-{stage}-{function}`.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub memory_size: Option<u32>,
    #[serde(default)]
    pub timeout: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub functions: BTreeMap<String, FunctionConfig>,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            service: name.into(),
            ..Self::default()
        }
    }

    /// Loads `service.toml` from `dir`, or returns a default descriptor when
    /// the directory has none.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(SERVICE_FILE);
        if !path.exists() {
            debug!("No {} in {}, using an empty service", SERVICE_FILE, dir.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let service: Service = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        info!("Loaded service '{}' from {}", service.service, path.display());
        Ok(service)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionConfig> {
        self.functions.get(name)
    }

    /// Name the function is deployed under for `stage`.
    pub fn deployed_function_name(&self, name: &str, stage: &str) -> String {
        self.function(name)
            .and_then(|f| f.name.clone())
            .unwrap_or_else(|| format!("{}-{}-{}", self.service, stage, name))
    }
}
