//! State shared by the hooks of one command execution.
//!
//! The context is created when a command resolves, handed by mutable
//! reference to each hook in turn, and dropped when the command finishes.
//! Hooks run strictly one after another, so the template document needs no
//! locking: a hook sees everything earlier hooks wrote and nothing else.

use crate::provider::Provider;
use crate::service::Service;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct ExecutionContext {
    /// Path of the command being executed (`["deploy", "function"]`).
    pub command_path: Vec<String>,
    /// Options from the command line, plus long-name copies of shortcuts
    /// and the stage/region defaults.
    pub options: BTreeMap<String, String>,
    /// Resource-declaration document accumulated by hooks.
    pub template: Value,
    service: Arc<Service>,
    provider: Arc<Provider>,
}

impl ExecutionContext {
    pub fn new(
        command_path: Vec<String>,
        options: BTreeMap<String, String>,
        service: Arc<Service>,
        provider: Arc<Provider>,
    ) -> Self {
        Self {
            command_path,
            options,
            template: Value::Null,
            service,
            provider,
        }
    }

    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    pub fn stage(&self) -> &str {
        self.option("stage").unwrap_or(&self.service.provider.stage)
    }

    pub fn region(&self) -> &str {
        self.option("region").unwrap_or(&self.service.provider.region)
    }

    pub fn service(&self) -> &Service {
        &self.service
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    /// Owned handle to the provider, for hooks that need to keep it while
    /// also mutating the context.
    pub fn provider_handle(&self) -> Arc<Provider> {
        Arc::clone(&self.provider)
    }
}
