//! Shared fixtures for unit tests.

use crate::error::{ProviderError, ProviderFailure};
use crate::execution_context::ExecutionContext;
use crate::provider::Provider;
use crate::provider::client::{ClientFactory, ProviderClient};
use crate::provider::credentials::{CredentialDescriptor, Credentials};
use crate::provider::retry::RetryPolicy;
use crate::providers::MapEnvProvider;
use crate::service::Service;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

/// One provider call seen by [`ScriptedClients`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub service: String,
    pub method: String,
    pub params: Value,
    pub region: String,
    pub profile: Option<String>,
}

type Script = VecDeque<Result<Value, ProviderFailure>>;

/// Client factory whose clients answer from a shared script.
///
/// Once the script runs dry every call succeeds with `{}`.
#[derive(Default)]
pub struct ScriptedClients {
    script: Arc<Mutex<Script>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl ScriptedClients {
    pub fn with_responses(responses: Vec<Result<Value, ProviderFailure>>) -> Arc<Self> {
        Arc::new(Self {
            script: Arc::new(Mutex::new(responses.into())),
            calls: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl ClientFactory for ScriptedClients {
    fn create(
        &self,
        service: &str,
        credentials: &CredentialDescriptor,
    ) -> Result<Box<dyn ProviderClient>, ProviderError> {
        Ok(Box::new(ScriptedClient {
            service: service.to_string(),
            region: credentials.region.clone(),
            profile: credentials
                .credentials
                .as_ref()
                .and_then(Credentials::profile)
                .map(str::to_string),
            script: Arc::clone(&self.script),
            calls: Arc::clone(&self.calls),
        }))
    }
}

struct ScriptedClient {
    service: String,
    region: String,
    profile: Option<String>,
    script: Arc<Mutex<Script>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

#[async_trait]
impl ProviderClient for ScriptedClient {
    async fn call(&self, method: &str, params: &Value) -> Result<Value, ProviderFailure> {
        self.calls.lock().unwrap().push(RecordedCall {
            service: self.service.clone(),
            method: method.to_string(),
            params: params.clone(),
            region: self.region.clone(),
            profile: self.profile.clone(),
        });
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(json!({})))
    }
}

pub fn test_provider(service: Arc<Service>, clients: Arc<ScriptedClients>) -> Arc<Provider> {
    Arc::new(Provider::new(
        service,
        Arc::new(MapEnvProvider::new()),
        "AWS",
        RetryPolicy::immediate(4),
        clients,
    ))
}

pub fn test_context(
    service: Service,
    options: &[(&str, &str)],
    clients: Arc<ScriptedClients>,
) -> ExecutionContext {
    let service = Arc::new(service);
    let provider = test_provider(Arc::clone(&service), clients);
    let options: BTreeMap<String, String> = options
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ExecutionContext::new(Vec::new(), options, service, provider)
}
