//! Provider request pipeline.
//!
//! Every side-effecting call against the cloud provider goes through
//! [`Provider::request`]:
//!
//! 1. credentials are resolved for `(stage, region)`,
//! 2. a transient client is built from them,
//! 3. the call is made, and throttled calls are retried with backoff,
//! 4. other failures are rejected immediately, annotated with a pointer to
//!    the credentials guide when they look like missing credentials.

pub mod client;
pub mod credentials;
pub mod retry;

use crate::config::Config;
use crate::error::{CREDENTIALS_GUIDE, ProviderError, ProviderFailure};
use crate::http_client::HttpClient;
use crate::providers::EnvProvider;
use crate::service::Service;
use client::{ClientFactory, HttpClientFactory};
use credentials::{CredentialDescriptor, CredentialResolver};
use retry::RetryPolicy;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info};

pub const PROVIDER_NAME: &str = "aws";

const MISSING_CREDENTIALS_MESSAGE: &str = "Missing credentials in config";
const DEPLOYMENT_BUCKET_RESOURCE: &str = "ServerlessDeploymentBucket";

pub struct Provider {
    service: Arc<Service>,
    env: Arc<dyn EnvProvider>,
    env_prefix: String,
    retry: RetryPolicy,
    clients: Arc<dyn ClientFactory>,
}

impl Provider {
    pub fn new(
        service: Arc<Service>,
        env: Arc<dyn EnvProvider>,
        env_prefix: impl Into<String>,
        retry: RetryPolicy,
        clients: Arc<dyn ClientFactory>,
    ) -> Self {
        Self {
            service,
            env,
            env_prefix: env_prefix.into(),
            retry,
            clients,
        }
    }

    /// Provider wired to the HTTP gateway described by `config`.
    pub fn from_config(
        config: &Config,
        service: Arc<Service>,
        env: Arc<dyn EnvProvider>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        let clients = Arc::new(HttpClientFactory::new(http, config.provider_endpoint.clone()));
        Self::new(service, env, config.env_prefix.clone(), config.retry_policy(), clients)
    }

    pub fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    pub fn credentials(&self, stage: &str, region: &str) -> CredentialDescriptor {
        CredentialResolver::new(&self.service.provider, self.env.as_ref(), &self.env_prefix).resolve(stage, region)
    }

    /// Calls `service.method(params)` for `(stage, region)`.
    pub async fn request(
        &self,
        service: &str,
        method: &str,
        params: Value,
        stage: &str,
        region: &str,
    ) -> Result<Value, ProviderError> {
        let credentials = self.credentials(stage, region);
        let client = self.clients.create(service, &credentials)?;
        debug!("Requesting {}.{} in {} ({})", service, method, region, stage);

        let client = client.as_ref();
        let params = &params;
        self.retry
            .run(move |_| client.call(method, params))
            .await
            .map_err(annotate)
    }

    pub fn stack_name(&self, stage: &str) -> String {
        format!("{}-{}", self.service.service, stage)
    }

    /// Name of the bucket deployment artifacts go to.
    ///
    /// A bucket configured on the service wins and costs no provider call.
    pub async fn deployment_bucket_name(&self, stage: &str, region: &str) -> Result<String, ProviderError> {
        if let Some(bucket) = &self.service.provider.deployment_bucket {
            return Ok(bucket.clone());
        }

        let result = self
            .request(
                "CloudFormation",
                "describeStackResource",
                json!({
                    "StackName": self.stack_name(stage),
                    "LogicalResourceId": DEPLOYMENT_BUCKET_RESOURCE,
                }),
                stage,
                region,
            )
            .await?;

        let bucket = result
            .pointer("/StackResourceDetail/PhysicalResourceId")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ProviderError::Rejected(ProviderFailure::new(
                    None,
                    None,
                    format!("stack {} has no {} resource", self.stack_name(stage), DEPLOYMENT_BUCKET_RESOURCE),
                ))
            })?;
        info!("Deployment bucket for stage '{}': {}", stage, bucket);
        Ok(bucket.to_string())
    }
}

fn annotate(error: ProviderError) -> ProviderError {
    match error {
        ProviderError::Rejected(mut failure)
            if failure.status_code == Some(403) && failure.message.contains(MISSING_CREDENTIALS_MESSAGE) =>
        {
            failure.remediation = Some(format!("see {} for how to set up provider credentials", CREDENTIALS_GUIDE));
            ProviderError::Rejected(failure)
        }
        other => other,
    }
}
