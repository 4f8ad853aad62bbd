//! Provider clients.
//!
//! A client is built for a single request from the resolved credentials and
//! dropped afterwards. The default implementation talks to an HTTP gateway
//! that accepts `POST {endpoint}/{service}/{method}` with the params as JSON.

use crate::error::{ProviderError, ProviderFailure};
use crate::http_client::{HttpClient, HttpResponse};
use crate::provider::credentials::{CredentialDescriptor, Credentials};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// A client bound to one provider service and one set of credentials.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Invokes `method` with `params` and resolves exactly once.
    async fn call(&self, method: &str, params: &Value) -> Result<Value, ProviderFailure>;
}

/// Builds transient clients for individual requests.
pub trait ClientFactory: Send + Sync {
    fn create(
        &self,
        service: &str,
        credentials: &CredentialDescriptor,
    ) -> Result<Box<dyn ProviderClient>, ProviderError>;
}

pub struct HttpClientFactory {
    http: Arc<dyn HttpClient>,
    endpoint: Option<String>,
}

impl HttpClientFactory {
    pub fn new(http: Arc<dyn HttpClient>, endpoint: Option<String>) -> Self {
        Self { http, endpoint }
    }
}

impl ClientFactory for HttpClientFactory {
    fn create(
        &self,
        service: &str,
        credentials: &CredentialDescriptor,
    ) -> Result<Box<dyn ProviderClient>, ProviderError> {
        let endpoint = self.endpoint.as_deref().ok_or_else(|| {
            ProviderError::Configuration(
                "no provider endpoint configured (set NIMBUS_PROVIDER_ENDPOINT or provider_endpoint in ~/.nimbus/config.toml)"
                    .to_string(),
            )
        })?;

        Ok(Box::new(HttpProviderClient {
            http: Arc::clone(&self.http),
            base_url: format!("{}/{}", endpoint.trim_end_matches('/'), service),
            headers: credential_headers(credentials),
        }))
    }
}

struct HttpProviderClient {
    http: Arc<dyn HttpClient>,
    base_url: String,
    headers: Vec<(String, String)>,
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn call(&self, method: &str, params: &Value) -> Result<Value, ProviderFailure> {
        let url = format!("{}/{}", self.base_url, method);
        debug!("POST {}", url);

        let response = self
            .http
            .post_json(&url, &self.headers, params)
            .await
            .map_err(|e| ProviderFailure::new(None, Some("NetworkingError".to_string()), e.to_string()))?;

        if response.is_success() {
            parse_success(&response)
        } else {
            Err(parse_failure(&response))
        }
    }
}

fn credential_headers(descriptor: &CredentialDescriptor) -> Vec<(String, String)> {
    let mut headers = vec![("x-nimbus-region".to_string(), descriptor.region.clone())];
    match &descriptor.credentials {
        Some(Credentials::Keys(keys)) => {
            headers.push(("x-nimbus-access-key-id".to_string(), keys.access_key_id.clone()));
            headers.push(("x-nimbus-secret-access-key".to_string(), keys.secret_access_key.clone()));
            if let Some(token) = &keys.session_token {
                headers.push(("x-nimbus-session-token".to_string(), token.clone()));
            }
        }
        Some(Credentials::Profile { profile }) => {
            headers.push(("x-nimbus-profile".to_string(), profile.clone()));
        }
        None => {}
    }
    headers
}

fn parse_success(response: &HttpResponse) -> Result<Value, ProviderFailure> {
    if response.body.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(&response.body).map_err(|e| {
        ProviderFailure::new(
            Some(response.status),
            Some("SerializationError".to_string()),
            format!("invalid JSON in provider response: {}", e),
        )
    })
}

fn parse_failure(response: &HttpResponse) -> ProviderFailure {
    let parsed: Option<Value> = serde_json::from_str(&response.body).ok();
    let field = |names: &[&str]| {
        parsed.as_ref().and_then(|body| {
            names
                .iter()
                .find_map(|name| body.get(*name).and_then(Value::as_str).map(str::to_string))
        })
    };

    let code = field(&["code", "Code", "__type"]);
    let message = field(&["message", "Message"])
        .or_else(|| (!response.body.trim().is_empty()).then(|| response.body.trim().to_string()))
        .unwrap_or_else(|| format!("provider responded with status {}", response.status));

    ProviderFailure::new(Some(response.status), code, message)
}
