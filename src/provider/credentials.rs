//! Credential resolution.
//!
//! Sources are consulted in a fixed order and the first one that yields
//! usable material wins:
//!
//! 1. access keys declared on the service
//! 2. stage-and-region scoped environment keys (`AWS_DEV_US_EAST_1_ACCESS_KEY_ID`),
//!    then stage scoped keys (`AWS_DEV_ACCESS_KEY_ID`)
//! 3. global environment keys (`AWS_ACCESS_KEY_ID`)
//! 4. profile declared on the service
//! 5. stage scoped profile variable (`AWS_DEV_PROFILE`)
//! 6. global profile variable (`AWS_PROFILE`)
//!
//! A key source counts only when both the key id and the secret are
//! non-empty. Empty strings are treated like unset values everywhere.

use crate::providers::EnvProvider;
use crate::service::{KeyRecord, ProviderSettings};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessKeys {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl AccessKeys {
    /// Builds keys from a possibly partial record.
    pub fn from_record(record: &KeyRecord) -> Option<Self> {
        Self::from_parts(
            record.access_key_id.clone(),
            record.secret_access_key.clone(),
            record.session_token.clone(),
        )
    }

    fn from_parts(
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        session_token: Option<String>,
    ) -> Option<Self> {
        let access_key_id = access_key_id.filter(|v| !v.is_empty())?;
        let secret_access_key = secret_access_key.filter(|v| !v.is_empty())?;
        Some(Self {
            access_key_id,
            secret_access_key,
            session_token: session_token.filter(|v| !v.is_empty()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Credentials {
    Keys(AccessKeys),
    Profile {
        profile: String,
    },
}

impl Credentials {
    pub fn profile(&self) -> Option<&str> {
        match self {
            Credentials::Profile { profile } => Some(profile),
            Credentials::Keys(_) => None,
        }
    }
}

/// Where the resolved credentials came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    ServiceKeys,
    StageRegionEnv,
    StageEnv,
    GlobalEnv,
    ServiceProfile,
    StageProfileEnv,
    GlobalProfileEnv,
}

/// Credentials plus target region for one provider call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialDescriptor {
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
    #[serde(skip)]
    pub source: Option<CredentialSource>,
}

pub struct CredentialResolver<'a> {
    settings: &'a ProviderSettings,
    env: &'a dyn EnvProvider,
    prefix: &'a str,
}

impl<'a> CredentialResolver<'a> {
    pub fn new(settings: &'a ProviderSettings, env: &'a dyn EnvProvider, prefix: &'a str) -> Self {
        Self {
            settings,
            env,
            prefix,
        }
    }

    /// Resolves credentials for `(stage, region)`. The region is always set.
    pub fn resolve(&self, stage: &str, region: &str) -> CredentialDescriptor {
        let (credentials, source) = match self.find(stage, region) {
            Some((credentials, source)) => {
                debug!("Using {:?} credentials for stage '{}' in {}", source, stage, region);
                (Some(credentials), Some(source))
            }
            None => {
                debug!("No explicit credentials for stage '{}', sending the region only", stage);
                (None, None)
            }
        };

        CredentialDescriptor {
            region: region.to_string(),
            credentials,
            source,
        }
    }

    fn find(&self, stage: &str, region: &str) -> Option<(Credentials, CredentialSource)> {
        let stage_scope = env_segment(stage);
        let stage_region_scope = format!("{}_{}", stage_scope, env_segment(region));

        let key_sources = [
            (
                self.settings.credentials.as_ref().and_then(AccessKeys::from_record),
                CredentialSource::ServiceKeys,
            ),
            (self.env_keys(Some(&stage_region_scope)), CredentialSource::StageRegionEnv),
            (self.env_keys(Some(&stage_scope)), CredentialSource::StageEnv),
            (self.env_keys(None), CredentialSource::GlobalEnv),
        ];
        if let Some((keys, source)) = key_sources
            .into_iter()
            .find_map(|(keys, source)| keys.map(|k| (k, source)))
        {
            return Some((Credentials::Keys(keys), source));
        }

        let profile_sources = [
            (
                self.settings.profile.clone().filter(|p| !p.is_empty()),
                CredentialSource::ServiceProfile,
            ),
            (self.env.non_empty(&self.var_name(Some(&stage_scope), "PROFILE")), CredentialSource::StageProfileEnv),
            (self.env.non_empty(&self.var_name(None, "PROFILE")), CredentialSource::GlobalProfileEnv),
        ];
        profile_sources
            .into_iter()
            .find_map(|(profile, source)| profile.map(|profile| (Credentials::Profile { profile }, source)))
    }

    fn env_keys(&self, scope: Option<&str>) -> Option<AccessKeys> {
        AccessKeys::from_parts(
            self.env.non_empty(&self.var_name(scope, "ACCESS_KEY_ID")),
            self.env.non_empty(&self.var_name(scope, "SECRET_ACCESS_KEY")),
            self.env.non_empty(&self.var_name(scope, "SESSION_TOKEN")),
        )
    }

    fn var_name(&self, scope: Option<&str>, suffix: &str) -> String {
        match (self.prefix.is_empty(), scope) {
            (true, None) => suffix.to_string(),
            (true, Some(scope)) => format!("{}_{}", scope, suffix),
            (false, None) => format!("{}_{}", self.prefix, suffix),
            (false, Some(scope)) => format!("{}_{}_{}", self.prefix, scope, suffix),
        }
    }
}

/// `us-east-1` -> `US_EAST_1`
fn env_segment(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}
