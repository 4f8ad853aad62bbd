//! Shared provider traits for dependency injection.
//!
//! Credential resolution and configuration read the process environment.
//! Abstracting it behind a trait lets both be tested with a fixed map instead
//! of mutating global process state.

use std::collections::HashMap;

/// Trait for reading environment variables.
///
/// # Example
///
/// ```
/// use nimbus::providers::{EnvProvider, MapEnvProvider};
///
/// let env = MapEnvProvider::from_pairs(&[("AWS_PROFILE", "dev")]);
/// assert_eq!(env.var("AWS_PROFILE"), Some("dev".to_string()));
/// assert_eq!(env.var("AWS_REGION"), None);
/// ```
pub trait EnvProvider: Send + Sync {
    /// Returns the value of `key`, or `None` when unset or not valid unicode.
    fn var(&self, key: &str) -> Option<String>;

    /// Like [`EnvProvider::var`] but treats empty strings as unset.
    fn non_empty(&self, key: &str) -> Option<String> {
        self.var(key).filter(|value| !value.is_empty())
    }
}

/// Default environment provider backed by the process environment.
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Environment provider backed by an in-memory map.
#[derive(Debug, Clone, Default)]
pub struct MapEnvProvider {
    vars: HashMap<String, String>,
}

impl MapEnvProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            vars: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }
}

impl EnvProvider for MapEnvProvider {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}
