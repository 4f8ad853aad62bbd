use crate::provider::retry::RetryPolicy;
use crate::providers::{EnvProvider, SystemEnvProvider};
use anyhow::{Context, Result, anyhow};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Credential variables are read as `AWS_ACCESS_KEY_ID` and friends; set
/// `env_prefix = ""` to read the bare `ACCESS_KEY_ID` names instead.
pub const DEFAULT_ENV_PREFIX: &str = "AWS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    4
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the provider gateway that receives requests.
    #[serde(default)]
    pub provider_endpoint: Option<String>,
    #[serde(default)]
    pub client_timeout_ms: Option<u64>,
    #[serde(default)]
    pub proxy: Option<String>,
    /// Prefix of the credential environment variables (`AWS_ACCESS_KEY_ID`).
    #[serde(default = "default_env_prefix")]
    pub env_prefix: String,
    #[serde(default)]
    pub retry: RetrySettings,
}

fn default_env_prefix() -> String {
    DEFAULT_ENV_PREFIX.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider_endpoint: None,
            client_timeout_ms: None,
            proxy: None,
            env_prefix: default_env_prefix(),
            retry: RetrySettings::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, environment variables, or create default
    pub fn load() -> Result<Self> {
        Self::load_with_env(&SystemEnvProvider)
    }

    pub fn load_with_env(env: &dyn EnvProvider) -> Result<Self> {
        let mut config = match Self::get_config_path() {
            Ok(path) => Self::load_from_path(&path)?,
            Err(e) => {
                warn!("{}, using default config", e);
                Self::default()
            }
        };

        config.apply_env_overrides(env)?;
        Ok(config)
    }

    /// Reads `path`; a missing file means defaults, an unreadable or
    /// malformed one is an error.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config file found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    /// Environment variables override the config file
    pub fn apply_env_overrides(&mut self, env: &dyn EnvProvider) -> Result<()> {
        if let Some(endpoint) = env.non_empty("NIMBUS_PROVIDER_ENDPOINT") {
            self.provider_endpoint = Some(endpoint);
        }

        if let Some(timeout) = env.non_empty("NIMBUS_CLIENT_TIMEOUT") {
            let millis = timeout
                .parse::<u64>()
                .map_err(|_| anyhow!("NIMBUS_CLIENT_TIMEOUT must be milliseconds, got '{}'", timeout))?;
            self.client_timeout_ms = Some(millis);
        }

        if let Some(proxy) = env.non_empty("NIMBUS_PROXY") {
            self.proxy = Some(proxy);
        }

        if let Some(prefix) = env.non_empty("NIMBUS_ENV_PREFIX") {
            self.env_prefix = prefix;
        }

        if self.retry.max_attempts == 0 {
            warn!("retry.max_attempts is 0, using a single attempt");
            self.retry.max_attempts = 1;
        }

        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        Ok(Self::get_config_dir()?.join("config.toml"))
    }

    pub fn get_config_dir() -> Result<PathBuf> {
        let home = home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        Ok(home.join(".nimbus"))
    }

    pub fn client_timeout(&self) -> Option<Duration> {
        self.client_timeout_ms.map(Duration::from_millis)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            backoff_multiplier: self.retry.backoff_multiplier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MapEnvProvider;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.env_prefix, "AWS");
        assert_eq!(config.retry.max_attempts, 4);
        assert!(config.provider_endpoint.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let env = MapEnvProvider::from_pairs(&[
            ("NIMBUS_PROVIDER_ENDPOINT", "http://localhost:4566"),
            ("NIMBUS_CLIENT_TIMEOUT", "120000"),
            ("NIMBUS_PROXY", "http://proxy:3128"),
            ("NIMBUS_ENV_PREFIX", "CLOUD"),
        ]);
        let mut config = Config::default();
        config.apply_env_overrides(&env).unwrap();

        assert_eq!(config.provider_endpoint.as_deref(), Some("http://localhost:4566"));
        assert_eq!(config.client_timeout(), Some(Duration::from_secs(120)));
        assert_eq!(config.proxy.as_deref(), Some("http://proxy:3128"));
        assert_eq!(config.env_prefix, "CLOUD");
    }

    #[test]
    fn test_invalid_timeout_is_an_error() {
        let env = MapEnvProvider::from_pairs(&[("NIMBUS_CLIENT_TIMEOUT", "soon")]);
        let mut config = Config::default();
        assert!(config.apply_env_overrides(&env).is_err());
    }

    #[test]
    fn test_parse_from_toml_with_retry_table() {
        let content = r#"
provider_endpoint = "https://gateway.example.com"

[retry]
max_attempts = 6
initial_delay_ms = 100
"#;
        let config: Config = toml::from_str(content).unwrap();
        assert_eq!(config.retry.max_attempts, 6);
        assert_eq!(config.retry.max_delay_ms, 10_000);

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 6);
        assert_eq!(policy.initial_delay, Duration::from_millis(100));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_path(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[retry]\nmax_attempts = \"many\"\n").unwrap();

        let err = Config::load_from_path(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse"));
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;
        config.apply_env_overrides(&MapEnvProvider::new()).unwrap();
        assert_eq!(config.retry.max_attempts, 1);
    }
}
