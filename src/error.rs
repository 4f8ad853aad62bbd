//! Error taxonomy for the framework.
//!
//! Every failure travels up to the binary's entry point, which alone decides
//! the exit code and how the message is printed.

use std::fmt;
use thiserror::Error;

/// Pointer appended to provider failures that look like missing credentials.
pub const CREDENTIALS_GUIDE: &str = "https://git.io/viZAC";

/// A failure reported by the provider, with the fields it arrived with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    /// HTTP status code, when the failure came with one.
    pub status_code: Option<u16>,
    /// Provider-specific error code (e.g. `ThrottlingException`).
    pub code: Option<String>,
    /// Message as returned by the provider.
    pub message: String,
    /// Remediation hint attached by the pipeline. Never replaces `message`.
    pub remediation: Option<String>,
}

impl ProviderFailure {
    pub fn new(status_code: Option<u16>, code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            status_code,
            code,
            message: message.into(),
            remediation: None,
        }
    }

    pub fn with_status(status_code: u16, message: impl Into<String>) -> Self {
        Self::new(Some(status_code), None, message)
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(hint) = &self.remediation {
            write!(f, " ({})", hint)?;
        }
        Ok(())
    }
}

/// Errors produced by the provider request pipeline.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Throttled on every attempt; carries the last throttling failure.
    #[error("{failure} (throttled after {attempts} attempts)")]
    Throttled {
        attempts: u32,
        failure: ProviderFailure,
    },

    #[error("{0}")]
    Rejected(ProviderFailure),

    #[error("Provider configuration error: {0}")]
    Configuration(String),
}

impl ProviderError {
    /// The underlying provider failure, if the provider answered at all.
    pub fn failure(&self) -> Option<&ProviderFailure> {
        match self {
            ProviderError::Throttled { failure, .. } => Some(failure),
            ProviderError::Rejected(failure) => Some(failure),
            ProviderError::Configuration(_) => None,
        }
    }
}

/// Top-level framework errors.
#[derive(Error, Debug)]
pub enum FrameworkError {
    /// Unresolved command, stray segments or a missing required option.
    ///
    /// `help` holds the help text for the closest command that resolved.
    #[error("{message}")]
    Usage { message: String, help: String },

    /// A plugin constructor failed; loading stops at the first failure.
    /// Displays the constructor's own message.
    #[error("{source}")]
    PluginLoad {
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    /// A hook failed; its message is surfaced unchanged.
    #[error("{source}")]
    HookExecution {
        plugin: String,
        event: String,
        source: anyhow::Error,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameworkError {
    pub fn is_usage(&self) -> bool {
        matches!(self, FrameworkError::Usage { .. })
    }
}

pub type Result<T> = std::result::Result<T, FrameworkError>;
