//! Throttling retry policy.

use crate::error::{ProviderError, ProviderFailure};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Provider error codes that mean "slow down" regardless of HTTP status.
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "ProvisionedThroughputExceededException",
];

pub fn is_throttling(failure: &ProviderFailure) -> bool {
    failure.status_code == Some(429)
        || failure
            .code
            .as_deref()
            .is_some_and(|code| THROTTLING_CODES.contains(&code))
}

/// Bounded exponential backoff with jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that retries without sleeping.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Upper bound of the delay after failed attempt number `attempt` (1-based).
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let scaled = self.initial_delay.as_secs_f64() * self.backoff_multiplier.max(1.0).powi(exponent);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }

    /// Delay before the next attempt: uniformly drawn from the upper half of
    /// [`RetryPolicy::ceiling`].
    pub fn delay(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling(attempt);
        if ceiling.is_zero() {
            return ceiling;
        }
        let millis = ceiling.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(millis / 2..=millis))
    }

    /// Runs `call` until it succeeds, fails without throttling, or the attempt
    /// budget is spent.
    ///
    /// `call` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, mut call: F) -> Result<T, ProviderError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ProviderFailure>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call(attempt).await {
                Ok(value) => return Ok(value),
                Err(failure) if is_throttling(&failure) => {
                    if attempt >= max_attempts {
                        return Err(ProviderError::Throttled {
                            attempts: attempt,
                            failure,
                        });
                    }
                    let delay = self.delay(attempt);
                    warn!(
                        "Provider throttled the request (attempt {}/{}), retrying in {:?}: {}",
                        attempt, max_attempts, delay, failure.message
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(failure) => return Err(ProviderError::Rejected(failure)),
            }
        }
    }
}
