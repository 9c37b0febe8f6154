use std::thread;
use std::time::Duration;

use lc_core::errors::{ErrorInfo, LcError};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Bounded retry with exponential backoff for transient tool misses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    #[serde(default = "RetryPolicy::default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt.
    #[serde(default = "RetryPolicy::default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Growth factor applied to the delay after each miss.
    #[serde(default = "RetryPolicy::default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Upper bound on a single delay.
    #[serde(default = "RetryPolicy::default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl RetryPolicy {
    const fn default_max_attempts() -> u32 {
        5
    }

    const fn default_initial_backoff_ms() -> u64 {
        1_000
    }

    const fn default_backoff_multiplier() -> f64 {
        2.0
    }

    const fn default_max_backoff_ms() -> u64 {
        60_000
    }

    /// A policy retrying up to `max_attempts` times without sleeping.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            backoff_multiplier: 1.0,
            max_backoff_ms: 0,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let millis = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis(millis.min(self.max_backoff_ms as f64).max(0.0) as u64)
    }

    /// Rejects policies that could never produce a result.
    pub fn validate(&self) -> Result<(), LcError> {
        if self.max_attempts == 0 {
            return Err(LcError::Config(
                ErrorInfo::new("retry-attempts-zero", "retry policy needs at least one attempt")
                    .with_context("max_attempts", "0"),
            ));
        }
        if !(self.backoff_multiplier.is_finite() && self.backoff_multiplier >= 1.0) {
            return Err(LcError::Config(
                ErrorInfo::new("retry-multiplier", "backoff multiplier must be finite and >= 1")
                    .with_context("backoff_multiplier", self.backoff_multiplier.to_string()),
            ));
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            initial_backoff_ms: Self::default_initial_backoff_ms(),
            backoff_multiplier: Self::default_backoff_multiplier(),
            max_backoff_ms: Self::default_max_backoff_ms(),
        }
    }
}

/// Runs `compute` until it yields a finite value or the policy gives up.
///
/// `Ok(None)` and non-finite values count as transient misses. An `Err`
/// from `compute` is returned immediately. Returns the value together with
/// the number of attempts used.
pub fn run_with_retry<F>(
    policy: &RetryPolicy,
    label: &str,
    mut compute: F,
) -> Result<(f64, u32), LcError>
where
    F: FnMut() -> Result<Option<f64>, LcError>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match compute()? {
            Some(value) if value.is_finite() => return Ok((value, attempt)),
            miss => {
                if attempt >= max_attempts {
                    return Err(LcError::Retry(
                        ErrorInfo::new("retry-exhausted", "no usable result after retries")
                            .with_context("key", label)
                            .with_context("attempts", attempt.to_string())
                            .with_hint("the external tool kept returning no score"),
                    ));
                }
                let delay = policy.backoff(attempt);
                warn!(
                    key = label,
                    attempt,
                    max_attempts,
                    value = ?miss,
                    delay_ms = delay.as_millis() as u64,
                    "no usable result, retrying"
                );
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
            }
        }
    }
}
