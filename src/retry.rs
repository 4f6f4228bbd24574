//! Retry policy with configurable backoff.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::call::{Call, MethodMetadata};
use crate::error::ClientError;

/// Retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first call.
    pub max_attempts: u32,
    /// Backoff strategy.
    pub backoff: BackoffStrategy,
    /// Status codes that should trigger a retry.
    pub retry_status_codes: Vec<u16>,
    /// Whether to retry on connection errors.
    pub retry_on_connection_error: bool,
    /// Whether to retry on timeout errors.
    pub retry_on_timeout: bool,
    /// Maximum total time for all retries.
    pub max_retry_time: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::Exponential {
                initial: Duration::from_millis(100),
                max: Duration::from_secs(10),
                multiplier: 2.0,
            },
            retry_status_codes: vec![408, 429, 500, 502, 503, 504],
            retry_on_connection_error: true,
            retry_on_timeout: true,
            max_retry_time: Some(Duration::from_secs(60)),
        }
    }
}

impl RetryConfig {
    /// Create a retry config with exponential backoff.
    pub fn exponential(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::Exponential {
                initial: initial_delay,
                max: Duration::from_secs(30),
                multiplier: 2.0,
            },
            ..Default::default()
        }
    }

    /// Create a retry config with linear backoff.
    pub fn linear(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::Linear {
                delay,
                max: Duration::from_secs(30),
            },
            ..Default::default()
        }
    }

    /// Create a retry config with constant delay.
    pub fn constant(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::Constant(delay),
            ..Default::default()
        }
    }

    /// Create a retry config with no delay.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::None,
            ..Default::default()
        }
    }

    /// Set additional status codes to retry on.
    pub fn with_status_codes(mut self, codes: Vec<u16>) -> Self {
        self.retry_status_codes = codes;
        self
    }

    /// Disable retry on connection errors.
    pub fn no_retry_on_connection(mut self) -> Self {
        self.retry_on_connection_error = false;
        self
    }

    /// Disable retry on timeout errors.
    pub fn no_retry_on_timeout(mut self) -> Self {
        self.retry_on_timeout = false;
        self
    }

    /// Set maximum total retry time.
    pub fn with_max_retry_time(mut self, duration: Duration) -> Self {
        self.max_retry_time = Some(duration);
        self
    }

    /// Calculate delay for a given attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay_for_attempt(attempt)
    }

    /// Check if an error should trigger a retry.
    pub fn should_retry(&self, error: &ClientError) -> bool {
        match error {
            ClientError::Timeout(_) => self.retry_on_timeout,
            ClientError::Connection(_) => self.retry_on_connection_error,
            ClientError::Response { status, .. } => self.retry_status_codes.contains(status),
            _ => false,
        }
    }
}

/// Backoff strategy for retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// No delay between retries.
    None,
    /// Constant delay between retries.
    Constant(Duration),
    /// Linear backoff: delay increases by a fixed amount.
    Linear {
        /// Delay increment per attempt.
        delay: Duration,
        /// Maximum delay.
        max: Duration,
    },
    /// Exponential backoff: delay doubles each attempt.
    Exponential {
        /// Initial delay.
        initial: Duration,
        /// Maximum delay.
        max: Duration,
        /// Multiplier (typically 2.0).
        multiplier: f64,
    },
}

impl BackoffStrategy {
    /// Calculate delay for a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Constant(d) => *d,
            Self::Linear { delay, max } => {
                let total = delay.saturating_mul(attempt + 1);
                total.min(*max)
            }
            Self::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let factor = multiplier.powi(attempt as i32);
                let millis = (initial.as_millis() as f64 * factor) as u64;
                Duration::from_millis(millis).min(*max)
            }
        }
    }
}

/// Retry policy: re-runs a failed call according to its [`RetryConfig`].
///
/// Non-retryable errors propagate unchanged. A retryable error that exhausts
/// the attempt or time budget is reported as
/// [`ClientError::RetryExhausted`] carrying the last error, so fallback
/// filters can target retry exhaustion as its own failure mode.
#[derive(Debug)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a retry policy from its configuration.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// The policy's configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Wrap `call` with retry behavior.
    ///
    /// Each attempt re-invokes the inner call, so policies wrapped inside this
    /// one are re-applied on every attempt.
    pub fn decorate<T: Send + 'static>(
        self: &Arc<Self>,
        call: Call<T>,
        method: &MethodMetadata,
    ) -> Call<T> {
        let policy = Arc::clone(self);
        let method = method.clone();
        Call::new(move || {
            let policy = Arc::clone(&policy);
            let call = call.clone();
            let method = method.clone();
            async move {
                let start = Instant::now();
                let max_attempts = policy.config.max_attempts.max(1);
                let mut attempt: u32 = 0;
                loop {
                    match call.invoke().await {
                        Ok(value) => return Ok(value),
                        Err(error) => {
                            attempt += 1;
                            if !policy.config.should_retry(&error) {
                                return Err(error);
                            }
                            let out_of_attempts = attempt >= max_attempts;
                            let out_of_time = policy
                                .config
                                .max_retry_time
                                .is_some_and(|max| start.elapsed() >= max);
                            if out_of_attempts || out_of_time {
                                return Err(ClientError::RetryExhausted {
                                    attempts: attempt,
                                    source: Box::new(error),
                                });
                            }

                            let delay = policy.config.delay_for_attempt(attempt - 1);
                            debug!(
                                client = method.client(),
                                method = method.method(),
                                attempt,
                                delay = ?delay,
                                error = %error,
                                "retrying failed call"
                            );
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        })
    }
}
