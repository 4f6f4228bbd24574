//! Permit-per-cycle rate limiter.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::call::{Call, MethodMetadata};
use crate::error::{ClientError, Result};

/// Rate limiter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    /// Permits available per refresh cycle.
    pub limit_for_period: u32,
    /// Length of one refresh cycle.
    pub limit_refresh_period: Duration,
    /// Maximum time a call may wait for a permit.
    pub timeout_duration: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            limit_for_period: 50,
            limit_refresh_period: Duration::from_secs(1),
            timeout_duration: Duration::from_secs(5),
        }
    }
}

impl RateLimiterConfig {
    /// Create a config allowing `limit_for_period` calls per `period`.
    pub fn new(limit_for_period: u32, period: Duration) -> Self {
        Self {
            limit_for_period,
            limit_refresh_period: period,
            ..Default::default()
        }
    }

    /// Set the maximum time a call may wait for a permit.
    pub fn with_timeout_duration(mut self, timeout: Duration) -> Self {
        self.timeout_duration = timeout;
        self
    }
}

#[derive(Debug)]
struct Cycle {
    started_at: Instant,
    permits_used: u32,
}

/// Rate limiter: a fixed pool of permits refreshed every cycle.
///
/// A call without an available permit waits for the next cycle, up to the
/// configured timeout, then is rejected with [`ClientError::RateLimited`].
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    cycle: Mutex<Cycle>,
}

impl RateLimiter {
    /// Create a rate limiter from its configuration.
    pub fn new(mut config: RateLimiterConfig) -> Self {
        config.limit_refresh_period = config.limit_refresh_period.max(Duration::from_millis(1));
        Self {
            config,
            cycle: Mutex::new(Cycle {
                started_at: Instant::now(),
                permits_used: 0,
            }),
        }
    }

    /// The limiter's configuration.
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Take a permit from the current cycle, or report how long until the
    /// next one starts.
    fn try_acquire(&self) -> std::result::Result<(), Duration> {
        let mut cycle = self.cycle.lock();
        let elapsed = cycle.started_at.elapsed();
        if elapsed >= self.config.limit_refresh_period {
            cycle.started_at = Instant::now();
            cycle.permits_used = 0;
        }
        if cycle.permits_used < self.config.limit_for_period.max(1) {
            cycle.permits_used += 1;
            Ok(())
        } else {
            Err(self
                .config
                .limit_refresh_period
                .saturating_sub(cycle.started_at.elapsed()))
        }
    }

    /// Wait for a permit, up to the configured timeout.
    pub async fn acquire(&self) -> Result<()> {
        let deadline = Instant::now() + self.config.timeout_duration;
        loop {
            match self.try_acquire() {
                Ok(()) => return Ok(()),
                Err(wait) => {
                    if Instant::now() + wait > deadline {
                        return Err(ClientError::RateLimited(self.config.timeout_duration));
                    }
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Wrap `call` so each invocation first acquires a permit.
    pub fn decorate<T: Send + 'static>(
        self: &Arc<Self>,
        call: Call<T>,
        method: &MethodMetadata,
    ) -> Call<T> {
        let limiter = Arc::clone(self);
        let method = method.clone();
        Call::new(move || {
            let limiter = Arc::clone(&limiter);
            let call = call.clone();
            let method = method.clone();
            async move {
                if let Err(error) = limiter.acquire().await {
                    debug!(
                        client = method.client(),
                        method = method.method(),
                        "rate limit exceeded, rejecting call"
                    );
                    return Err(error);
                }
                call.invoke().await
            }
        })
    }
}
