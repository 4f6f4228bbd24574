//! Per-client resilience configuration.

use serde::{Deserialize, Serialize};

use crate::fallback::FallbackFilter;

/// Which fallback mechanism a client is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMechanism {
    /// A fixed fallback target resolved from the registry.
    Fixed,
    /// A fallback factory resolved from the registry.
    Factory,
}

/// The recognized per-client options. All are independently optional; a chain
/// may include any subset.
#[derive(Debug, Clone, Default)]
pub struct ResilienceOptions {
    /// Name of the retry policy to apply.
    pub retry: Option<String>,
    /// Name of the circuit breaker to apply.
    pub circuit_breaker: Option<String>,
    /// Name of the rate limiter to apply.
    pub rate_limiter: Option<String>,
    /// Name of the bulkhead to apply.
    pub bulkhead: Option<String>,
    /// Fallback mechanism to resolve from the fallback registry.
    pub fallback: Option<FallbackMechanism>,
    /// Filter restricting which errors trigger the fallback.
    pub fallback_filter: Option<FallbackFilter>,
}

impl ResilienceOptions {
    /// Create options with nothing configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the named retry policy.
    pub fn with_retry(mut self, name: impl Into<String>) -> Self {
        self.retry = Some(name.into());
        self
    }

    /// Apply the named circuit breaker.
    pub fn with_circuit_breaker(mut self, name: impl Into<String>) -> Self {
        self.circuit_breaker = Some(name.into());
        self
    }

    /// Apply the named rate limiter.
    pub fn with_rate_limiter(mut self, name: impl Into<String>) -> Self {
        self.rate_limiter = Some(name.into());
        self
    }

    /// Apply the named bulkhead.
    pub fn with_bulkhead(mut self, name: impl Into<String>) -> Self {
        self.bulkhead = Some(name.into());
        self
    }

    /// Use the fixed fallback registered for the client.
    pub fn with_fallback(mut self) -> Self {
        self.fallback = Some(FallbackMechanism::Fixed);
        self
    }

    /// Use the fallback factory registered for the client.
    pub fn with_fallback_factory(mut self) -> Self {
        self.fallback = Some(FallbackMechanism::Factory);
        self
    }

    /// Restrict the fallback to errors matching `filter`.
    pub fn with_fallback_filter(mut self, filter: impl Into<FallbackFilter>) -> Self {
        self.fallback_filter = Some(filter.into());
        self
    }
}
