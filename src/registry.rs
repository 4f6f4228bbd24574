//! Registries for shared policy instances and fallback targets.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::bulkhead::{Bulkhead, BulkheadConfig};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::error::ConfigError;
use crate::fallback::FallbackFactoryFn;
use crate::rate_limiter::{RateLimiter, RateLimiterConfig};
use crate::retry::{RetryConfig, RetryPolicy};

/// Default configurations used when a named policy has no override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyDefaults {
    /// Default retry configuration.
    pub retry: RetryConfig,
    /// Default circuit breaker configuration.
    pub circuit_breaker: CircuitBreakerConfig,
    /// Default rate limiter configuration.
    pub rate_limiter: RateLimiterConfig,
    /// Default bulkhead configuration.
    pub bulkhead: BulkheadConfig,
}

/// Owns the long-lived, shared policy instances, keyed by name.
///
/// Lookups create the policy on first use and return the same instance on
/// every subsequent call for that name. Policies are created from a per-name
/// config override when one was added, falling back to the registry defaults.
pub struct PolicyRegistry {
    defaults: PolicyDefaults,
    retry_configs: RwLock<HashMap<String, RetryConfig>>,
    breaker_configs: RwLock<HashMap<String, CircuitBreakerConfig>>,
    limiter_configs: RwLock<HashMap<String, RateLimiterConfig>>,
    bulkhead_configs: RwLock<HashMap<String, BulkheadConfig>>,
    retries: RwLock<HashMap<String, Arc<RetryPolicy>>>,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    limiters: RwLock<HashMap<String, Arc<RateLimiter>>>,
    bulkheads: RwLock<HashMap<String, Arc<Bulkhead>>>,
}

impl PolicyRegistry {
    /// Create a registry with default policy configurations.
    pub fn new() -> Self {
        Self::with_defaults(PolicyDefaults::default())
    }

    /// Create a registry with custom default configurations.
    pub fn with_defaults(defaults: PolicyDefaults) -> Self {
        Self {
            defaults,
            retry_configs: RwLock::new(HashMap::new()),
            breaker_configs: RwLock::new(HashMap::new()),
            limiter_configs: RwLock::new(HashMap::new()),
            bulkhead_configs: RwLock::new(HashMap::new()),
            retries: RwLock::new(HashMap::new()),
            breakers: RwLock::new(HashMap::new()),
            limiters: RwLock::new(HashMap::new()),
            bulkheads: RwLock::new(HashMap::new()),
        }
    }

    /// Set the configuration used when the retry policy `name` is first
    /// created. Has no effect on an already-created instance.
    pub fn add_retry_config(&self, name: impl Into<String>, config: RetryConfig) {
        self.retry_configs.write().insert(name.into(), config);
    }

    /// Set the configuration used when the circuit breaker `name` is first
    /// created.
    pub fn add_circuit_breaker_config(&self, name: impl Into<String>, config: CircuitBreakerConfig) {
        self.breaker_configs.write().insert(name.into(), config);
    }

    /// Set the configuration used when the rate limiter `name` is first
    /// created.
    pub fn add_rate_limiter_config(&self, name: impl Into<String>, config: RateLimiterConfig) {
        self.limiter_configs.write().insert(name.into(), config);
    }

    /// Set the configuration used when the bulkhead `name` is first created.
    pub fn add_bulkhead_config(&self, name: impl Into<String>, config: BulkheadConfig) {
        self.bulkhead_configs.write().insert(name.into(), config);
    }

    /// Look up or create the retry policy `name`.
    pub fn retry(&self, name: &str) -> Arc<RetryPolicy> {
        if let Some(policy) = self.retries.read().get(name) {
            return Arc::clone(policy);
        }
        let mut retries = self.retries.write();
        Arc::clone(retries.entry(name.to_string()).or_insert_with(|| {
            let config = self
                .retry_configs
                .read()
                .get(name)
                .cloned()
                .unwrap_or_else(|| self.defaults.retry.clone());
            debug!(name, max_attempts = config.max_attempts, "created retry policy");
            Arc::new(RetryPolicy::new(config))
        }))
    }

    /// Look up or create the circuit breaker `name`.
    pub fn circuit_breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().get(name) {
            return Arc::clone(breaker);
        }
        let mut breakers = self.breakers.write();
        Arc::clone(breakers.entry(name.to_string()).or_insert_with(|| {
            let config = self
                .breaker_configs
                .read()
                .get(name)
                .cloned()
                .unwrap_or_else(|| self.defaults.circuit_breaker.clone());
            debug!(
                name,
                failure_threshold = config.failure_threshold,
                reset_timeout = ?config.reset_timeout,
                "created circuit breaker"
            );
            Arc::new(CircuitBreaker::new(config))
        }))
    }

    /// Look up or create the rate limiter `name`.
    pub fn rate_limiter(&self, name: &str) -> Arc<RateLimiter> {
        if let Some(limiter) = self.limiters.read().get(name) {
            return Arc::clone(limiter);
        }
        let mut limiters = self.limiters.write();
        Arc::clone(limiters.entry(name.to_string()).or_insert_with(|| {
            let config = self
                .limiter_configs
                .read()
                .get(name)
                .cloned()
                .unwrap_or_else(|| self.defaults.rate_limiter.clone());
            debug!(
                name,
                limit_for_period = config.limit_for_period,
                limit_refresh_period = ?config.limit_refresh_period,
                timeout_duration = ?config.timeout_duration,
                "created rate limiter"
            );
            Arc::new(RateLimiter::new(config))
        }))
    }

    /// Look up or create the bulkhead `name`.
    pub fn bulkhead(&self, name: &str) -> Arc<Bulkhead> {
        if let Some(bulkhead) = self.bulkheads.read().get(name) {
            return Arc::clone(bulkhead);
        }
        let mut bulkheads = self.bulkheads.write();
        Arc::clone(bulkheads.entry(name.to_string()).or_insert_with(|| {
            let config = self
                .bulkhead_configs
                .read()
                .get(name)
                .cloned()
                .unwrap_or_else(|| self.defaults.bulkhead.clone());
            debug!(
                name,
                max_concurrent_calls = config.max_concurrent_calls,
                max_wait_duration = ?config.max_wait_duration,
                "created bulkhead"
            );
            Arc::new(Bulkhead::new(config))
        }))
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

struct FallbackEntry {
    value: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
    mechanism: &'static str,
}

/// Registry of fallback targets and factories, keyed by client name.
///
/// Entries are type-erased so clients of different declarative interfaces can
/// share one registry; lookups downcast back to the requested interface type
/// and fail with a descriptive [`ConfigError`] when the entry is missing or
/// registered under an incompatible type. Those errors surface at
/// chain-assembly time, before any invocation.
pub struct FallbackRegistry {
    entries: RwLock<HashMap<String, FallbackEntry>>,
}

impl FallbackRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register a fixed fallback target for `client`.
    pub fn register_fallback<S>(&self, client: &str, fallback: Arc<S>)
    where
        S: ?Sized + Send + Sync + 'static,
    {
        debug!(client, fallback = std::any::type_name::<Arc<S>>(), "registered fallback");
        self.entries.write().insert(
            client.to_string(),
            FallbackEntry {
                value: Box::new(fallback),
                type_name: std::any::type_name::<Arc<S>>(),
                mechanism: "fallback",
            },
        );
    }

    /// Register a fallback factory for `client`.
    pub fn register_fallback_factory<S, F>(&self, client: &str, factory: F)
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&crate::error::ClientError) -> Arc<S> + Send + Sync + 'static,
    {
        let factory: FallbackFactoryFn<S> = Arc::new(factory);
        debug!(
            client,
            fallback = std::any::type_name::<FallbackFactoryFn<S>>(),
            "registered fallback factory"
        );
        self.entries.write().insert(
            client.to_string(),
            FallbackEntry {
                value: Box::new(factory),
                type_name: std::any::type_name::<FallbackFactoryFn<S>>(),
                mechanism: "fallback factory",
            },
        );
    }

    /// Whether any fallback entry exists for `client`.
    pub fn contains(&self, client: &str) -> bool {
        self.entries.read().contains_key(client)
    }

    /// Resolve the fixed fallback target registered for `client`.
    pub fn fallback<S>(&self, client: &str) -> Result<Arc<S>, ConfigError>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.lookup::<Arc<S>>(client, "fallback")
    }

    /// Resolve the fallback factory registered for `client`.
    pub fn fallback_factory<S>(&self, client: &str) -> Result<FallbackFactoryFn<S>, ConfigError>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.lookup::<FallbackFactoryFn<S>>(client, "fallback factory")
    }

    fn lookup<V: Clone + 'static>(
        &self,
        client: &str,
        mechanism: &'static str,
    ) -> Result<V, ConfigError> {
        let expected = std::any::type_name::<V>();
        let entries = self.entries.read();
        let entry = entries.get(client).ok_or_else(|| ConfigError::MissingFallback {
            mechanism,
            client: client.to_string(),
            expected,
        })?;
        entry
            .value
            .downcast_ref::<V>()
            .cloned()
            .ok_or_else(|| ConfigError::IncompatibleFallback {
                mechanism: entry.mechanism,
                client: client.to_string(),
                expected,
                found: entry.type_name,
            })
    }
}

impl Default for FallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use std::time::Duration;

    #[test]
    fn test_policy_lookup_is_idempotent_per_name() {
        let registry = PolicyRegistry::new();

        let a = registry.retry("payments");
        let b = registry.retry("payments");
        let other = registry.retry("search");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &other));

        let cb_a = registry.circuit_breaker("payments");
        let cb_b = registry.circuit_breaker("payments");
        assert!(Arc::ptr_eq(&cb_a, &cb_b));
    }

    #[test]
    fn test_named_config_overrides_the_default() {
        let registry = PolicyRegistry::new();
        registry.add_retry_config("payments", RetryConfig::immediate(7));

        assert_eq!(registry.retry("payments").config().max_attempts, 7);
        assert_eq!(
            registry.retry("search").config().max_attempts,
            RetryConfig::default().max_attempts
        );
    }

    #[test]
    fn test_policy_defaults_deserialize_from_json() {
        let defaults: PolicyDefaults = serde_json::from_str(
            r#"{
                "retry": { "max_attempts": 5, "backoff": "none" },
                "bulkhead": { "max_concurrent_calls": 4 }
            }"#,
        )
        .unwrap();

        assert_eq!(defaults.retry.max_attempts, 5);
        assert_eq!(defaults.bulkhead.max_concurrent_calls, 4);
        assert_eq!(
            defaults.rate_limiter.limit_for_period,
            RateLimiterConfig::default().limit_for_period
        );

        let registry = PolicyRegistry::with_defaults(defaults);
        assert_eq!(registry.retry("any").config().max_attempts, 5);
    }

    #[test]
    fn test_missing_fallback_is_a_config_error() {
        let registry = FallbackRegistry::new();

        let err = registry.fallback::<str>("users").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("users"));
        assert!(message.contains("str"));
        assert!(matches!(err, ConfigError::MissingFallback { .. }));
    }

    #[test]
    fn test_incompatible_fallback_names_both_types() {
        let registry = FallbackRegistry::new();
        registry.register_fallback::<str>("users", Arc::from("backup"));

        let err = registry.fallback::<[u8]>("users").unwrap_err();
        assert!(matches!(err, ConfigError::IncompatibleFallback { .. }));
        let message = err.to_string();
        assert!(message.contains("users"));
        assert!(message.contains("str"));
    }

    #[test]
    fn test_factory_entry_does_not_satisfy_fixed_lookup() {
        let registry = FallbackRegistry::new();
        registry.register_fallback_factory::<str, _>("users", |_: &ClientError| Arc::from("x"));

        assert!(registry.fallback::<str>("users").is_err());
        let factory = registry.fallback_factory::<str>("users").unwrap();
        let resolved = factory(&ClientError::Timeout(Duration::from_secs(1)));
        assert_eq!(&*resolved, "x");
    }
}
