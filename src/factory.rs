//! Assembles decorator chains for named clients.

use std::sync::Arc;
use tracing::debug;

use crate::chain::DecoratorChain;
use crate::config::{FallbackMechanism, ResilienceOptions};
use crate::dispatch::MethodDispatcher;
use crate::error::ConfigError;
use crate::fallback::{FallbackDecorator, FallbackHandler};
use crate::registry::{FallbackRegistry, PolicyDefaults, PolicyRegistry};

/// Builds per-client decorator chains from the policy and fallback
/// registries.
///
/// Decorators are registered in a fixed order: circuit breaker, rate limiter,
/// and bulkhead first (innermost), then retry, so every retry attempt is
/// re-subjected to them, then the fallback last, so it observes failures from
/// every other policy. Fallback resolution failures abort assembly with a
/// [`ConfigError`] before any call is made.
pub struct ResilienceFactory {
    policies: PolicyRegistry,
    fallbacks: FallbackRegistry,
}

impl ResilienceFactory {
    /// Create a factory with default policy configurations.
    pub fn new() -> Self {
        Self {
            policies: PolicyRegistry::new(),
            fallbacks: FallbackRegistry::new(),
        }
    }

    /// Create a factory whose policies are created from `defaults`.
    pub fn with_defaults(defaults: PolicyDefaults) -> Self {
        Self {
            policies: PolicyRegistry::with_defaults(defaults),
            fallbacks: FallbackRegistry::new(),
        }
    }

    /// The policy registry backing this factory.
    pub fn policies(&self) -> &PolicyRegistry {
        &self.policies
    }

    /// The fallback registry backing this factory.
    pub fn fallbacks(&self) -> &FallbackRegistry {
        &self.fallbacks
    }

    /// Assemble the decorator chain for `client` according to `options`.
    pub fn chain_for<S>(
        &self,
        client: &str,
        options: &ResilienceOptions,
    ) -> Result<DecoratorChain<S>, ConfigError>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        let mut builder = DecoratorChain::builder();

        if let Some(name) = options.circuit_breaker.as_deref() {
            builder = builder.with_circuit_breaker(self.policies.circuit_breaker(name));
        }
        if let Some(name) = options.rate_limiter.as_deref() {
            builder = builder.with_rate_limiter(self.policies.rate_limiter(name));
        }
        if let Some(name) = options.bulkhead.as_deref() {
            builder = builder.with_bulkhead(self.policies.bulkhead(name));
        }
        if let Some(name) = options.retry.as_deref() {
            builder = builder.with_retry(self.policies.retry(name));
        }

        if let Some(mechanism) = options.fallback {
            let handler = match mechanism {
                FallbackMechanism::Fixed => {
                    FallbackHandler::Fixed(self.fallbacks.fallback::<S>(client)?)
                }
                FallbackMechanism::Factory => {
                    FallbackHandler::Factory(self.fallbacks.fallback_factory::<S>(client)?)
                }
            };
            let filter = options.fallback_filter.clone().unwrap_or_default();
            builder =
                builder.with_fallback_decorator(FallbackDecorator::with_filter(handler, filter));
        }

        let chain = builder.build();
        debug!(client, chain = ?chain, "assembled decorator chain");
        Ok(chain)
    }

    /// Assemble a dispatcher for `client` over the primary `target`.
    pub fn dispatcher_for<S>(
        &self,
        client: &str,
        options: &ResilienceOptions,
        target: Arc<S>,
    ) -> Result<MethodDispatcher<S>, ConfigError>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        Ok(MethodDispatcher::new(target, self.chain_for(client, options)?))
    }
}

impl Default for ResilienceFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;

    #[test]
    fn test_chain_includes_only_configured_policies() {
        let factory = ResilienceFactory::new();
        let options = ResilienceOptions::new()
            .with_circuit_breaker("users")
            .with_retry("users");

        let chain = factory.chain_for::<str>("users", &options).unwrap();
        assert_eq!(format!("{chain:?}"), r#"["circuit_breaker", "retry"]"#);
    }

    #[test]
    fn test_empty_options_build_an_empty_chain() {
        let factory = ResilienceFactory::new();
        let chain = factory
            .chain_for::<str>("users", &ResilienceOptions::new())
            .unwrap();
        assert!(chain.is_empty());
    }

    #[test]
    fn test_configured_fallback_must_be_registered() {
        let factory = ResilienceFactory::new();
        let options = ResilienceOptions::new().with_fallback();

        let err = factory.chain_for::<str>("users", &options).unwrap_err();
        assert!(matches!(err, ConfigError::MissingFallback { .. }));
        assert!(err.to_string().contains("users"));
    }

    #[test]
    fn test_fallback_order_is_outermost() {
        let factory = ResilienceFactory::new();
        factory
            .fallbacks()
            .register_fallback::<str>("users", Arc::from("backup"));
        let options = ResilienceOptions::new()
            .with_retry("users")
            .with_bulkhead("users")
            .with_fallback();

        let chain = factory.chain_for::<str>("users", &options).unwrap();
        assert_eq!(
            format!("{chain:?}"),
            r#"["bulkhead", "retry", "fallback"]"#
        );
    }

    #[test]
    fn test_factory_mechanism_resolves_the_registered_factory() {
        let factory = ResilienceFactory::new();
        factory
            .fallbacks()
            .register_fallback_factory::<str, _>("users", |_: &ClientError| Arc::from("routed"));

        let options = ResilienceOptions::new().with_fallback_factory();
        let chain = factory.chain_for::<str>("users", &options).unwrap();
        assert_eq!(chain.len(), 1);

        // A fixed-fallback request against the same entry is incompatible
        let fixed = ResilienceOptions::new().with_fallback();
        let err = factory.chain_for::<str>("users", &fixed).unwrap_err();
        assert!(matches!(err, ConfigError::IncompatibleFallback { .. }));
    }
}
