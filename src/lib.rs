//! # Palisade
//!
//! Resilience decorators for declarative HTTP clients. Palisade composes
//! retry, circuit breaking, rate limiting, bulkhead concurrency limiting, and
//! fallback substitution into an ordered chain that wraps every call of a
//! client interface, without touching call sites.
//!
//! ## Features
//!
//! - **Decorator Chain**: Ordered, immutable composition; the decorator
//!   registered last wraps outermost
//! - **Retry with Backoff**: Configurable strategies (exponential, linear,
//!   constant), with each attempt re-subjected to inner policies
//! - **Circuit Breaker**: Prevents cascade failures with automatic recovery
//! - **Rate Limiter & Bulkhead**: Permit-per-cycle throttling and bounded
//!   concurrency with bounded waits
//! - **Fallbacks**: Fixed targets or per-error factories, filtered by error
//!   kind or predicate, chainable as a priority list
//! - **Registries**: Shared named policy instances and per-client fallback
//!   wiring with eager configuration errors
//!
//! ## Quick Start
//!
//! Implement your client trait once for the transport and once as a thin
//! adapter that routes every method through a [`MethodDispatcher`]:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use palisade::prelude::*;
//!
//! #[async_trait]
//! pub trait UserApi: Send + Sync {
//!     async fn user_name(&self, id: u64) -> Result<String>;
//! }
//!
//! struct HttpUserApi; // transport-backed implementation (elided)
//!
//! #[async_trait]
//! impl UserApi for HttpUserApi {
//!     async fn user_name(&self, _id: u64) -> Result<String> {
//!         Err(ClientError::Timeout(Duration::from_secs(3)))
//!     }
//! }
//!
//! struct CachedUserApi;
//!
//! #[async_trait]
//! impl UserApi for CachedUserApi {
//!     async fn user_name(&self, _id: u64) -> Result<String> {
//!         Ok("cached".to_string())
//!     }
//! }
//!
//! pub struct ResilientUserApi {
//!     dispatcher: MethodDispatcher<dyn UserApi>,
//! }
//!
//! #[async_trait]
//! impl UserApi for ResilientUserApi {
//!     async fn user_name(&self, id: u64) -> Result<String> {
//!         self.dispatcher
//!             .dispatch(
//!                 MethodMetadata::new("users", "user_name"),
//!                 MethodInvoker::new(move |target: Arc<dyn UserApi>| async move {
//!                     target.user_name(id).await
//!                 }),
//!             )
//!             .await
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let chain = DecoratorChain::builder()
//!         .with_circuit_breaker(Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default())))
//!         .with_retry(Arc::new(RetryPolicy::new(RetryConfig::exponential(
//!             3,
//!             Duration::from_millis(100),
//!         ))))
//!         .with_fallback(Arc::new(CachedUserApi) as Arc<dyn UserApi>)
//!         .build();
//!
//!     let api = ResilientUserApi {
//!         dispatcher: MethodDispatcher::new(Arc::new(HttpUserApi) as Arc<dyn UserApi>, chain),
//!     };
//!
//!     let name = api.user_name(42).await?;
//!     println!("{name}");
//!     Ok(())
//! }
//! ```
//!
//! ## Per-Client Configuration
//!
//! Named policies and fallbacks live in registries; a [`ResilienceFactory`]
//! assembles the chain for each client and fails eagerly when a configured
//! fallback is missing or registered under an incompatible type:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use palisade::prelude::*;
//!
//! #[async_trait]
//! trait StatusApi: Send + Sync {
//!     async fn status(&self) -> Result<String>;
//! }
//!
//! struct HttpStatusApi;
//!
//! #[async_trait]
//! impl StatusApi for HttpStatusApi {
//!     async fn status(&self) -> Result<String> {
//!         Err(ClientError::Timeout(Duration::from_secs(3)))
//!     }
//! }
//!
//! struct StaticStatus(&'static str);
//!
//! #[async_trait]
//! impl StatusApi for StaticStatus {
//!     async fn status(&self) -> Result<String> {
//!         Ok(self.0.to_string())
//!     }
//! }
//!
//! fn wire() -> std::result::Result<MethodDispatcher<dyn StatusApi>, ConfigError> {
//!     let factory = ResilienceFactory::new();
//!     factory
//!         .policies()
//!         .add_retry_config("status", RetryConfig::exponential(3, Duration::from_millis(50)));
//!     factory
//!         .fallbacks()
//!         .register_fallback::<dyn StatusApi>("status", Arc::new(StaticStatus("degraded")));
//!
//!     let options = ResilienceOptions::new()
//!         .with_circuit_breaker("status")
//!         .with_retry("status")
//!         .with_fallback()
//!         .with_fallback_filter(ErrorKind::RetryExhausted);
//!
//!     factory.dispatcher_for("status", &options, Arc::new(HttpStatusApi) as Arc<dyn StatusApi>)
//! }
//! # fn main() { let _ = wire(); }
//! ```

mod error;
mod call;
mod retry;
mod circuit_breaker;
mod rate_limiter;
mod bulkhead;
mod fallback;
mod chain;
mod dispatch;
mod registry;
mod config;
mod factory;

pub use bulkhead::{Bulkhead, BulkheadConfig};
pub use call::{Call, MethodInvoker, MethodMetadata};
pub use chain::{ChainBuilder, DecoratorChain};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use config::{FallbackMechanism, ResilienceOptions};
pub use dispatch::MethodDispatcher;
pub use error::{ClientError, ConfigError, ErrorKind, Result};
pub use factory::ResilienceFactory;
pub use fallback::{
    FallbackDecorator, FallbackFactoryFn, FallbackFilter, FallbackHandler, FallbackPredicate,
};
pub use rate_limiter::{RateLimiter, RateLimiterConfig};
pub use registry::{FallbackRegistry, PolicyDefaults, PolicyRegistry};
pub use retry::{BackoffStrategy, RetryConfig, RetryPolicy};

// Re-export for declarative trait definitions
pub use async_trait::async_trait;

/// Prelude for common imports.
///
/// ```
/// use palisade::prelude::*;
/// ```
pub mod prelude {
    pub use crate::async_trait;
    pub use crate::bulkhead::{Bulkhead, BulkheadConfig};
    pub use crate::call::{Call, MethodInvoker, MethodMetadata};
    pub use crate::chain::{ChainBuilder, DecoratorChain};
    pub use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
    pub use crate::config::{FallbackMechanism, ResilienceOptions};
    pub use crate::dispatch::MethodDispatcher;
    pub use crate::error::{ClientError, ConfigError, ErrorKind, Result};
    pub use crate::factory::ResilienceFactory;
    pub use crate::fallback::{FallbackDecorator, FallbackFilter, FallbackHandler};
    pub use crate::rate_limiter::{RateLimiter, RateLimiterConfig};
    pub use crate::registry::{FallbackRegistry, PolicyDefaults, PolicyRegistry};
    pub use crate::retry::{BackoffStrategy, RetryConfig, RetryPolicy};
}
