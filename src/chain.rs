//! Ordered composition of call decorators.

use std::fmt;
use std::sync::Arc;

use crate::bulkhead::Bulkhead;
use crate::call::{Call, MethodInvoker, MethodMetadata};
use crate::circuit_breaker::CircuitBreaker;
use crate::error::{ClientError, ErrorKind};
use crate::fallback::{FallbackDecorator, FallbackFilter, FallbackHandler};
use crate::rate_limiter::RateLimiter;
use crate::retry::RetryPolicy;

/// One layer of a chain, closing over its shared policy object.
pub(crate) enum Decorator<S: ?Sized> {
    Retry(Arc<RetryPolicy>),
    CircuitBreaker(Arc<CircuitBreaker>),
    RateLimiter(Arc<RateLimiter>),
    Bulkhead(Arc<Bulkhead>),
    Fallback(FallbackDecorator<S>),
}

impl<S> Decorator<S>
where
    S: ?Sized + Send + Sync + 'static,
{
    fn decorate<T: Send + 'static>(
        &self,
        call: Call<T>,
        method: &MethodMetadata,
        invoker: &MethodInvoker<S, T>,
    ) -> Call<T> {
        match self {
            Self::Retry(policy) => policy.decorate(call, method),
            Self::CircuitBreaker(breaker) => breaker.decorate(call, method),
            Self::RateLimiter(limiter) => limiter.decorate(call, method),
            Self::Bulkhead(bulkhead) => bulkhead.decorate(call, method),
            Self::Fallback(fallback) => fallback.decorate(call, method, invoker),
        }
    }
}

impl<S: ?Sized> Decorator<S> {
    fn name(&self) -> &'static str {
        match self {
            Self::Retry(_) => "retry",
            Self::CircuitBreaker(_) => "circuit_breaker",
            Self::RateLimiter(_) => "rate_limiter",
            Self::Bulkhead(_) => "bulkhead",
            Self::Fallback(_) => "fallback",
        }
    }
}

/// An immutable, ordered chain of decorators shared by every invocation of a
/// client.
///
/// Decorators are applied to a base call in registration order, so the
/// decorator registered last ends up outermost: it runs first and decides
/// whether the inner layers run at all. Register fallbacks last so they see
/// failures from every other policy, and register retry after the policies
/// each attempt should be re-subjected to. The builder does not validate
/// ordering; that responsibility rests with the caller.
///
/// The chain holds no mutable state. All mutable policy state lives inside the
/// shared policy objects, so one chain serves any number of concurrent
/// invocations without locking.
pub struct DecoratorChain<S: ?Sized> {
    decorators: Vec<Decorator<S>>,
}

impl<S> DecoratorChain<S>
where
    S: ?Sized + Send + Sync + 'static,
{
    /// Start building a chain.
    pub fn builder() -> ChainBuilder<S> {
        ChainBuilder::new()
    }

    /// Wrap a base call in every decorator of the chain.
    ///
    /// With no decorators registered, the call is returned unchanged.
    pub fn decorate<T: Send + 'static>(
        &self,
        call: Call<T>,
        method: &MethodMetadata,
        invoker: &MethodInvoker<S, T>,
    ) -> Call<T> {
        self.decorators
            .iter()
            .fold(call, |call, decorator| decorator.decorate(call, method, invoker))
    }

    /// Number of decorators in the chain.
    pub fn len(&self) -> usize {
        self.decorators.len()
    }

    /// Whether the chain has no decorators.
    pub fn is_empty(&self) -> bool {
        self.decorators.is_empty()
    }
}

impl<S: ?Sized> fmt::Debug for DecoratorChain<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.decorators.iter().map(Decorator::name))
            .finish()
    }
}

/// Fluent builder accumulating decorators in registration order.
///
/// `build` consumes the builder, freezing the list into an immutable
/// [`DecoratorChain`].
pub struct ChainBuilder<S: ?Sized> {
    decorators: Vec<Decorator<S>>,
}

impl<S> ChainBuilder<S>
where
    S: ?Sized + Send + Sync + 'static,
{
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            decorators: Vec::new(),
        }
    }

    /// Add a retry policy to the chain.
    pub fn with_retry(mut self, policy: Arc<RetryPolicy>) -> Self {
        self.decorators.push(Decorator::Retry(policy));
        self
    }

    /// Add a circuit breaker to the chain.
    pub fn with_circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.decorators.push(Decorator::CircuitBreaker(breaker));
        self
    }

    /// Add a rate limiter to the chain.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.decorators.push(Decorator::RateLimiter(limiter));
        self
    }

    /// Add a bulkhead to the chain.
    pub fn with_bulkhead(mut self, bulkhead: Arc<Bulkhead>) -> Self {
        self.decorators.push(Decorator::Bulkhead(bulkhead));
        self
    }

    /// Add a catch-all fallback target.
    ///
    /// Multiple fallbacks may be added; each one only triggers if the call
    /// reaching it still fails, so they chain as a priority list.
    pub fn with_fallback(self, fallback: Arc<S>) -> Self {
        self.with_fallback_decorator(FallbackDecorator::new(FallbackHandler::Fixed(fallback)))
    }

    /// Add a fallback target triggered only by errors of `kind`.
    pub fn with_fallback_on(self, fallback: Arc<S>, kind: ErrorKind) -> Self {
        self.with_fallback_decorator(FallbackDecorator::with_filter(
            FallbackHandler::Fixed(fallback),
            FallbackFilter::Kind(kind),
        ))
    }

    /// Add a fallback target triggered only by errors satisfying `filter`.
    pub fn with_fallback_when<F>(self, fallback: Arc<S>, filter: F) -> Self
    where
        F: Fn(&ClientError) -> bool + Send + Sync + 'static,
    {
        self.with_fallback_decorator(FallbackDecorator::with_filter(
            FallbackHandler::Fixed(fallback),
            FallbackFilter::predicate(filter),
        ))
    }

    /// Add a catch-all fallback factory, invoked with the triggering error.
    pub fn with_fallback_factory<F>(self, factory: F) -> Self
    where
        F: Fn(&ClientError) -> Arc<S> + Send + Sync + 'static,
    {
        self.with_fallback_decorator(FallbackDecorator::new(FallbackHandler::Factory(Arc::new(
            factory,
        ))))
    }

    /// Add a fallback factory triggered only by errors of `kind`.
    pub fn with_fallback_factory_on<F>(self, factory: F, kind: ErrorKind) -> Self
    where
        F: Fn(&ClientError) -> Arc<S> + Send + Sync + 'static,
    {
        self.with_fallback_decorator(FallbackDecorator::with_filter(
            FallbackHandler::Factory(Arc::new(factory)),
            FallbackFilter::Kind(kind),
        ))
    }

    /// Add a fallback factory triggered only by errors satisfying `filter`.
    pub fn with_fallback_factory_when<F, P>(self, factory: F, filter: P) -> Self
    where
        F: Fn(&ClientError) -> Arc<S> + Send + Sync + 'static,
        P: Fn(&ClientError) -> bool + Send + Sync + 'static,
    {
        self.with_fallback_decorator(FallbackDecorator::with_filter(
            FallbackHandler::Factory(Arc::new(factory)),
            FallbackFilter::predicate(filter),
        ))
    }

    /// Add a pre-built fallback decorator.
    pub fn with_fallback_decorator(mut self, fallback: FallbackDecorator<S>) -> Self {
        self.decorators.push(Decorator::Fallback(fallback));
        self
    }

    /// Freeze the accumulated decorators into an immutable chain.
    pub fn build(self) -> DecoratorChain<S> {
        DecoratorChain {
            decorators: self.decorators,
        }
    }
}

impl<S> Default for ChainBuilder<S>
where
    S: ?Sized + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
