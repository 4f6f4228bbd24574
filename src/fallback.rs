//! Fallback substitution for failed calls.

use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::call::{Call, MethodInvoker, MethodMetadata};
use crate::error::{ClientError, ErrorKind};

/// Predicate deciding whether an error triggers a fallback.
pub type FallbackPredicate = Arc<dyn Fn(&ClientError) -> bool + Send + Sync>;

/// Factory producing a fallback target from the triggering error.
pub type FallbackFactoryFn<S> = Arc<dyn Fn(&ClientError) -> Arc<S> + Send + Sync>;

/// Decides which errors hand control to the fallback.
#[derive(Clone, Default)]
pub enum FallbackFilter {
    /// Every error matches.
    #[default]
    Any,
    /// Errors of one [`ErrorKind`] match.
    Kind(ErrorKind),
    /// Errors satisfying the predicate match.
    Predicate(FallbackPredicate),
}

impl FallbackFilter {
    /// Build a predicate filter from a closure.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&ClientError) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    /// Check whether `error` should trigger the fallback.
    pub fn matches(&self, error: &ClientError) -> bool {
        match self {
            Self::Any => true,
            Self::Kind(kind) => error.kind() == *kind,
            Self::Predicate(predicate) => predicate(error),
        }
    }
}

impl From<ErrorKind> for FallbackFilter {
    fn from(kind: ErrorKind) -> Self {
        Self::Kind(kind)
    }
}

impl fmt::Debug for FallbackFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("Any"),
            Self::Kind(kind) => f.debug_tuple("Kind").field(kind).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Resolves the substitute target for a failed call.
///
/// Constructed once per client configuration and reused across calls.
pub enum FallbackHandler<S: ?Sized> {
    /// Always substitutes the same pre-supplied target.
    Fixed(Arc<S>),
    /// Chooses a target per triggering error.
    Factory(FallbackFactoryFn<S>),
}

impl<S: ?Sized> Clone for FallbackHandler<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Fixed(target) => Self::Fixed(Arc::clone(target)),
            Self::Factory(factory) => Self::Factory(Arc::clone(factory)),
        }
    }
}

impl<S: ?Sized> FallbackHandler<S> {
    /// Resolve the substitute for `error`.
    pub fn resolve(&self, error: &ClientError) -> Arc<S> {
        match self {
            Self::Fixed(target) => Arc::clone(target),
            Self::Factory(factory) => factory(error),
        }
    }
}

impl<S: ?Sized> fmt::Debug for FallbackHandler<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(_) => f.write_str("Fixed(..)"),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Wraps a call so that failures matching the filter are answered by invoking
/// the same method on a substitute target.
///
/// Errors raised by the substitute itself propagate unchanged; they are never
/// re-filtered by this decorator. An outer fallback decorator, if one is
/// registered, may still catch them, which is how multiple fallbacks chain as
/// a priority list.
#[derive(Debug)]
pub struct FallbackDecorator<S: ?Sized> {
    handler: FallbackHandler<S>,
    filter: FallbackFilter,
}

impl<S: ?Sized> Clone for FallbackDecorator<S> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            filter: self.filter.clone(),
        }
    }
}

impl<S> FallbackDecorator<S>
where
    S: ?Sized + Send + Sync + 'static,
{
    /// Catch-all fallback: every error triggers the handler.
    pub fn new(handler: FallbackHandler<S>) -> Self {
        Self {
            handler,
            filter: FallbackFilter::Any,
        }
    }

    /// Fallback limited to errors matching `filter`.
    pub fn with_filter(handler: FallbackHandler<S>, filter: FallbackFilter) -> Self {
        Self { handler, filter }
    }

    /// Wrap `call` with fallback substitution.
    pub fn decorate<T: Send + 'static>(
        &self,
        call: Call<T>,
        method: &MethodMetadata,
        invoker: &MethodInvoker<S, T>,
    ) -> Call<T> {
        let handler = self.handler.clone();
        let filter = self.filter.clone();
        let invoker = invoker.clone();
        let method = method.clone();
        Call::new(move || {
            let call = call.clone();
            let handler = handler.clone();
            let filter = filter.clone();
            let invoker = invoker.clone();
            let method = method.clone();
            async move {
                match call.invoke().await {
                    Ok(value) => Ok(value),
                    Err(error) if filter.matches(&error) => {
                        debug!(
                            client = method.client(),
                            method = method.method(),
                            error = %error,
                            "call failed, invoking fallback"
                        );
                        let substitute = handler.resolve(&error);
                        invoker.invoke(substitute).await
                    }
                    Err(error) => Err(error),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn timeout() -> ClientError {
        ClientError::Timeout(Duration::from_secs(1))
    }

    fn response(status: u16) -> ClientError {
        ClientError::Response {
            status,
            message: "error".to_string(),
        }
    }

    #[test]
    fn test_any_filter_matches_everything() {
        let filter = FallbackFilter::Any;
        assert!(filter.matches(&timeout()));
        assert!(filter.matches(&response(500)));
        assert!(filter.matches(&ClientError::CircuitOpen));
    }

    #[test]
    fn test_kind_filter_matches_by_discriminant() {
        let filter = FallbackFilter::from(ErrorKind::Timeout);
        assert!(filter.matches(&timeout()));
        assert!(!filter.matches(&response(503)));
        assert!(!filter.matches(&ClientError::CircuitOpen));
    }

    #[test]
    fn test_predicate_filter_inspects_the_error() {
        let filter = FallbackFilter::predicate(|e| e.status_code() == Some(503));
        assert!(filter.matches(&response(503)));
        assert!(!filter.matches(&response(500)));
        assert!(!filter.matches(&timeout()));
    }

    #[test]
    fn test_fixed_handler_always_resolves_the_same_target() {
        let target: Arc<str> = Arc::from("fallback");
        let handler = FallbackHandler::Fixed(Arc::clone(&target));

        let a = handler.resolve(&timeout());
        let b = handler.resolve(&response(500));
        assert!(Arc::ptr_eq(&a, &target));
        assert!(Arc::ptr_eq(&b, &target));
    }

    #[test]
    fn test_factory_handler_routes_by_error() {
        let rejected: Arc<str> = Arc::from("rejected");
        let generic: Arc<str> = Arc::from("generic");
        let handler = {
            let rejected = Arc::clone(&rejected);
            let generic = Arc::clone(&generic);
            FallbackHandler::Factory(Arc::new(move |error: &ClientError| {
                if error.is_rejection() {
                    Arc::clone(&rejected)
                } else {
                    Arc::clone(&generic)
                }
            }))
        };

        assert!(Arc::ptr_eq(&handler.resolve(&ClientError::CircuitOpen), &rejected));
        assert!(Arc::ptr_eq(&handler.resolve(&timeout()), &generic));
    }
}
