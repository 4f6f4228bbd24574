//! Method dispatch through a decorator chain.

use std::fmt;
use std::sync::Arc;

use crate::call::{MethodInvoker, MethodMetadata};
use crate::chain::DecoratorChain;
use crate::error::Result;

/// Dispatches declarative interface methods through a decorator chain.
///
/// This is the single seam where decoration happens: an adapter implementing
/// the declarative trait forwards every method here, and there is no path to
/// the primary target that bypasses the chain. Each dispatch constructs its
/// own base call and executes the wrapped call exactly once, so one
/// dispatcher serves concurrent invocations freely.
pub struct MethodDispatcher<S: ?Sized> {
    target: Arc<S>,
    chain: Arc<DecoratorChain<S>>,
}

impl<S: ?Sized> Clone for MethodDispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            target: Arc::clone(&self.target),
            chain: Arc::clone(&self.chain),
        }
    }
}

impl<S> MethodDispatcher<S>
where
    S: ?Sized + Send + Sync + 'static,
{
    /// Create a dispatcher over the primary, transport-backed target.
    pub fn new(target: Arc<S>, chain: DecoratorChain<S>) -> Self {
        Self {
            target,
            chain: Arc::new(chain),
        }
    }

    /// Create a dispatcher sharing an already-built chain.
    pub fn with_shared_chain(target: Arc<S>, chain: Arc<DecoratorChain<S>>) -> Self {
        Self { target, chain }
    }

    /// The primary target.
    pub fn target(&self) -> Arc<S> {
        Arc::clone(&self.target)
    }

    /// The chain applied to every dispatch.
    pub fn chain(&self) -> &DecoratorChain<S> {
        &self.chain
    }

    /// Run one interface method through the chain.
    pub async fn dispatch<T: Send + 'static>(
        &self,
        method: MethodMetadata,
        invoker: MethodInvoker<S, T>,
    ) -> Result<T> {
        let base = invoker.bind(Arc::clone(&self.target));
        let call = self.chain.decorate(base, &method, &invoker);
        call.invoke().await
    }
}

impl<S: ?Sized> fmt::Debug for MethodDispatcher<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDispatcher")
            .field("chain", &self.chain)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;

    #[tokio::test]
    async fn test_dispatch_reaches_the_primary_target() {
        let chain: DecoratorChain<str> = DecoratorChain::builder().build();
        let dispatcher = MethodDispatcher::new(Arc::from("primary"), chain);

        let value = dispatcher
            .dispatch(
                MethodMetadata::new("test", "to_upper"),
                MethodInvoker::new(|target: Arc<str>| async move { Ok(target.to_uppercase()) }),
            )
            .await
            .unwrap();
        assert_eq!(value, "PRIMARY");
    }

    #[tokio::test]
    async fn test_dispatch_substitutes_the_fallback_target() {
        let chain: DecoratorChain<str> = DecoratorChain::builder()
            .with_fallback(Arc::from("backup"))
            .build();
        let dispatcher = MethodDispatcher::new(Arc::from("primary"), chain);

        let value = dispatcher
            .dispatch(
                MethodMetadata::new("test", "read"),
                MethodInvoker::new(|target: Arc<str>| async move {
                    if &*target == "primary" {
                        Err(ClientError::Connection("refused".to_string()))
                    } else {
                        Ok(target.to_string())
                    }
                }),
            )
            .await
            .unwrap();
        assert_eq!(value, "backup");
    }
}
