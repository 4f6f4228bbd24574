//! Deferred invocation model: the unit of work that decorators wrap.

use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::Result;

/// Identifies the interface method an invocation belongs to.
///
/// Every decorator in a chain receives the same metadata reference for a given
/// invocation and must not mutate it. Policies are looked up per client, so
/// the metadata is primarily used to label log events.
#[derive(Debug, Clone)]
pub struct MethodMetadata {
    client: Arc<str>,
    method: Arc<str>,
}

impl MethodMetadata {
    /// Create metadata for one interface method of a named client.
    pub fn new(client: impl Into<Arc<str>>, method: impl Into<Arc<str>>) -> Self {
        Self {
            client: client.into(),
            method: method.into(),
        }
    }

    /// Name of the client the method belongs to.
    pub fn client(&self) -> &str {
        &self.client
    }

    /// Name of the interface method.
    pub fn method(&self) -> &str {
        &self.method
    }
}

impl fmt::Display for MethodMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.client, self.method)
    }
}

/// A deferred, zero-argument remote invocation producing a `Result<T>`.
///
/// A call can be invoked more than once (retry policies depend on this); each
/// invocation produces a fresh future. The call itself is immutable and
/// cheaply clonable, so a built chain can serve any number of concurrent
/// invocations.
pub struct Call<T> {
    f: Arc<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>,
}

impl<T> Clone for Call<T> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

impl<T: Send + 'static> Call<T> {
    /// Wrap a closure as a call.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            f: Arc::new(move || Box::pin(f())),
        }
    }

    /// Run the call once.
    pub async fn invoke(&self) -> Result<T> {
        (self.f)().await
    }
}

impl<T> fmt::Debug for Call<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Call")
    }
}

/// Invokes one interface method, with its arguments already captured, on any
/// target implementation.
///
/// The dispatcher binds the invoker to the primary, transport-backed target to
/// form the base [`Call`]; a fallback decorator rebinds it to the substitute
/// object, which is how "invoke the same method on the fallback" is expressed
/// without reflection.
pub struct MethodInvoker<S: ?Sized, T> {
    f: Arc<dyn Fn(Arc<S>) -> BoxFuture<'static, Result<T>> + Send + Sync>,
}

impl<S: ?Sized, T> Clone for MethodInvoker<S, T> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

impl<S, T> MethodInvoker<S, T>
where
    S: ?Sized + Send + Sync + 'static,
    T: Send + 'static,
{
    /// Wrap a closure that runs the method on a given target.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            f: Arc::new(move |target| Box::pin(f(target))),
        }
    }

    /// Run the method once against `target`.
    pub fn invoke(&self, target: Arc<S>) -> BoxFuture<'static, Result<T>> {
        (self.f)(target)
    }

    /// Fix the target, producing the zero-argument base call.
    pub fn bind(&self, target: Arc<S>) -> Call<T> {
        let f = Arc::clone(&self.f);
        Call::new(move || f(Arc::clone(&target)))
    }
}

impl<S: ?Sized, T> fmt::Debug for MethodInvoker<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MethodInvoker")
    }
}
