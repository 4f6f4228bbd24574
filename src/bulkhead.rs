//! Bulkhead concurrency limiting.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::call::{Call, MethodMetadata};
use crate::error::{ClientError, Result};

/// Bulkhead configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkheadConfig {
    /// Maximum number of calls executing concurrently.
    pub max_concurrent_calls: usize,
    /// Maximum time a call may wait for a free slot.
    pub max_wait_duration: Duration,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_calls: 25,
            max_wait_duration: Duration::ZERO,
        }
    }
}

impl BulkheadConfig {
    /// Create a config allowing `max_concurrent_calls` in flight.
    pub fn new(max_concurrent_calls: usize) -> Self {
        Self {
            max_concurrent_calls,
            ..Default::default()
        }
    }

    /// Set the maximum time a call may wait for a free slot.
    pub fn with_max_wait_duration(mut self, wait: Duration) -> Self {
        self.max_wait_duration = wait;
        self
    }
}

/// Bulkhead: bounds how many decorated calls run at once.
///
/// The slot is held for the full duration of the inner call. Calls that find
/// no slot within the wait window are rejected with
/// [`ClientError::BulkheadFull`].
#[derive(Debug)]
pub struct Bulkhead {
    config: BulkheadConfig,
    semaphore: Arc<Semaphore>,
}

impl Bulkhead {
    /// Create a bulkhead from its configuration.
    pub fn new(config: BulkheadConfig) -> Self {
        let slots = config.max_concurrent_calls.max(1);
        Self {
            config,
            semaphore: Arc::new(Semaphore::new(slots)),
        }
    }

    /// The bulkhead's configuration.
    pub fn config(&self) -> &BulkheadConfig {
        &self.config
    }

    /// Number of slots currently free.
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        let wait = self.config.max_wait_duration;
        if wait.is_zero() {
            return self
                .semaphore
                .clone()
                .try_acquire_owned()
                .map_err(|_| ClientError::BulkheadFull(wait));
        }
        match tokio::time::timeout(wait, self.semaphore.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            // The semaphore is never closed; treat it like saturation anyway
            Ok(Err(_)) => Err(ClientError::BulkheadFull(wait)),
            Err(_) => Err(ClientError::BulkheadFull(wait)),
        }
    }

    /// Wrap `call` so each invocation occupies one slot while it runs.
    pub fn decorate<T: Send + 'static>(
        self: &Arc<Self>,
        call: Call<T>,
        method: &MethodMetadata,
    ) -> Call<T> {
        let bulkhead = Arc::clone(self);
        let method = method.clone();
        Call::new(move || {
            let bulkhead = Arc::clone(&bulkhead);
            let call = call.clone();
            let method = method.clone();
            async move {
                let permit = match bulkhead.acquire().await {
                    Ok(permit) => permit,
                    Err(error) => {
                        debug!(
                            client = method.client(),
                            method = method.method(),
                            "bulkhead full, rejecting call"
                        );
                        return Err(error);
                    }
                };
                let result = call.invoke().await;
                drop(permit);
                result
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_saturated_bulkhead_rejects() {
        let bulkhead = Arc::new(Bulkhead::new(BulkheadConfig::new(1)));

        let held = bulkhead.acquire().await.unwrap();
        assert_eq!(bulkhead.available_slots(), 0);

        let call = Call::new(|| async { Ok(()) });
        let decorated = bulkhead.decorate(call, &MethodMetadata::new("test", "op"));
        let err = decorated.invoke().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BulkheadFull);

        drop(held);
        assert_eq!(bulkhead.available_slots(), 1);
    }

    #[tokio::test]
    async fn test_slot_is_released_after_the_call() {
        let bulkhead = Arc::new(Bulkhead::new(BulkheadConfig::new(1)));
        let call = Call::new(|| async { Ok(1u32) });
        let decorated = bulkhead.decorate(call, &MethodMetadata::new("test", "op"));

        assert_eq!(decorated.invoke().await.unwrap(), 1);
        assert_eq!(decorated.invoke().await.unwrap(), 1);
        assert_eq!(bulkhead.available_slots(), 1);
    }

    #[tokio::test]
    async fn test_waiting_for_a_slot_succeeds_when_released_in_time() {
        let bulkhead = Arc::new(Bulkhead::new(
            BulkheadConfig::new(1).with_max_wait_duration(Duration::from_millis(200)),
        ));

        let held = bulkhead.acquire().await.unwrap();
        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(held);
        });

        let call = Call::new(|| async { Ok(()) });
        let decorated = bulkhead.decorate(call, &MethodMetadata::new("test", "op"));
        assert!(decorated.invoke().await.is_ok());
        release.await.unwrap();
    }
}
