//! Circuit breaker pattern implementation.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::call::{Call, MethodMetadata};
use crate::error::ClientError;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, requests are allowed.
    Closed,
    /// Circuit is open, requests are rejected.
    Open,
    /// Circuit is half-open, limited requests are allowed for testing.
    HalfOpen,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures to open the circuit.
    pub failure_threshold: u32,
    /// Number of successful requests to close the circuit.
    pub success_threshold: u32,
    /// Time to wait before attempting to close the circuit.
    pub reset_timeout: Duration,
    /// Number of requests to allow in half-open state.
    pub half_open_requests: u32,
    /// Time window for counting failures.
    pub failure_window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            reset_timeout: Duration::from_secs(30),
            half_open_requests: 3,
            failure_window: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new circuit breaker config.
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            reset_timeout,
            ..Default::default()
        }
    }

    /// Set the success threshold to close the circuit.
    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Set the number of half-open requests.
    pub fn with_half_open_requests(mut self, count: u32) -> Self {
        self.half_open_requests = count;
        self
    }

    /// Set the failure counting window.
    pub fn with_failure_window(mut self, window: Duration) -> Self {
        self.failure_window = window;
        self
    }
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    half_open_count: u32,
    last_failure_at: Option<Instant>,
    opened_at: Option<Instant>,
}

/// Circuit breaker: rejects calls while the circuit is open.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<CircuitInner>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CircuitInner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                half_open_count: 0,
                last_failure_at: None,
                opened_at: None,
            }),
        }
    }

    /// Get the current circuit state.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        Self::maybe_transition_to_half_open(&self.config, &mut inner);
        inner.state
    }

    /// Check if a request is allowed.
    pub fn is_allowed(&self) -> bool {
        let mut inner = self.inner.lock();
        Self::maybe_transition_to_half_open(&self.config, &mut inner);

        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                if inner.half_open_count < self.config.half_open_requests {
                    inner.half_open_count += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful request.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                // Reset failure count on success
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    Self::close(&mut inner);
                }
            }
            CircuitState::Open => {
                debug!("success recorded while circuit open, ignoring");
            }
        }
    }

    /// Record a failed request.
    pub fn record_failure(&self) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                // Failures outside the window start a fresh count
                let window_expired = inner
                    .last_failure_at
                    .is_some_and(|at| now.duration_since(at) > self.config.failure_window);
                if window_expired {
                    inner.failure_count = 1;
                } else {
                    inner.failure_count += 1;
                    if inner.failure_count >= self.config.failure_threshold {
                        Self::open(&mut inner);
                    }
                }
                inner.last_failure_at = Some(now);
            }
            CircuitState::HalfOpen => {
                // Any failure in half-open state reopens the circuit
                Self::open(&mut inner);
            }
            CircuitState::Open => {}
        }
    }

    fn open(inner: &mut CircuitInner) {
        if inner.state != CircuitState::Open {
            warn!("circuit breaker opening");
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            inner.half_open_count = 0;
            inner.success_count = 0;
        }
    }

    fn close(inner: &mut CircuitInner) {
        if inner.state != CircuitState::Closed {
            info!("circuit breaker closing");
            inner.state = CircuitState::Closed;
            inner.opened_at = None;
            inner.failure_count = 0;
            inner.success_count = 0;
            inner.half_open_count = 0;
        }
    }

    fn maybe_transition_to_half_open(config: &CircuitBreakerConfig, inner: &mut CircuitInner) {
        if inner.state != CircuitState::Open {
            return;
        }
        if let Some(opened) = inner.opened_at
            && opened.elapsed() >= config.reset_timeout
        {
            debug!("circuit breaker transitioning to half-open");
            inner.state = CircuitState::HalfOpen;
            inner.half_open_count = 0;
            inner.success_count = 0;
        }
    }

    /// Get failure count.
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Get success count (in half-open state).
    pub fn success_count(&self) -> u32 {
        self.inner.lock().success_count
    }

    /// Reset the circuit breaker to closed state.
    pub fn reset(&self) {
        Self::close(&mut self.inner.lock());
    }

    /// Wrap `call` with circuit breaking: rejected while open, otherwise the
    /// outcome of every invocation is recorded.
    pub fn decorate<T: Send + 'static>(
        self: &Arc<Self>,
        call: Call<T>,
        method: &MethodMetadata,
    ) -> Call<T> {
        let breaker = Arc::clone(self);
        let method = method.clone();
        Call::new(move || {
            let breaker = Arc::clone(&breaker);
            let call = call.clone();
            let method = method.clone();
            async move {
                if !breaker.is_allowed() {
                    debug!(
                        client = method.client(),
                        method = method.method(),
                        "circuit open, rejecting call"
                    );
                    return Err(ClientError::CircuitOpen);
                }
                match call.invoke().await {
                    Ok(value) => {
                        breaker.record_success();
                        Ok(value)
                    }
                    Err(error) => {
                        breaker.record_failure();
                        Err(error)
                    }
                }
            }
        })
    }
}
