//! Error types for decorated client calls.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type for decorated call operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors produced on the call path, by the underlying invocation or by a
/// resilience policy rejecting it.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Retry policy gave up; carries the last attempt's error.
    #[error("request failed after {attempts} attempts")]
    RetryExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Error from the last attempt.
        #[source]
        source: Box<ClientError>,
    },

    /// Circuit breaker is open, rejecting requests.
    #[error("circuit breaker is open, request rejected")]
    CircuitOpen,

    /// No rate-limit permit acquired within the wait window.
    #[error("rate limit exceeded, no permit acquired within {0:?}")]
    RateLimited(Duration),

    /// No bulkhead slot acquired within the wait window.
    #[error("bulkhead is full, no slot acquired within {0:?}")]
    BulkheadFull(Duration),

    /// The underlying invocation timed out.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection error from the underlying transport.
    #[error("connection error: {0}")]
    Connection(String),

    /// Error-level HTTP response from the remote service.
    #[error("response error: {status} - {message}")]
    Response {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Any other failure of the underlying invocation.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ClientError {
    /// The kind of this error, used by fallback filters.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RetryExhausted { .. } => ErrorKind::RetryExhausted,
            Self::CircuitOpen => ErrorKind::CircuitOpen,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::BulkheadFull(_) => ErrorKind::BulkheadFull,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Connection(_) => ErrorKind::Connection,
            Self::Response { .. } => ErrorKind::Response,
            Self::Transport(_) => ErrorKind::Transport,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Connection(_) => true,
            Self::Response { status, .. } => {
                // Retry on 5xx server errors and 429 rate limit
                *status >= 500 || *status == 429
            }
            _ => false,
        }
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Check if this error was raised by a resilience policy rather than the
    /// underlying invocation.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::RetryExhausted { .. }
                | Self::CircuitOpen
                | Self::RateLimited(_)
                | Self::BulkheadFull(_)
        )
    }

    /// Get the HTTP status code if this is a response error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Discriminant of [`ClientError`], for type-based fallback filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Retry attempts exhausted.
    RetryExhausted,
    /// Circuit breaker open.
    CircuitOpen,
    /// Rate-limit permit not acquired.
    RateLimited,
    /// Bulkhead slot not acquired.
    BulkheadFull,
    /// Invocation timed out.
    Timeout,
    /// Connection failure.
    Connection,
    /// Error-level HTTP response.
    Response,
    /// Other transport failure.
    Transport,
}

/// Errors raised while assembling a decorator chain. These are fatal: client
/// construction aborts before any call is made.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No fallback of the requested type is registered for the client.
    #[error("no {mechanism} of type {expected} registered for client '{client}'")]
    MissingFallback {
        /// Which mechanism was requested ("fallback" or "fallback factory").
        mechanism: &'static str,
        /// Client name the lookup was performed for.
        client: String,
        /// Type the chain expected to find.
        expected: &'static str,
    },

    /// A fallback is registered for the client, but under an incompatible type.
    #[error(
        "incompatible {mechanism} for client '{client}': found {found}, which is not assignable to {expected}"
    )]
    IncompatibleFallback {
        /// Which mechanism was requested ("fallback" or "fallback factory").
        mechanism: &'static str,
        /// Client name the lookup was performed for.
        client: String,
        /// Type the chain expected to find.
        expected: &'static str,
        /// Type actually registered.
        found: &'static str,
    },
}
