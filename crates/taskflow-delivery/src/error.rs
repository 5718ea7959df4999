//! Error types for push delivery operations.
//!
//! Covers transport-level failures (network, timeout), signing-credential
//! problems, and worker lifecycle errors. Transport errors feed the delivery
//! classifier; everything else stays inside the worker.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Error conditions raised while delivering push notifications.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// Network-level connectivity failure before an HTTP status was received.
    #[error("network error: {message}")]
    Network {
        /// Error message describing the network failure.
        message: String,
    },

    /// The delivery request exceeded the configured timeout.
    #[error("request timeout after {timeout_seconds}s")]
    Timeout {
        /// Timeout that was exceeded, in seconds.
        timeout_seconds: u64,
    },

    /// Signing key material is malformed or token minting failed.
    #[error("invalid signing credentials: {message}")]
    Vapid {
        /// Credential error description.
        message: String,
    },

    /// Request could not be constructed (bad endpoint URI, client setup).
    #[error("configuration error: {message}")]
    Configuration {
        /// Configuration error description.
        message: String,
    },

    /// Recording a dead subscription failed.
    #[error("invalidation sink error: {message}")]
    Invalidation {
        /// Sink error description.
        message: String,
    },

    /// Workers did not drain within the shutdown timeout.
    #[error("shutdown timed out after {timeout:?}")]
    ShutdownTimeout {
        /// Drain timeout that was exceeded.
        timeout: Duration,
    },

    /// A worker task panicked.
    #[error("worker {worker_id} panicked: {error}")]
    WorkerPanic {
        /// Identifier of the panicked worker.
        worker_id: usize,
        /// Panic description from the join error.
        error: String,
    },
}

impl DeliveryError {
    /// Creates a network error from a message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(timeout_seconds: u64) -> Self {
        Self::Timeout { timeout_seconds }
    }

    /// Creates a signing-credential error.
    pub fn vapid(message: impl Into<String>) -> Self {
        Self::Vapid { message: message.into() }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Creates an invalidation sink error.
    pub fn invalidation(message: impl Into<String>) -> Self {
        Self::Invalidation { message: message.into() }
    }

    /// Whether the failure is temporary and worth retrying.
    ///
    /// Only failures that never produced an HTTP status qualify; once a
    /// status exists, retryability is the classifier's decision.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }
}
