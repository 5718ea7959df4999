//! Delivery outcome classification.
//!
//! Maps a raw transport result onto the small set of outcomes the worker's
//! policy acts on. Keeping this a pure function decouples retry and
//! invalidation policy from HTTP specifics and makes the mapping
//! independently testable.

use std::fmt;

use crate::{error::DeliveryError, transport::TransportResponse};

/// Classified result of one delivery attempt.
///
/// Ephemeral; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The push service accepted the message.
    Success {
        /// HTTP status returned by the push service.
        status: u16,
    },

    /// Temporary failure; the job may be retried.
    Transient {
        /// Diagnostic describing the failure.
        reason: String,
    },

    /// The subscription is gone and must never be retried.
    Permanent {
        /// HTTP status returned by the push service.
        status: u16,
    },

    /// The request itself is invalid; retrying cannot fix it.
    Config {
        /// Diagnostic describing the rejection.
        reason: String,
    },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { .. } => write!(f, "success"),
            Self::Transient { .. } => write!(f, "transient_failure"),
            Self::Permanent { .. } => write!(f, "permanent_failure"),
            Self::Config { .. } => write!(f, "config_error"),
        }
    }
}

/// Classifies one transport result.
///
/// Status mapping:
/// - 2xx: accepted.
/// - 404 / 410: the browser or push service retired the subscription.
/// - 429 / 5xx: rate limiting or a push-service-side transient error.
/// - anything else (remaining 4xx, and 1xx/3xx which only arise from a
///   misconfigured request): invalid request.
///
/// Failures without a status: network errors and timeouts are transient;
/// credential and request-construction errors are configuration problems.
pub fn classify(result: &Result<TransportResponse, DeliveryError>) -> Outcome {
    match result {
        Ok(response) => match response.status {
            200..=299 => Outcome::Success { status: response.status },
            404 | 410 => Outcome::Permanent { status: response.status },
            429 | 500..=599 => Outcome::Transient {
                reason: format!("push service returned HTTP {}", response.status),
            },
            status => Outcome::Config {
                reason: format!("push service rejected request with HTTP {status}"),
            },
        },
        Err(error) if error.is_retryable() => Outcome::Transient { reason: error.to_string() },
        Err(error) => Outcome::Config { reason: error.to_string() },
    }
}
