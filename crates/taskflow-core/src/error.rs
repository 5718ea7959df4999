//! Error types and result handling for core worker operations.

use thiserror::Error;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for queue and job handling.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A queued entry could not be parsed into a push job.
    ///
    /// Malformed jobs are terminal: an entry that does not parse today will
    /// not parse tomorrow, so callers discard rather than retry.
    #[error("malformed job: {message}")]
    MalformedJob {
        /// Parse error description.
        message: String,
    },

    /// The queue itself failed (connection lost, command error).
    ///
    /// Distinct from any per-job outcome; affects the consumption loop, not
    /// the job being processed.
    #[error("queue error: {message}")]
    Queue {
        /// Queue error description.
        message: String,
    },
}

impl CoreError {
    /// Creates a malformed-job error from a parse failure.
    pub fn malformed_job(message: impl Into<String>) -> Self {
        Self::MalformedJob { message: message.into() }
    }

    /// Creates a queue infrastructure error.
    pub fn queue(message: impl Into<String>) -> Self {
        Self::Queue { message: message.into() }
    }
}

impl From<redis::RedisError> for CoreError {
    fn from(err: redis::RedisError) -> Self {
        Self::Queue { message: err.to_string() }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedJob { message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_failures_become_malformed_job() {
        let err = serde_json::from_str::<crate::models::PushJob>("not json").unwrap_err();
        let core: CoreError = err.into();
        assert!(matches!(core, CoreError::MalformedJob { .. }));
    }

    #[test]
    fn error_display_format() {
        let err = CoreError::queue("connection refused");
        assert_eq!(err.to_string(), "queue error: connection refused");
    }
}
