//! Retry policy for transient delivery failures.
//!
//! Exponential backoff without jitter: the delay sequence must be strictly
//! increasing until it reaches the cap so operators can read attempt history
//! directly from log timestamps.

use std::time::Duration;

/// Retry policy applied to transient failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries per job.
    pub max_attempts: u32,

    /// Delay before the first retry; doubles per subsequent retry.
    pub base_delay: Duration,

    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

/// Result of a retry decision for a transient failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after sleeping `delay`.
    Retry {
        /// Backoff delay to sleep before re-enqueueing.
        delay: Duration,
    },
    /// Stop retrying and drop the job.
    GiveUp {
        /// Reason the job is being dropped.
        reason: String,
    },
}

impl RetryPolicy {
    /// Decides whether a job that has already retried `attempt_count` times
    /// gets another attempt.
    pub fn decide(&self, attempt_count: u32) -> RetryDecision {
        if attempt_count >= self.max_attempts {
            return RetryDecision::GiveUp {
                reason: format!("maximum attempts ({}) reached", self.max_attempts),
            };
        }
        RetryDecision::Retry { delay: self.delay_for(attempt_count) }
    }

    /// Backoff delay before retry number `attempt + 1`.
    ///
    /// `base * 2^attempt`, capped at `max_delay`. The exponent is clamped so
    /// the multiplication cannot overflow for absurd attempt counts.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = 2_u32.saturating_pow(attempt.min(20));
        self.base_delay.saturating_mul(multiplier).min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_from_base() {
        let policy = RetryPolicy::default();
        let delays: Vec<_> = (0..5).map(|attempt| policy.delay_for(attempt)).collect();

        assert_eq!(
            delays,
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
                Duration::from_secs(16),
                Duration::from_secs(32),
            ]
        );
    }

    #[test]
    fn delays_are_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(5), Duration::from_secs(60));
        assert_eq!(policy.delay_for(12), Duration::from_secs(60));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn delays_increase_strictly_until_cap() {
        let policy = RetryPolicy::default();
        let mut previous = Duration::ZERO;
        for attempt in 0..5 {
            let delay = policy.delay_for(attempt);
            assert!(delay > previous, "delay for attempt {attempt} must increase");
            previous = delay;
        }
    }

    #[test]
    fn retries_allowed_below_limit() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.decide(0),
            RetryDecision::Retry { delay: Duration::from_secs(2) }
        );
        assert_eq!(
            policy.decide(4),
            RetryDecision::Retry { delay: Duration::from_secs(32) }
        );
    }

    #[test]
    fn gives_up_at_limit() {
        let policy = RetryPolicy::default();
        match policy.decide(5) {
            RetryDecision::GiveUp { reason } => assert!(reason.contains("maximum attempts")),
            RetryDecision::Retry { .. } => unreachable!("must not retry at the limit"),
        }
    }

    #[test]
    fn custom_limits_respected() {
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(150),
        };

        assert_eq!(
            policy.decide(0),
            RetryDecision::Retry { delay: Duration::from_millis(100) }
        );
        assert_eq!(
            policy.decide(1),
            RetryDecision::Retry { delay: Duration::from_millis(150) }
        );
        assert!(matches!(policy.decide(2), RetryDecision::GiveUp { .. }));
    }
}
