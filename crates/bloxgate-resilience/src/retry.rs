// crates/bloxgate-resilience/src/retry.rs
// ============================================================================
// Module: Retry Policy
// Description: Backoff schedule for retryable upstream failures.
// Purpose: Pace repeated attempts against rate-limited shared endpoints.
// Dependencies: bloxgate-upstream, rand
// ============================================================================

//! ## Overview
//! Retries cover failures that clear on their own: 429s, consolidated
//! 409 conflicts (the upstream's "operation in progress" answer), and
//! transport drops. Backoff grows linearly from the base and caps out,
//! with sub-second jitter so concurrent callers spread; an explicit
//! `Retry-After` header overrides the computed sleep. 5xx and timeouts
//! surface immediately and leave retrying to the RPC client.

use std::time::Duration;

use bloxgate_upstream::UpstreamError;
use rand::Rng;

/// Default first backoff interval.
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(5);
/// Default backoff cap.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);
/// Upper bound for additive jitter.
const JITTER_MILLIS: u64 = 500;

/// Linear backoff schedule with a hard attempt budget.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first.
    pub max_attempts: u32,
    /// First backoff interval; later intervals grow linearly.
    pub base_delay: Duration,
    /// Backoff cap.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Creates the standard policy with the configured attempt budget.
    #[must_use]
    pub const fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    /// Returns whether a failure is retryable inside one call.
    #[must_use]
    pub const fn is_retryable(error: &UpstreamError) -> bool {
        match error {
            UpstreamError::RateLimited {
                ..
            }
            | UpstreamError::Transport {
                ..
            } => true,
            // The consolidated configure endpoint answers 409 while a
            // previous transaction is still applying.
            UpstreamError::ClientError {
                status, ..
            } => *status == 409,
            UpstreamError::ServerError {
                ..
            }
            | UpstreamError::Timeout => false,
        }
    }

    /// Computes the sleep before the next attempt.
    ///
    /// `attempt` is the 1-based number of the attempt that just failed.
    /// An upstream `Retry-After` wins over the computed schedule; jitter is
    /// only added to computed sleeps so honored delays stay exact.
    #[must_use]
    pub fn backoff(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(retry_after) = retry_after {
            return retry_after;
        }
        let linear = self.base_delay.saturating_mul(attempt);
        let capped = linear.min(self.max_delay);
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..JITTER_MILLIS));
        capped + jitter
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bloxgate_upstream::UpstreamError;
    use serde_json::json;

    use super::RetryPolicy;

    #[test]
    fn schedule_grows_linearly_to_the_cap() {
        let policy = RetryPolicy::new(12);
        let jitter = Duration::from_millis(500);
        for (attempt, expected_secs) in [(1u32, 5u64), (2, 10), (3, 15), (6, 30), (12, 30)] {
            let sleep = policy.backoff(attempt, None);
            let floor = Duration::from_secs(expected_secs);
            assert!(sleep >= floor, "attempt {attempt}: {sleep:?} < {floor:?}");
            assert!(sleep < floor + jitter, "attempt {attempt}: {sleep:?} jitter too large");
        }
    }

    #[test]
    fn retry_after_overrides_without_jitter() {
        let policy = RetryPolicy::new(12);
        let sleep = policy.backoff(7, Some(Duration::from_secs(2)));
        assert_eq!(sleep, Duration::from_secs(2));
    }

    #[test]
    fn retryable_set_is_429_409_and_transport() {
        assert!(RetryPolicy::is_retryable(&UpstreamError::RateLimited {
            retry_after: None
        }));
        assert!(RetryPolicy::is_retryable(&UpstreamError::Transport {
            cause: "reset".to_string()
        }));
        assert!(RetryPolicy::is_retryable(&UpstreamError::ClientError {
            status: 409,
            body: json!({}),
            retry_after: None,
        }));
        assert!(!RetryPolicy::is_retryable(&UpstreamError::ClientError {
            status: 404,
            body: json!({}),
            retry_after: None,
        }));
        assert!(!RetryPolicy::is_retryable(&UpstreamError::ServerError {
            status: 500,
            body: json!({}),
        }));
        assert!(!RetryPolicy::is_retryable(&UpstreamError::Timeout));
    }
}
