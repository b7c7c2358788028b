//! Retry policy with exponential backoff.
//!
//! This module provides a clean abstraction over retry configuration and
//! logic, making it easy to test and reason about retry behavior
//! independently of the scheduler.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Retry policy for transport failures.
///
/// Attempts are counted 1-indexed: attempt 1 is the initial send, and up to
/// `max_retries` further attempts follow it. Non-retryable failures ignore
/// this policy entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries permitted beyond the initial attempt.
    ///
    /// Default: 3 retries
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff (in milliseconds).
    ///
    /// The delay after failed attempt `n` is `base * 2^(n - 1)`.
    ///
    /// Default: 1000 ms
    #[serde(default = "defaults::base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff delay (in milliseconds).
    ///
    /// Caps the exponential backoff to prevent excessively long delays.
    ///
    /// Default: 30000 ms (30 seconds)
    #[serde(default = "defaults::max_delay_ms")]
    pub max_delay_ms: u64,

    /// Jitter factor for randomizing backoff delays.
    ///
    /// Jitter prevents thundering herd problems when many jobs retry
    /// simultaneously. The delay is randomized within ±`jitter_factor`.
    ///
    /// Default: 0.0 (deterministic backoff)
    #[serde(default)]
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: defaults::max_retries(),
            base_delay_ms: defaults::base_delay_ms(),
            max_delay_ms: defaults::max_delay_ms(),
            jitter_factor: 0.0,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total transport calls this policy permits per job.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Check whether another attempt should follow a retryable failure.
    ///
    /// `failed_attempt` is the 1-indexed attempt that just failed.
    #[must_use]
    pub const fn should_retry(&self, failed_attempt: u32) -> bool {
        failed_attempt < self.max_attempts()
    }

    /// Get the number of attempts still available after `attempts` calls.
    #[must_use]
    pub const fn remaining_attempts(&self, attempts: u32) -> u32 {
        self.max_attempts().saturating_sub(attempts)
    }

    /// Check if `attempt` is the last attempt this policy permits.
    #[must_use]
    pub const fn is_final_attempt(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts()
    }

    /// Backoff delay to wait after failed attempt `failed_attempt`.
    ///
    /// # Formula
    /// `delay = min(base * 2^(failed_attempt - 1), max_delay) * (1 ± jitter)`
    #[must_use]
    pub fn backoff_delay(&self, failed_attempt: u32) -> Duration {
        // Use saturating operations to prevent overflow
        let exponent = failed_attempt.saturating_sub(1);
        let delay_ms = if exponent >= 63 {
            // 2^63 would overflow, use max_delay directly
            self.max_delay_ms
        } else {
            let multiplier = 1u64 << exponent; // 2^exponent
            self.base_delay_ms
                .saturating_mul(multiplier)
                .min(self.max_delay_ms)
        };

        if self.jitter_factor <= 0.0 {
            return Duration::from_millis(delay_ms);
        }

        // Apply jitter: delay * (1 ± jitter_factor)
        // Intentional precision loss and casting for randomization
        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let jittered_ms = {
            let jitter_range = (delay_ms as f64) * self.jitter_factor;
            let mut rng = rand::rng();
            let jitter: f64 = rng.random_range(-jitter_range..=jitter_range);
            ((delay_ms as f64) + jitter).max(0.0) as u64
        };

        Duration::from_millis(jittered_ms)
    }
}

mod defaults {
    pub const fn max_retries() -> u32 {
        3
    }

    pub const fn base_delay_ms() -> u64 {
        1000
    }

    pub const fn max_delay_ms() -> u64 {
        30000 // 30 seconds
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay_ms, 1000);
        assert_eq!(policy.max_delay_ms, 30000);
        assert!(policy.jitter_factor.abs() < f64::EPSILON);
    }

    #[test]
    fn test_max_attempts_includes_initial_send() {
        let policy = RetryPolicy {
            max_retries: 3,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.max_attempts(), 4);

        let no_retries = RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        };
        assert_eq!(no_retries.max_attempts(), 1);
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy {
            max_retries: 3,
            ..RetryPolicy::default()
        };

        // Attempts 1 through 3 leave budget for another try
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(policy.should_retry(3));

        // Attempt 4 was the last permitted call
        assert!(!policy.should_retry(4));
        assert!(!policy.should_retry(10));
    }

    #[test]
    fn test_should_retry_with_zero_budget() {
        let policy = RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        };
        assert!(!policy.should_retry(1));
    }

    #[test]
    fn test_remaining_attempts() {
        let policy = RetryPolicy {
            max_retries: 3,
            ..RetryPolicy::default()
        };

        assert_eq!(policy.remaining_attempts(0), 4);
        assert_eq!(policy.remaining_attempts(1), 3);
        assert_eq!(policy.remaining_attempts(4), 0);
        assert_eq!(policy.remaining_attempts(9), 0); // Saturating
    }

    #[test]
    fn test_is_final_attempt() {
        let policy = RetryPolicy {
            max_retries: 2,
            ..RetryPolicy::default()
        };

        assert!(!policy.is_final_attempt(1));
        assert!(!policy.is_final_attempt(2));
        assert!(policy.is_final_attempt(3));
        assert!(policy.is_final_attempt(4));
    }

    #[test]
    fn test_exponential_backoff_progression() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay_ms: 100,
            max_delay_ms: 30000,
            jitter_factor: 0.0,
        };

        // Attempt 1: 100 * 2^0 = 100ms
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(100));
        // Attempt 2: 100 * 2^1 = 200ms
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(200));
        // Attempt 3: 100 * 2^2 = 400ms
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(400));
        // Attempt 4: 100 * 2^3 = 800ms
        assert_eq!(policy.backoff_delay(4), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_capped_at_max_delay() {
        let policy = RetryPolicy {
            max_retries: 30,
            base_delay_ms: 1000,
            max_delay_ms: 5000,
            jitter_factor: 0.0,
        };

        assert_eq!(policy.backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(4000));
        // 8000 would exceed the cap
        assert_eq!(policy.backoff_delay(4), Duration::from_millis(5000));
        assert_eq!(policy.backoff_delay(20), Duration::from_millis(5000));
    }

    #[test]
    fn test_backoff_survives_huge_attempt_numbers() {
        let policy = RetryPolicy {
            max_retries: u32::MAX,
            base_delay_ms: 1000,
            max_delay_ms: 60000,
            jitter_factor: 0.0,
        };

        // 2^(attempt - 1) would overflow u64 well before these
        assert_eq!(policy.backoff_delay(64), Duration::from_millis(60000));
        assert_eq!(policy.backoff_delay(u32::MAX), Duration::from_millis(60000));
    }

    #[test]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_sign_loss,
        clippy::cast_possible_truncation
    )]
    fn test_backoff_with_jitter_stays_in_range() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            jitter_factor: 0.2, // ±20%
        };

        // Attempt 2: Expected = 2000ms, with ±20% jitter = 1600-2400ms
        for _ in 0..50 {
            let delay = policy.backoff_delay(2).as_millis() as u64;
            assert!(
                (1600..=2400).contains(&delay),
                "Delay {delay} should be within jitter range [1600, 2400]"
            );
        }
    }
}
