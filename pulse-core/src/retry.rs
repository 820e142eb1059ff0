//! Retry policy shared by every downstream client.

use rand::Rng;
use std::time::Duration;

use crate::ConfigError;

/// Bounded retry with exponential backoff and optional jitter.
///
/// Read-only after startup. `max_attempts` counts the first try, so the
/// default of 3 means two additional attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(100),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_backoff: Duration) -> Self {
        Self {
            max_attempts,
            base_backoff,
            jitter: true,
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_backoff: Duration::ZERO,
            jitter: false,
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_attempts".to_string(),
                value: "0".to_string(),
                reason: "at least one attempt is required".to_string(),
            });
        }
        Ok(())
    }

    /// Number of attempts allowed for a call.
    pub fn attempts_for(&self, retry_safe: bool) -> u32 {
        if retry_safe {
            self.max_attempts.max(1)
        } else {
            1
        }
    }

    /// Deterministic part of the delay before retry number `retry` (0-based):
    /// `base_backoff * 2^retry`, saturating.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_backoff.saturating_mul(factor)
    }

    /// Delay before retry number `retry` with jitter drawn from `[0, base)`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let base_nanos = self.base_backoff.as_nanos().min(u64::MAX as u128) as u64;
        if !self.jitter || base_nanos == 0 {
            return self.backoff_for(retry);
        }
        let jitter = rand::rng().random_range(0..base_nanos);
        self.backoff_for(retry)
            .saturating_add(Duration::from_nanos(jitter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100)).with_jitter(false);
        assert_eq!(policy.backoff_for(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        assert!(policy.backoff_for(64) >= policy.backoff_for(31));
    }

    #[test]
    fn test_jitter_stays_below_base_and_delays_strictly_increase() {
        let policy = RetryPolicy::new(4, Duration::from_millis(50));
        for _ in 0..200 {
            let mut previous = Duration::ZERO;
            for retry in 0..4 {
                let delay = policy.delay_for(retry);
                let floor = policy.backoff_for(retry);
                assert!(delay >= floor);
                assert!(delay < floor + policy.base_backoff);
                assert!(delay > previous);
                previous = delay;
            }
        }
    }

    #[test]
    fn test_attempts_for_writes() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts_for(true), 3);
        assert_eq!(policy.attempts_for(false), 1);
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        assert!(RetryPolicy::new(0, Duration::from_millis(1)).validate().is_err());
        assert!(RetryPolicy::no_retry().validate().is_ok());
    }
}
