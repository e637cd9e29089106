//! Declarative retry policy for hardware open failures.
//
// The coordinator is the only call site; individual consumers never retry
// on their own. Centralizing the backoff arithmetic here keeps the switch
// algorithm readable and the schedule testable in isolation.

use std::time::Duration;

/// Defines a policy for retrying a hardware open.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// The maximum number of open attempts (including the first).
    pub max_attempts: u32,
    /// The delay after the first failed attempt.
    pub base_delay: Duration,
    /// Multiplier applied to the delay after each subsequent failure.
    pub backoff_factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        // 200ms, 600ms, 1800ms between the three attempts.
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            backoff_factor: 3,
        }
    }
}

impl RetryPolicy {
    /// Delay to sleep after failed attempt number `attempt` (1-based).
    ///
    /// Attempt 1 → `base_delay`, attempt 2 → `base_delay * factor`, and so
    /// on. Saturates rather than overflowing for absurd attempt counts.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let scale = self.backoff_factor.saturating_pow(exponent);
        self.base_delay.saturating_mul(scale)
    }

    /// Whether another attempt is allowed after `attempt` (1-based) failed.
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(600));
        assert_eq!(policy.delay_for(3), Duration::from_millis(1800));
    }

    #[test]
    fn test_allows_retry_boundary() {
        let policy = RetryPolicy::default();
        assert!(policy.allows_retry(1));
        assert!(policy.allows_retry(2));
        assert!(!policy.allows_retry(3));
        assert!(!policy.allows_retry(4));
    }

    #[test]
    fn test_delay_saturates() {
        let policy = RetryPolicy {
            max_attempts: 100,
            base_delay: Duration::from_secs(u64::MAX / 2),
            backoff_factor: u32::MAX,
        };
        // Must not panic on overflow.
        let _ = policy.delay_for(99);
    }
}
