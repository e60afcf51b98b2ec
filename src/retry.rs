//! Bounded retry with escalating backoff.
//!
//! One policy serves every stream-level failure kind; the supervisor feeds
//! all of them through the same `RetryState` instead of keeping ad hoc retry
//! loops per scenario.

use crate::config::{BackoffKind, RetryConfig};
use std::time::{Duration, Instant};

/// Immutable retry policy, fixed for the life of a supervisor.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum consecutive failed attempts before giving up.
    pub max_retries: u32,
    /// Base delay before a restart.
    pub base: Duration,
    /// Escalation strategy.
    pub mode: BackoffKind,
    /// Upper bound on any single delay.
    pub cap: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base: config.backoff_base(),
            mode: config.backoff,
            cap: Duration::from_secs(crate::defaults::BACKOFF_CAP_SECS),
        }
    }

    /// Delay before attempt `attempt` (1-based). Non-decreasing in the
    /// attempt count for both modes.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.mode {
            BackoffKind::Fixed => self.base.min(self.cap),
            BackoffKind::Exponential => {
                // Shift capped so the multiplier can't overflow.
                let exp = attempt.saturating_sub(1).min(16);
                self.base.saturating_mul(1u32 << exp).min(self.cap)
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Mutable retry bookkeeping for one escalation run.
#[derive(Debug, Default)]
pub struct RetryState {
    attempts: u32,
    last_failure: Option<Instant>,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current consecutive failure count.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// When the most recent failure was recorded.
    pub fn last_failure(&self) -> Option<Instant> {
        self.last_failure
    }

    /// Record one failure. Returns the backoff delay to wait before the next
    /// attempt, or None when the policy's budget is exhausted.
    pub fn record_failure(&mut self, policy: &RetryPolicy) -> Option<Duration> {
        self.attempts += 1;
        self.last_failure = Some(Instant::now());
        if self.attempts > policy.max_retries {
            None
        } else {
            Some(policy.delay_for(self.attempts))
        }
    }

    /// Reset after a sustained successful streaming period.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.last_failure = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(mode: BackoffKind, base_secs: u64, max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base: Duration::from_secs(base_secs),
            mode,
            cap: Duration::from_secs(120),
        }
    }

    #[test]
    fn test_fixed_backoff_is_constant() {
        let p = policy(BackoffKind::Fixed, 3, 5);
        assert_eq!(p.delay_for(1), Duration::from_secs(3));
        assert_eq!(p.delay_for(5), Duration::from_secs(3));
    }

    #[test]
    fn test_exponential_backoff_doubles() {
        let p = policy(BackoffKind::Exponential, 2, 10);
        assert_eq!(p.delay_for(1), Duration::from_secs(2));
        assert_eq!(p.delay_for(2), Duration::from_secs(4));
        assert_eq!(p.delay_for(3), Duration::from_secs(8));
        assert_eq!(p.delay_for(4), Duration::from_secs(16));
    }

    #[test]
    fn test_exponential_backoff_respects_cap() {
        let p = policy(BackoffKind::Exponential, 2, 60);
        assert_eq!(p.delay_for(30), Duration::from_secs(120));
        // Large attempt counts must not overflow.
        assert_eq!(p.delay_for(u32::MAX), Duration::from_secs(120));
    }

    #[test]
    fn test_backoff_is_non_decreasing() {
        for mode in [BackoffKind::Fixed, BackoffKind::Exponential] {
            let p = policy(mode, 1, 20);
            let mut prev = Duration::ZERO;
            for attempt in 1..=20 {
                let d = p.delay_for(attempt);
                assert!(d >= prev, "delay decreased at attempt {}", attempt);
                prev = d;
            }
        }
    }

    #[test]
    fn test_record_failure_until_exhausted() {
        let p = policy(BackoffKind::Fixed, 1, 3);
        let mut state = RetryState::new();

        assert!(state.record_failure(&p).is_some()); // attempt 1
        assert!(state.record_failure(&p).is_some()); // attempt 2
        assert!(state.record_failure(&p).is_some()); // attempt 3
        assert!(state.record_failure(&p).is_none()); // over budget
        assert_eq!(state.attempts(), 4);
        assert!(state.last_failure().is_some());
    }

    #[test]
    fn test_reset_clears_attempts() {
        let p = policy(BackoffKind::Exponential, 1, 2);
        let mut state = RetryState::new();
        state.record_failure(&p);
        state.record_failure(&p);

        state.reset();
        assert_eq!(state.attempts(), 0);
        assert!(state.last_failure().is_none());
        // Backoff starts back at its base value.
        assert_eq!(state.record_failure(&p), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_zero_max_retries_fails_immediately() {
        let p = policy(BackoffKind::Fixed, 1, 0);
        let mut state = RetryState::new();
        assert!(state.record_failure(&p).is_none());
    }

    #[test]
    fn test_policy_from_config() {
        let p = RetryPolicy::from_config(&RetryConfig::default());
        assert_eq!(p.max_retries, 5);
        assert_eq!(p.base, Duration::from_secs(2));
        assert_eq!(p.mode, BackoffKind::Exponential);
    }
}
