//! Exponential backoff for transient provider failures.

use rand::Rng;
use std::time::Duration;

use crate::config::RetryConfig;

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub factor: f64,
    pub max_delay: Duration,
    /// Fraction of the delay added as random jitter (0.0 disables it)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            factor: config.factor,
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: 0.1,
        }
    }

    /// Zero-delay policy for tests.
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            factor: 1.0,
            max_delay: Duration::ZERO,
            jitter: 0.0,
        }
    }

    /// `base * factor^attempt`, capped at `max_delay`, without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let raw = base_ms * self.factor.powi(attempt as i32);
        let capped = raw.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }

    /// Backoff plus jitter; what the router actually sleeps.
    pub fn delay(&self, attempt: u32) -> Duration {
        let backoff = self.backoff(attempt);
        if self.jitter <= 0.0 || backoff.is_zero() {
            return backoff;
        }
        let spread = backoff.as_millis() as f64 * self.jitter;
        let extra = rand::thread_rng().gen_range(0.0..=spread);
        backoff + Duration::from_millis(extra as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(100),
            factor: 2.0,
            max_delay: Duration::from_millis(1_000),
            jitter: 0.0,
        }
    }

    #[test]
    fn test_backoff_grows_exponentially() {
        let p = policy();
        assert_eq!(p.backoff(0), Duration::from_millis(100));
        assert_eq!(p.backoff(1), Duration::from_millis(200));
        assert_eq!(p.backoff(2), Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(policy().backoff(10), Duration::from_millis(1_000));
    }

    #[test]
    fn test_jitter_stays_within_spread() {
        let mut p = policy();
        p.jitter = 0.5;
        for _ in 0..50 {
            let d = p.delay(1);
            assert!(d >= Duration::from_millis(200));
            assert!(d <= Duration::from_millis(300));
        }
    }

    #[test]
    fn test_immediate_policy_never_sleeps() {
        let p = RetryPolicy::immediate();
        assert_eq!(p.delay(0), Duration::ZERO);
        assert_eq!(p.delay(5), Duration::ZERO);
    }
}
