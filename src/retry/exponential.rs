use super::RetryPolicy;
use crate::config::RetryConfig;
use std::time::Duration;

/// 指数退避重试策略：base * 2^(attempt-1)，不超过 max_delay
#[derive(Debug, Clone)]
pub struct ExponentialBackoffPolicy {
    max_attempts: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl ExponentialBackoffPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }
}

impl RetryPolicy for ExponentialBackoffPolicy {
    fn should_retry(&self, attempt: usize) -> bool {
        attempt < self.max_attempts
    }

    fn backoff_duration(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(10) as u32;
        let delay = self.base_delay.saturating_mul(1 << exponent);
        delay.min(self.max_delay)
    }

    fn max_attempts(&self) -> usize {
        self.max_attempts
    }
}
