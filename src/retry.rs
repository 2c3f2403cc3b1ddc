use std::time::Duration;

use crate::error::AsciimateResult;

/// Bounded exponential backoff for transient gateway failures.
///
/// Only errors reporting `is_transient()` (network failures and timeouts)
/// are re-attempted; everything else, notably auth rejections, propagates
/// on first occurrence without consuming the budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Values below 1 behave as 1.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled after each failure.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Backoff to sleep after the `attempt`-th failure (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Run `op` under this policy. Returns the value and the number of
    /// retries that were needed (0 for a first-try success).
    pub fn run_counted<T>(
        &self,
        mut op: impl FnMut() -> AsciimateResult<T>,
    ) -> AsciimateResult<(T, u32)> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op() {
                Ok(v) => return Ok((v, attempt - 1)),
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::debug!(attempt, ?delay, error = %e, "transient failure, backing off");
                    std::thread::sleep(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn run<T>(&self, op: impl FnMut() -> AsciimateResult<T>) -> AsciimateResult<T> {
        self.run_counted(op).map(|(v, _)| v)
    }
}
