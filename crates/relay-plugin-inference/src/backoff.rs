use std::future::Future;
use std::time::Duration;

/// Exponential backoff for endpoint calls.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Total attempts, first one included.
    pub max_attempts: usize,
    /// Sleep after the first failure; doubles after each further failure.
    pub initial_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
        }
    }
}

impl BackoffPolicy {
    pub fn new(max_attempts: usize, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
        }
    }

    /// Delay slept after failed attempt number `attempt` (zero based).
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt as u32).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor)
    }

    /// Runs `op` until it succeeds or the attempt budget is spent.
    ///
    /// Every failure is followed by its backoff sleep, the last one included,
    /// and the last error is returned once attempts run out. With the default
    /// policy that is 1 + 2 + 4 + 8 + 16 = 31 s of sleeping before the caller
    /// sees the error, 16 s of it after the final attempt.
    pub async fn retry<F, Fut, T, E>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        ?delay,
                        error = %e,
                        "inference attempt failed"
                    );
                    tokio::time::sleep(delay).await;
                    if attempt >= self.max_attempts {
                        return Err(e);
                    }
                }
            }
        }
    }
}
