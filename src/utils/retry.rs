use std::future::Future;
use std::time::Duration;

use actix_web::rt::time::sleep;
use tracing::warn;

use crate::store::StoreResult;

/// Bounded exponential backoff for transient store failures.
///
/// Only `StoreError::Transient` is retried; every other error is returned
/// on the spot.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay before retry number `attempt` (1-based): base, 2×base, 4×base...
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor)
    }

    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut op: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient store error, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
