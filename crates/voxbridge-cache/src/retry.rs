//! Retry with exponential backoff under circuit-breaker protection.
//!
//! Connection-class failures (pool checkout, unreachable backend) and
//! circuit-open rejections fail fast; everything else is retried with
//! `retry_delay * 2^attempt` plus jitter.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use voxbridge_core::Result;

use crate::circuit_breaker::CircuitBreaker;
use crate::stats::StatsRecorder;

/// Upper bound on the random jitter added to each backoff delay.
const JITTER_MAX_MS: u64 = 100;

pub struct RetryExecutor {
    max_retries: u32,
    retry_delay: Duration,
    breaker: Arc<CircuitBreaker>,
    stats: Arc<StatsRecorder>,
}

impl RetryExecutor {
    pub fn new(
        max_retries: u32,
        retry_delay: Duration,
        breaker: Arc<CircuitBreaker>,
        stats: Arc<StatsRecorder>,
    ) -> Self {
        Self {
            max_retries,
            retry_delay,
            breaker,
            stats,
        }
    }

    /// Run an operation with bounded retries, each attempt protected by
    /// the circuit breaker.
    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            match self.breaker.protect(&op).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    self.stats.record_error(&format!("retry_attempt_{attempt}"));

                    if e.is_connection() || matches!(e, voxbridge_core::CacheError::CircuitOpen { .. })
                    {
                        tracing::debug!(error = %e, "not retryable, failing fast");
                        return Err(e);
                    }

                    last_error = Some(e);
                    if attempt < self.max_retries {
                        let jitter = rand::thread_rng().gen_range(0..JITTER_MAX_MS);
                        let delay =
                            self.retry_delay * 2u32.pow(attempt) + Duration::from_millis(jitter);
                        tracing::debug!(
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            "retrying cache operation"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        self.stats.record_circuit_breaker_trip();
        let error = last_error
            .unwrap_or_else(|| voxbridge_core::CacheError::connection("retry loop exhausted"));
        tracing::error!(
            error = %error,
            max_retries = self.max_retries,
            "cache operation failed after retries"
        );
        Err(error)
    }
}
