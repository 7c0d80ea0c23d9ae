//! Circuit breaker guarding calls to the distributed tier.
//!
//! ## State Machine
//!
//! ```text
//! CLOSED --[threshold failures]--> OPEN --[timeout elapsed]--> HALF_OPEN
//!    ^                                                             |
//!    +-------------------[probe succeeds]-------------------------+
//! ```
//!
//! While `OPEN`, operations are rejected immediately so a failing backend
//! is not hammered. Once the cooldown elapses a single optimistic probe is
//! let through; its outcome decides between recovery and re-opening.

use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use voxbridge_core::{CacheError, Result};

/// Breaker state, owned exclusively by one `CircuitBreaker` instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

#[derive(Debug)]
struct BreakerCore {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    last_success: Option<Instant>,
}

/// Status snapshot for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerStatus {
    pub state: CircuitState,
    pub failure_count: u32,
    pub threshold: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_since_last_failure: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_since_last_success: Option<f64>,
}

/// Per-backend failure-tracking state machine.
pub struct CircuitBreaker {
    name: String,
    threshold: u32,
    timeout: Duration,
    core: Mutex<BreakerCore>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, threshold: u32, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            threshold,
            timeout,
            core: Mutex::new(BreakerCore {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                last_success: None,
            }),
        }
    }

    /// Check whether the circuit is open, transitioning to `HALF_OPEN` once
    /// the cooldown since the last failure has elapsed.
    pub fn is_open(&self) -> bool {
        let mut core = self.core.lock();
        if core.state != CircuitState::Open {
            return false;
        }
        let cooled_down = core
            .last_failure
            .is_none_or(|at| at.elapsed() > self.timeout);
        if cooled_down {
            tracing::info!(name = %self.name, "circuit breaker transitioning to HALF_OPEN");
            core.state = CircuitState::HalfOpen;
            return false;
        }
        true
    }

    /// Record a successful operation.
    pub fn record_success(&self) {
        let mut core = self.core.lock();
        let previous = core.state;
        core.failure_count = 0;
        core.last_success = Some(Instant::now());

        match previous {
            CircuitState::HalfOpen => {
                tracing::info!(name = %self.name, "circuit breaker recovered, transitioning to CLOSED");
                core.state = CircuitState::Closed;
            }
            CircuitState::Open => {
                // A success racing an open circuit still counts as recovery.
                tracing::warn!(name = %self.name, "circuit breaker had success while OPEN");
                core.state = CircuitState::Closed;
            }
            CircuitState::Closed => {}
        }
    }

    /// Record a failed operation, opening the circuit at the threshold.
    pub fn record_failure(&self) {
        let mut core = self.core.lock();
        core.failure_count += 1;
        core.last_failure = Some(Instant::now());

        tracing::debug!(
            name = %self.name,
            failure_count = core.failure_count,
            threshold = self.threshold,
            "circuit breaker recorded failure"
        );

        if core.failure_count >= self.threshold && core.state != CircuitState::Open {
            tracing::error!(
                name = %self.name,
                failure_count = core.failure_count,
                threshold = self.threshold,
                "circuit breaker tripped"
            );
            core.state = CircuitState::Open;
        }
    }

    /// Run an operation under breaker protection.
    ///
    /// The outcome is recorded on every exit path: a rejected call never
    /// touches the counters, a completed call always updates them.
    pub async fn protect<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if self.is_open() {
            tracing::warn!(name = %self.name, "circuit breaker is OPEN, rejecting operation");
            return Err(CacheError::circuit_open(&self.name));
        }

        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                tracing::error!(name = %self.name, error = %e, "operation failed through circuit breaker");
                Err(e)
            }
        }
    }

    /// Snapshot for health reporting.
    pub fn status(&self) -> CircuitBreakerStatus {
        let core = self.core.lock();
        CircuitBreakerStatus {
            state: core.state,
            failure_count: core.failure_count,
            threshold: self.threshold,
            seconds_since_last_failure: core.last_failure.map(|at| at.elapsed().as_secs_f64()),
            seconds_since_last_success: core.last_success.map(|at| at.elapsed().as_secs_f64()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new("test", threshold, timeout)
    }

    #[test]
    fn test_trips_after_threshold_failures() {
        let cb = breaker(3, Duration::from_secs(30));
        assert!(!cb.is_open());

        cb.record_failure();
        cb.record_failure();
        assert!(!cb.is_open());

        cb.record_failure();
        assert!(cb.is_open());
        assert_eq!(cb.status().state, CircuitState::Open);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = breaker(3, Duration::from_secs(30));
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert!(!cb.is_open());
    }

    #[test]
    fn test_half_open_after_timeout_then_closes_on_success() {
        let cb = breaker(1, Duration::from_millis(50));
        cb.record_failure();
        assert!(cb.is_open());

        std::thread::sleep(Duration::from_millis(80));

        // Cooldown elapsed: the next check lets a probe through.
        assert!(!cb.is_open());
        assert_eq!(cb.status().state, CircuitState::HalfOpen);

        cb.record_success();
        assert_eq!(cb.status().state, CircuitState::Closed);
        assert_eq!(cb.status().failure_count, 0);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let cb = breaker(1, Duration::from_millis(50));
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(80));
        assert!(!cb.is_open());

        cb.record_failure();
        assert!(cb.is_open());
    }

    #[tokio::test]
    async fn test_protect_rejects_while_open() {
        let cb = breaker(1, Duration::from_secs(30));
        cb.record_failure();

        let result = cb.protect(|| async { Ok(1u32) }).await;
        assert!(matches!(result, Err(CacheError::CircuitOpen { .. })));
    }

    #[tokio::test]
    async fn test_protect_records_outcomes() {
        let cb = breaker(2, Duration::from_secs(30));

        let failed: Result<u32> = cb
            .protect(|| async { Err(CacheError::connection("down")) })
            .await;
        assert!(failed.is_err());
        assert_eq!(cb.status().failure_count, 1);

        let ok = cb.protect(|| async { Ok(5u32) }).await.expect("success");
        assert_eq!(ok, 5);
        assert_eq!(cb.status().failure_count, 0);
    }

    #[test]
    fn test_status_snapshot_fields() {
        let cb = breaker(5, Duration::from_secs(30));
        let status = cb.status();
        assert_eq!(status.threshold, 5);
        assert!(status.seconds_since_last_failure.is_none());

        cb.record_failure();
        let status = cb.status();
        assert_eq!(status.failure_count, 1);
        assert!(status.seconds_since_last_failure.is_some());
    }
}
