//! Per-provider circuit breaker shared by the LLM and embedding chains.

use std::{
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

/// Consecutive failures before a provider is skipped.
pub const FAILURE_THRESHOLD: usize = 3;
/// How long a tripped provider is skipped.
pub const COOLDOWN: Duration = Duration::from_secs(60);

/// Circuit breaker state for a single provider.
pub(crate) struct CircuitBreaker {
    consecutive_failures: AtomicUsize,
    last_failure: Mutex<Option<Instant>>,
    threshold: usize,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub(crate) fn new() -> Self {
        Self::with_limits(FAILURE_THRESHOLD, COOLDOWN)
    }

    pub(crate) fn with_limits(threshold: usize, cooldown: Duration) -> Self {
        Self {
            consecutive_failures: AtomicUsize::new(0),
            last_failure: Mutex::new(None),
            threshold,
            cooldown,
        }
    }

    pub(crate) fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
    }

    pub(crate) fn record_failure(&self) {
        self.consecutive_failures.fetch_add(1, Ordering::SeqCst);
        *self.last_failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
    }

    /// Returns `true` when the circuit is open (provider should be skipped).
    pub(crate) fn is_tripped(&self) -> bool {
        let failures = self.consecutive_failures.load(Ordering::SeqCst);
        if failures < self.threshold {
            return false;
        }
        let last = self.last_failure.lock().unwrap_or_else(|e| e.into_inner());
        match *last {
            Some(t) if t.elapsed() < self.cooldown => true,
            _ => {
                // Cooldown expired: give the provider another chance.
                drop(last);
                self.consecutive_failures.store(0, Ordering::SeqCst);
                false
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_after_threshold_and_resets_on_success() {
        let breaker = CircuitBreaker::new();
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_tripped());
        breaker.record_failure();
        assert!(breaker.is_tripped());

        breaker.record_success();
        assert!(!breaker.is_tripped());
    }

    #[test]
    fn cooldown_expiry_closes_the_circuit() {
        let breaker = CircuitBreaker::with_limits(1, Duration::ZERO);
        breaker.record_failure();
        assert!(!breaker.is_tripped());
    }
}
