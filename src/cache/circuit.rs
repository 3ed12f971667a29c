//! Circuit breaker shared by the result cache (C1) and the external
//! provider pool (C7), spec §4.1, §4.6. Exact shape grounded in
//! `examples/original_source/src/search/orchestrator.py`'s
//! `_cache_circuit_allows`/`_cache_circuit_on_failure`/`_cache_circuit_on_success`.

use std::time::{Duration, Instant};

use crate::types::CircuitState;

const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(2);
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: CircuitState,
    failure_count: u32,
    failure_threshold: u32,
    backoff: Duration,
    initial_backoff: Duration,
    max_backoff: Duration,
    next_attempt_at: Option<Instant>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(
            DEFAULT_FAILURE_THRESHOLD,
            DEFAULT_INITIAL_BACKOFF,
            DEFAULT_MAX_BACKOFF,
        )
    }
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            failure_threshold,
            backoff: initial_backoff,
            initial_backoff,
            max_backoff,
            next_attempt_at: None,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Whether a call is allowed right now. Transitions `open -> half_open`
    /// once the backoff has elapsed.
    pub fn allow(&mut self, now: Instant) -> bool {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                if self.next_attempt_at.map(|t| now >= t).unwrap_or(true) {
                    self.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// A successful call in half-open (or closed) resets the breaker fully.
    pub fn on_success(&mut self) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.backoff = self.initial_backoff;
        self.next_attempt_at = None;
    }

    pub fn on_failure(&mut self, now: Instant) {
        self.failure_count += 1;
        if self.state == CircuitState::HalfOpen || self.failure_count >= self.failure_threshold {
            self.state = CircuitState::Open;
            self.next_attempt_at = Some(now + self.backoff);
            self.backoff = (self.backoff * 2).min(self.max_backoff);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_failures() {
        let mut cb = CircuitBreaker::new(3, Duration::from_millis(10), Duration::from_millis(100));
        let t0 = Instant::now();
        assert!(cb.allow(t0));
        cb.on_failure(t0);
        cb.on_failure(t0);
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.on_failure(t0);
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow(t0));
    }

    #[test]
    fn half_opens_after_backoff_then_closes_on_success() {
        let mut cb = CircuitBreaker::new(1, Duration::from_millis(10), Duration::from_millis(100));
        let t0 = Instant::now();
        cb.on_failure(t0);
        assert_eq!(cb.state(), CircuitState::Open);
        let t1 = t0 + Duration::from_millis(11);
        assert!(cb.allow(t1));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.on_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn backoff_doubles_up_to_ceiling() {
        let mut cb = CircuitBreaker::new(1, Duration::from_secs(2), Duration::from_secs(30));
        let t0 = Instant::now();
        cb.on_failure(t0);
        assert_eq!(cb.backoff, Duration::from_secs(4));
        for _ in 0..10 {
            cb.state = CircuitState::HalfOpen;
            cb.on_failure(t0);
        }
        assert_eq!(cb.backoff, Duration::from_secs(30));
    }
}
