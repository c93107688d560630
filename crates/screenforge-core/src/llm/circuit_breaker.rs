//! Per-(provider, model) circuit breaker (C3).
//!
//! Standard three-state machine: `Closed` (calls pass through), `Open`
//! (calls fail fast, no network round trip) and `HalfOpen` (a limited
//! number of probe calls are allowed through to test recovery). Defaults
//! match what the originating screening tool used in production:
//! `failure_threshold = 5`, `recovery_timeout = 60s`, `success_threshold = 3`.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            success_threshold: 3,
        }
    }
}

struct State {
    circuit: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
    /// EWMA of recent call latency, milliseconds. Exposed for observability
    /// and for the dispatcher's fallback-ranking heuristic.
    ewma_latency_ms: f64,
}

pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: Mutex<State>,
}

const LATENCY_ALPHA: f64 = 0.1;

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State {
                circuit: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: None,
                ewma_latency_ms: 0.0,
            }),
        }
    }

    /// Whether a call should be allowed through right now. Transitions
    /// `Open` -> `HalfOpen` as a side effect once `recovery_timeout` has
    /// elapsed.
    pub fn allow_call(&self) -> bool {
        let mut state = self.state.lock().expect("circuit breaker mutex poisoned");
        match state.circuit {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let opened_at = state.opened_at.expect("opened_at set when circuit is open");
                if opened_at.elapsed() >= self.config.recovery_timeout {
                    state.circuit = CircuitState::HalfOpen;
                    state.consecutive_successes = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self, latency_ms: u64) {
        let mut state = self.state.lock().expect("circuit breaker mutex poisoned");
        state.ewma_latency_ms = LATENCY_ALPHA * latency_ms as f64 + (1.0 - LATENCY_ALPHA) * state.ewma_latency_ms;
        state.consecutive_failures = 0;

        match state.circuit {
            CircuitState::Closed => {}
            CircuitState::HalfOpen => {
                state.consecutive_successes += 1;
                if state.consecutive_successes >= self.config.success_threshold {
                    state.circuit = CircuitState::Closed;
                    state.opened_at = None;
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock().expect("circuit breaker mutex poisoned");
        state.consecutive_successes = 0;

        match state.circuit {
            CircuitState::Closed => {
                state.consecutive_failures += 1;
                if state.consecutive_failures >= self.config.failure_threshold {
                    state.circuit = CircuitState::Open;
                    state.opened_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen => {
                state.circuit = CircuitState::Open;
                state.opened_at = Some(Instant::now());
                state.consecutive_failures = 0;
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state.lock().expect("circuit breaker mutex poisoned").circuit
    }

    pub fn ewma_latency_ms(&self) -> f64 {
        self.state.lock().expect("circuit breaker mutex poisoned").ewma_latency_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_breaker() -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            recovery_timeout: Duration::from_millis(50),
            success_threshold: 2,
        })
    }

    #[test]
    fn starts_closed_and_allows_calls() {
        let breaker = fast_breaker();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.allow_call());
    }

    #[test]
    fn opens_after_failure_threshold() {
        let breaker = fast_breaker();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow_call());
    }

    #[test]
    fn success_resets_failure_count() {
        let breaker = fast_breaker();
        breaker.record_failure();
        breaker.record_success(10);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn transitions_to_half_open_after_recovery_timeout() {
        let breaker = fast_breaker();
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        std::thread::sleep(Duration::from_millis(60));
        assert!(breaker.allow_call());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_closes_after_success_threshold() {
        let breaker = fast_breaker();
        breaker.record_failure();
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(60));
        breaker.allow_call();
        breaker.record_success(10);
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        breaker.record_success(10);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_reopens_on_any_failure() {
        let breaker = fast_breaker();
        breaker.record_failure();
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(60));
        breaker.allow_call();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn latency_ewma_tracks_recorded_successes() {
        let breaker = fast_breaker();
        breaker.record_success(100);
        assert!(breaker.ewma_latency_ms() > 0.0);
    }
}
