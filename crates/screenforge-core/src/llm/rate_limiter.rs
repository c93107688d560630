//! Adaptive per-(provider, model) rate limiter (C2).
//!
//! Tracks a sliding window of recent call outcomes and adjusts an allowed
//! requests-per-minute figure with an exponentially weighted moving
//! average: successes nudge the limit up, 429s and timeouts pull it down
//! hard. The limiter never blocks the caller — `acquire` returns
//! immediately with a wait duration, so backpressure decisions stay with
//! the dispatcher (C5).

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Smoothing factor for the EWMA adjustment. Closer to 1.0 reacts faster
/// to recent outcomes; closer to 0.0 is steadier.
const ALPHA: f64 = 0.1;

const RPM_MIN: f64 = 1.0;
const RPM_MAX: f64 = 6000.0;

/// How far back the sliding window of call timestamps extends.
const WINDOW: Duration = Duration::from_secs(60);

struct State {
    current_rpm: f64,
    recent_calls: VecDeque<Instant>,
}

/// An adaptive rate limiter scoped to one (provider, model) pair.
pub struct RateLimiter {
    initial_rpm: f64,
    state: Mutex<State>,
}

impl RateLimiter {
    pub fn new(initial_rpm: f64) -> Self {
        let initial_rpm = initial_rpm.clamp(RPM_MIN, RPM_MAX);
        Self {
            initial_rpm,
            state: Mutex::new(State {
                current_rpm: initial_rpm,
                recent_calls: VecDeque::new(),
            }),
        }
    }

    /// How long the caller should wait before issuing the next call, given
    /// the current allowed rate and recent call volume. Returns
    /// `Duration::ZERO` when under the limit.
    pub fn acquire(&self) -> Duration {
        let mut state = self.state.lock().expect("rate limiter mutex poisoned");
        let now = Instant::now();
        Self::evict_stale(&mut state.recent_calls, now);

        let allowed_per_window = state.current_rpm;
        if (state.recent_calls.len() as f64) < allowed_per_window {
            state.recent_calls.push_back(now);
            return Duration::ZERO;
        }

        let oldest = *state.recent_calls.front().expect("window non-empty when at capacity");
        let elapsed = now.duration_since(oldest);
        let wait = WINDOW.saturating_sub(elapsed);
        state.recent_calls.push_back(now);
        wait
    }

    /// Record a successful call: nudge the allowed rate up via EWMA toward
    /// a generous ceiling, bounded by `RPM_MAX`.
    pub fn record_success(&self) {
        let mut state = self.state.lock().expect("rate limiter mutex poisoned");
        let target = (state.current_rpm * 1.1).min(RPM_MAX);
        state.current_rpm = ALPHA * target + (1.0 - ALPHA) * state.current_rpm;
        state.current_rpm = state.current_rpm.clamp(RPM_MIN, RPM_MAX);
    }

    /// Record a rate-limit or timeout signal: pull the allowed rate down
    /// hard via EWMA toward half the current rate, bounded by `RPM_MIN`.
    pub fn record_throttled(&self) {
        let mut state = self.state.lock().expect("rate limiter mutex poisoned");
        let target = (state.current_rpm * 0.5).max(RPM_MIN);
        state.current_rpm = ALPHA * target + (1.0 - ALPHA) * state.current_rpm;
        state.current_rpm = state.current_rpm.clamp(RPM_MIN, RPM_MAX);
    }

    pub fn current_rpm(&self) -> f64 {
        self.state.lock().expect("rate limiter mutex poisoned").current_rpm
    }

    pub fn reset(&self) {
        let mut state = self.state.lock().expect("rate limiter mutex poisoned");
        state.current_rpm = self.initial_rpm;
        state.recent_calls.clear();
    }

    fn evict_stale(calls: &mut VecDeque<Instant>, now: Instant) {
        while let Some(front) = calls.front() {
            if now.duration_since(*front) > WINDOW {
                calls.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_rpm_is_clamped_to_bounds() {
        let limiter = RateLimiter::new(0.0);
        assert_eq!(limiter.current_rpm(), RPM_MIN);
        let limiter = RateLimiter::new(999_999.0);
        assert_eq!(limiter.current_rpm(), RPM_MAX);
    }

    #[test]
    fn acquire_does_not_wait_under_limit() {
        let limiter = RateLimiter::new(60.0);
        assert_eq!(limiter.acquire(), Duration::ZERO);
    }

    #[test]
    fn acquire_waits_once_window_is_full() {
        let limiter = RateLimiter::new(2.0);
        assert_eq!(limiter.acquire(), Duration::ZERO);
        assert_eq!(limiter.acquire(), Duration::ZERO);
        let wait = limiter.acquire();
        assert!(wait > Duration::ZERO);
    }

    #[test]
    fn success_increases_rate_up_to_max() {
        let limiter = RateLimiter::new(100.0);
        let before = limiter.current_rpm();
        limiter.record_success();
        assert!(limiter.current_rpm() > before);
        assert!(limiter.current_rpm() <= RPM_MAX);
    }

    #[test]
    fn throttle_decreases_rate_down_to_min() {
        let limiter = RateLimiter::new(100.0);
        let before = limiter.current_rpm();
        limiter.record_throttled();
        assert!(limiter.current_rpm() < before);
        assert!(limiter.current_rpm() >= RPM_MIN);
    }

    #[test]
    fn reset_restores_initial_rate_and_clears_window() {
        let limiter = RateLimiter::new(50.0);
        limiter.record_throttled();
        limiter.acquire();
        limiter.reset();
        assert_eq!(limiter.current_rpm(), 50.0);
    }
}
