//! Per-service circuit breaker (§3 CircuitBreakerState, §4.6).

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerPhase {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    pub consecutive_failure_threshold: u32,
    /// Failures-per-total in the sliding window, as a fraction in
    /// `(0, 1]`.
    pub failure_rate_threshold: f64,
    pub window: Duration,
    pub cool_down: Duration,
    pub half_open_probes: u32,
    pub half_open_success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            consecutive_failure_threshold: 10,
            failure_rate_threshold: 0.5,
            window: Duration::from_secs(60),
            cool_down: Duration::from_secs(300),
            half_open_probes: 3,
            half_open_success_threshold: 2,
        }
    }
}

pub struct CircuitBreaker {
    config: BreakerConfig,
    phase: BreakerPhase,
    consecutive_failures: u32,
    /// `(timestamp, was_success)` samples within the rolling window.
    window: VecDeque<(DateTime<Utc>, bool)>,
    opened_at: Option<DateTime<Utc>>,
    half_open_inflight: u32,
    half_open_successes: u32,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            phase: BreakerPhase::Closed,
            consecutive_failures: 0,
            window: VecDeque::new(),
            opened_at: None,
            half_open_inflight: 0,
            half_open_successes: 0,
        }
    }

    pub fn phase(&self) -> BreakerPhase {
        self.phase
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let span = chrono::Duration::from_std(self.config.window).unwrap_or(chrono::Duration::zero());
        while let Some((ts, _)) = self.window.front() {
            if now - *ts > span {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    /// Whether a call should be let through right now. `open` rejects
    /// fast until `cool_down` elapses, then transitions to `half-open`
    /// and allows up to `half_open_probes` concurrent probes.
    pub fn allow_request(&mut self, now: DateTime<Utc>) -> bool {
        match self.phase {
            BreakerPhase::Closed => true,
            BreakerPhase::Open => {
                let cool_down = chrono::Duration::from_std(self.config.cool_down).unwrap_or(chrono::Duration::zero());
                if let Some(opened_at) = self.opened_at {
                    if now - opened_at >= cool_down {
                        self.phase = BreakerPhase::HalfOpen;
                        self.half_open_inflight = 0;
                        self.half_open_successes = 0;
                        return self.allow_request(now);
                    }
                }
                false
            }
            BreakerPhase::HalfOpen => {
                if self.half_open_inflight < self.config.half_open_probes {
                    self.half_open_inflight += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn on_success(&mut self, now: DateTime<Utc>) {
        self.prune(now);
        self.window.push_back((now, true));
        self.consecutive_failures = 0;

        if self.phase == BreakerPhase::HalfOpen {
            self.half_open_successes += 1;
            if self.half_open_successes >= self.config.half_open_success_threshold {
                self.phase = BreakerPhase::Closed;
                self.opened_at = None;
            }
        }
    }

    pub fn on_failure(&mut self, now: DateTime<Utc>) {
        self.prune(now);
        self.window.push_back((now, false));
        self.consecutive_failures += 1;

        if self.phase == BreakerPhase::HalfOpen {
            self.trip(now);
            return;
        }

        let failures_in_window = self.window.iter().filter(|(_, ok)| !ok).count();
        let rate = failures_in_window as f64 / self.window.len().max(1) as f64;

        if self.consecutive_failures >= self.config.consecutive_failure_threshold || rate >= self.config.failure_rate_threshold {
            self.trip(now);
        }
    }

    fn trip(&mut self, now: DateTime<Utc>) {
        self.phase = BreakerPhase::Open;
        self.opened_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BreakerConfig {
        BreakerConfig {
            consecutive_failure_threshold: 3,
            failure_rate_threshold: 0.9,
            window: Duration::from_secs(60),
            cool_down: Duration::from_secs(30),
            half_open_probes: 1,
            half_open_success_threshold: 1,
        }
    }

    #[test]
    fn trips_on_consecutive_failures() {
        let mut breaker = CircuitBreaker::new(config());
        let now = Utc::now();
        for _ in 0..3 {
            breaker.on_failure(now);
        }
        assert_eq!(breaker.phase(), BreakerPhase::Open);
        assert!(!breaker.allow_request(now));
    }

    #[test]
    fn half_open_after_cool_down_then_recovers() {
        let mut breaker = CircuitBreaker::new(config());
        let now = Utc::now();
        for _ in 0..3 {
            breaker.on_failure(now);
        }
        let later = now + chrono::Duration::seconds(60);
        assert!(breaker.allow_request(later));
        assert_eq!(breaker.phase(), BreakerPhase::HalfOpen);
        breaker.on_success(later);
        assert_eq!(breaker.phase(), BreakerPhase::Closed);
    }

    #[test]
    fn half_open_failure_reopens_with_extended_cooldown() {
        let mut breaker = CircuitBreaker::new(config());
        let now = Utc::now();
        for _ in 0..3 {
            breaker.on_failure(now);
        }
        let later = now + chrono::Duration::seconds(60);
        assert!(breaker.allow_request(later));
        breaker.on_failure(later);
        assert_eq!(breaker.phase(), BreakerPhase::Open);
        assert!(!breaker.allow_request(later));
    }
}
