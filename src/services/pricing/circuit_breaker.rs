//! Per-token circuit breaker

use dashmap::DashMap;
use metrics::counter;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
struct BreakerState {
    open: bool,
    opened_at: Option<Instant>,
    consecutive_failures: u32,
}

/// Opens for a token after `failure_threshold` consecutive failures and
/// closes again on the first check after `cooldown`.
#[derive(Debug)]
pub struct CircuitBreaker {
    states: DashMap<String, BreakerState>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    /// Create a breaker with the given trip threshold and cooldown
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            states: DashMap::new(),
            failure_threshold: failure_threshold.max(1),
            cooldown,
        }
    }

    /// Whether `token` is currently blocked
    pub fn is_open(&self, token: &str) -> bool {
        let Some(mut state) = self.states.get_mut(token) else {
            return false;
        };
        if !state.open {
            return false;
        }

        let expired = state
            .opened_at
            .map_or(true, |opened_at| opened_at.elapsed() >= self.cooldown);
        if expired {
            *state = BreakerState::default();
            info!("🔌 Circuit breaker closed for {}", token);
            return false;
        }
        true
    }

    /// Reset the failure streak of `token`
    pub fn record_success(&self, token: &str) {
        if let Some(mut state) = self.states.get_mut(token) {
            state.consecutive_failures = 0;
        }
    }

    /// Count a failure for `token`, opening the breaker at the threshold
    pub fn record_failure(&self, token: &str) {
        let mut state = self.states.entry(token.to_string()).or_default();
        state.consecutive_failures += 1;

        if !state.open && state.consecutive_failures >= self.failure_threshold {
            state.open = true;
            state.opened_at = Some(Instant::now());
            counter!("price_validation_breaker_open_total").increment(1);
            warn!(
                "🚨 Circuit breaker opened for {} after {} consecutive failures",
                token, state.consecutive_failures
            );
        }
    }

    /// Current failure streak of `token`
    pub fn consecutive_failures(&self, token: &str) -> u32 {
        self.states
            .get(token)
            .map_or(0, |state| state.consecutive_failures)
    }

    /// Tokens whose breaker is open, ignoring cooldown expiry
    pub fn open_tokens(&self) -> Vec<String> {
        self.states
            .iter()
            .filter(|entry| entry.open)
            .map(|entry| entry.key().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opens_at_threshold() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(300));

        breaker.record_failure("SOL");
        breaker.record_failure("SOL");
        assert!(!breaker.is_open("SOL"));

        breaker.record_failure("SOL");
        assert!(breaker.is_open("SOL"));
        assert_eq!(breaker.open_tokens(), vec!["SOL".to_string()]);
        assert!(!breaker.is_open("BONK"));
    }

    #[test]
    fn test_success_resets_streak() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(300));

        breaker.record_failure("SOL");
        breaker.record_failure("SOL");
        breaker.record_success("SOL");
        breaker.record_failure("SOL");

        assert_eq!(breaker.consecutive_failures("SOL"), 1);
        assert!(!breaker.is_open("SOL"));
    }

    #[test]
    fn test_closes_after_cooldown() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(30));

        breaker.record_failure("SOL");
        assert!(breaker.is_open("SOL"));

        std::thread::sleep(Duration::from_millis(60));
        assert!(!breaker.is_open("SOL"));
        assert_eq!(breaker.consecutive_failures("SOL"), 0);
    }
}
