//! Rule-based quote validation

use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use metrics::{counter, histogram};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::circuit_breaker::CircuitBreaker;
use super::{PriceQuote, PriceValidation};
use crate::application::health::ComponentHealth;
use crate::config::models::PricingConfig;

const DEVIATION_PENALTY: f64 = 0.3;
const VOLATILITY_PENALTY: f64 = 0.2;
const VOLUME_PENALTY: f64 = 0.1;

/// Validates quotes against a rolling window of accepted prices per token
#[derive(Debug)]
pub struct PriceValidator {
    config: PricingConfig,
    history: DashMap<String, VecDeque<f64>>,
    breaker: CircuitBreaker,
}

impl PriceValidator {
    /// Create a validator
    pub fn new(config: PricingConfig) -> Self {
        let breaker = CircuitBreaker::new(
            config.breaker_failure_threshold,
            Duration::from_secs(config.breaker_cooldown_secs),
        );
        Self {
            config,
            history: DashMap::new(),
            breaker,
        }
    }

    /// The per-token circuit breaker
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Accepted prices for `token`, oldest first
    pub fn history(&self, token: &str) -> Vec<f64> {
        self.history
            .get(token)
            .map(|window| window.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Validate a quote. Accepted prices join the token's window; rejected
    /// quotes count towards its breaker.
    #[instrument(skip(self, quote), fields(token = %quote.token, price = quote.price))]
    pub fn validate(&self, quote: &PriceQuote) -> PriceValidation {
        let mut result = PriceValidation {
            is_valid: false,
            confidence: 1.0,
            warnings: Vec::new(),
            errors: Vec::new(),
        };

        if self.breaker.is_open(&quote.token) {
            result.confidence = 0.0;
            result
                .errors
                .push(format!("Circuit breaker open for {}", quote.token));
            counter!("price_validation_total", "result" => "blocked").increment(1);
            return result;
        }

        if !quote.price.is_finite() || quote.price <= 0.0 {
            result.confidence = 0.0;
            result.errors.push(format!("Invalid price: {}", quote.price));
            return self.finish(quote, result);
        }

        let age = Utc::now().signed_duration_since(quote.timestamp);
        let max_age = ChronoDuration::from_std(Duration::from_secs(self.config.max_staleness_secs));
        if matches!(max_age, Ok(max_age) if age > max_age) {
            result.errors.push(format!(
                "Stale quote: {}s old (max {}s)",
                age.num_seconds(),
                self.config.max_staleness_secs
            ));
        }

        let window = self.history(&quote.token);
        if let Some(average) = mean(&window) {
            let deviation = (quote.price - average).abs() / average * 100.0;
            if deviation > self.config.max_deviation_pct * 2.0 {
                result.errors.push(format!(
                    "Price deviates {:.2}% from average {:.6}",
                    deviation, average
                ));
            } else if deviation > self.config.max_deviation_pct {
                result.confidence -= DEVIATION_PENALTY;
                result.warnings.push(format!(
                    "Price deviates {:.2}% from average {:.6}",
                    deviation, average
                ));
            }
        }

        if let Some(volatility) = coefficient_of_variation(&window) {
            if volatility > self.config.max_volatility_pct {
                result.confidence -= VOLATILITY_PENALTY;
                result
                    .warnings
                    .push(format!("High volatility: {:.2}%", volatility));
            }
        }

        match quote.volume_24h {
            Some(volume) if volume >= self.config.min_volume_usd => {}
            Some(volume) => {
                result.confidence -= VOLUME_PENALTY;
                result.warnings.push(format!("Low 24h volume: ${:.0}", volume));
            }
            None => {
                result.confidence -= VOLUME_PENALTY;
                result.warnings.push("24h volume unavailable".to_string());
            }
        }

        result.confidence = result.confidence.clamp(0.0, 1.0);
        self.finish(quote, result)
    }

    /// Degraded while any token's breaker is open
    pub fn health_check(&self) -> ComponentHealth {
        let mut component = ComponentHealth::new("price_validator".to_string(), false);
        let mut open = self.breaker.open_tokens();

        if open.is_empty() {
            component.mark_healthy(Some(format!("{} token(s) tracked", self.history.len())), None);
        } else {
            open.sort();
            component.mark_degraded(format!("Circuit breaker open for {}", open.join(", ")), None);
        }

        component
    }

    fn finish(&self, quote: &PriceQuote, mut result: PriceValidation) -> PriceValidation {
        result.is_valid = result.errors.is_empty() && result.confidence >= self.config.min_confidence;
        histogram!("price_validation_confidence").record(result.confidence);

        if result.is_valid {
            self.remember(&quote.token, quote.price);
            self.breaker.record_success(&quote.token);
            counter!("price_validation_total", "result" => "valid").increment(1);
            debug!("✅ Accepted {} at {} (confidence {:.2})", quote.token, quote.price, result.confidence);
        } else {
            self.breaker.record_failure(&quote.token);
            counter!("price_validation_total", "result" => "rejected").increment(1);
            warn!(
                "❌ Rejected {} quote from {}: {}",
                quote.token,
                quote.source,
                result
                    .errors
                    .iter()
                    .chain(result.warnings.iter())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join("; ")
            );
        }

        result
    }

    fn remember(&self, token: &str, price: f64) {
        let mut window = self.history.entry(token.to_string()).or_default();
        window.push_back(price);
        while window.len() > self.config.history_window.max(1) {
            window.pop_front();
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Standard deviation over mean, in percent. Needs two samples.
fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let average = mean(values)?;
    if average <= 0.0 {
        return None;
    }
    let variance = values.iter().map(|v| (v - average).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt() / average * 100.0)
}
