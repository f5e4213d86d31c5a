//! Per-model circuit breaker.
//!
//! Prevents the gateway from hammering a degraded provider by tracking
//! failure counts per model id and fast-failing once a threshold trips.
//! Standard Closed → Open → HalfOpen state machine.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Circuit breaker state for one model id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open { opened_at: Instant },
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            half_open_max_calls: 2,
        }
    }
}

#[derive(Debug)]
struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: CircuitState,
    failure_count: u32,
    half_open_calls: u32,
}

/// Returned when a model's circuit is open and the call must fast-fail.
#[derive(Debug, Clone)]
pub struct CircuitOpen {
    pub model_id: String,
    pub consecutive_failures: u32,
    pub recovery_remaining: Duration,
}

impl CircuitBreaker {
    fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: CircuitState::Closed,
            failure_count: 0,
            half_open_calls: 0,
        }
    }

    fn check(&mut self, model_id: &str) -> Result<(), CircuitOpen> {
        match &self.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open { opened_at } => {
                if opened_at.elapsed() >= self.config.recovery_timeout {
                    self.state = CircuitState::HalfOpen;
                    self.half_open_calls = 1;
                    tracing::info!(model_id, "circuit transitioning to half-open");
                    Ok(())
                } else {
                    Err(CircuitOpen {
                        model_id: model_id.to_string(),
                        consecutive_failures: self.failure_count,
                        recovery_remaining: self.config.recovery_timeout - opened_at.elapsed(),
                    })
                }
            }
            CircuitState::HalfOpen => {
                if self.half_open_calls < self.config.half_open_max_calls {
                    self.half_open_calls += 1;
                    Ok(())
                } else {
                    Err(CircuitOpen {
                        model_id: model_id.to_string(),
                        consecutive_failures: self.failure_count,
                        recovery_remaining: Duration::ZERO,
                    })
                }
            }
        }
    }

    fn record_success(&mut self, model_id: &str) {
        match self.state {
            CircuitState::Closed => self.failure_count = 0,
            CircuitState::HalfOpen => {
                self.state = CircuitState::Closed;
                self.failure_count = 0;
                self.half_open_calls = 0;
                tracing::info!(model_id, "circuit recovered, now closed");
            }
            CircuitState::Open { .. } => {
                self.state = CircuitState::Closed;
                self.failure_count = 0;
            }
        }
    }

    fn record_failure(&mut self, model_id: &str) {
        match self.state {
            CircuitState::Closed => {
                self.failure_count += 1;
                if self.failure_count >= self.config.failure_threshold {
                    self.state = CircuitState::Open { opened_at: Instant::now() };
                    tracing::warn!(model_id, failures = self.failure_count, "circuit tripped open");
                }
            }
            CircuitState::HalfOpen => {
                self.state = CircuitState::Open { opened_at: Instant::now() };
                self.half_open_calls = 0;
                tracing::warn!(model_id, "half-open trial failed, back to open");
            }
            CircuitState::Open { .. } => self.failure_count += 1,
        }
    }
}

/// Registry of circuit breakers keyed by model id, shared across every
/// call the gateway makes so state survives across fallback attempts.
pub struct CircuitBreakerRegistry {
    breakers: RwLock<HashMap<String, CircuitBreaker>>,
    default_config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            default_config,
        }
    }

    pub async fn check(&self, model_id: &str) -> Result<(), CircuitOpen> {
        let mut breakers = self.breakers.write().await;
        breakers
            .entry(model_id.to_string())
            .or_insert_with(|| CircuitBreaker::new(self.default_config.clone()))
            .check(model_id)
    }

    pub async fn record_success(&self, model_id: &str) {
        let mut breakers = self.breakers.write().await;
        if let Some(breaker) = breakers.get_mut(model_id) {
            breaker.record_success(model_id);
        }
    }

    pub async fn record_failure(&self, model_id: &str) {
        let mut breakers = self.breakers.write().await;
        breakers
            .entry(model_id.to_string())
            .or_insert_with(|| CircuitBreaker::new(self.default_config.clone()))
            .record_failure(model_id);
    }

    pub async fn state_of(&self, model_id: &str) -> Option<CircuitState> {
        self.breakers.read().await.get(model_id).map(|b| b.state.clone())
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_closed() {
        let mut cb = CircuitBreaker::new(CircuitBreakerConfig::default());
        assert_eq!(cb.state, CircuitState::Closed);
        assert!(cb.check("gpt").is_ok());
    }

    #[test]
    fn trips_after_threshold() {
        let config = CircuitBreakerConfig {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            half_open_max_calls: 1,
        };
        let mut cb = CircuitBreaker::new(config);
        cb.record_failure("m");
        cb.record_failure("m");
        assert_eq!(cb.state, CircuitState::Closed);
        cb.record_failure("m");
        assert!(matches!(cb.state, CircuitState::Open { .. }));
        assert!(cb.check("m").is_err());
    }

    #[test]
    fn recovers_through_half_open() {
        let config = CircuitBreakerConfig {
            failure_threshold: 2,
            recovery_timeout: Duration::from_millis(1),
            half_open_max_calls: 1,
        };
        let mut cb = CircuitBreaker::new(config);
        cb.record_failure("m");
        cb.record_failure("m");
        std::thread::sleep(Duration::from_millis(5));
        assert!(cb.check("m").is_ok());
        assert_eq!(cb.state, CircuitState::HalfOpen);
        cb.record_success("m");
        assert_eq!(cb.state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn registry_isolates_models() {
        let registry = CircuitBreakerRegistry::default();
        for _ in 0..5 {
            registry.record_failure("flaky-model").await;
        }
        assert!(registry.check("flaky-model").await.is_err());
        assert!(registry.check("stable-model").await.is_ok());
    }
}
