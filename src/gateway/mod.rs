//! L1: Model Gateway.
//!
//! Routes every inference call through an ordered fallback chain of
//! providers, each guarded by: a per-model circuit breaker, a per-call
//! deadline, a session cost cap, and a fallback-depth limit so a query
//! can never cascade through every configured backend forever.

pub mod circuit_breaker;
pub mod conversation;
pub mod inference;
pub mod providers;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

pub use circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};
pub use conversation::{Conversation, ConversationMessage};
pub use inference::{
    FinishReason, InferenceError, InferenceOptions, InferenceProvider, InferenceResponse,
    ResponseFormat, ToolCallRequest, ToolDefinition,
};

use crate::metrics::MetricsRegistry;
use crate::types::{ModelGatewayError, TokenUsage};

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Maximum number of providers tried for a single logical call before
    /// giving up, regardless of how many are configured in the chain.
    pub max_fallback_depth: u32,
    /// Hard per-call wall-clock budget, applied on top of each provider's
    /// own `InferenceOptions::timeout`.
    pub call_deadline: Duration,
    /// Cumulative USD spend allowed for one orchestrator session before
    /// the gateway refuses further calls.
    pub session_cost_cap_usd: f64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_fallback_depth: 3,
            call_deadline: Duration::from_secs(30),
            session_cost_cap_usd: 2.0,
        }
    }
}

/// Tracks cumulative spend for one orchestrator session (one user query's
/// full reasoning loop). Cheap to share via `Arc` across the components
/// the loop spins up.
#[derive(Debug, Default)]
pub struct SessionBudget {
    spent_micros_usd: AtomicU64,
}

impl SessionBudget {
    pub fn spent_usd(&self) -> f64 {
        self.spent_micros_usd.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }

    fn record(&self, usd: f64) {
        let micros = (usd * 1_000_000.0).round() as u64;
        self.spent_micros_usd.fetch_add(micros, Ordering::Relaxed);
    }
}

/// Routes inference calls across an ordered list of providers.
///
/// The order is the fallback order: the first provider is tried first,
/// and the gateway only moves to the next one when the current provider's
/// circuit is open or the call itself fails.
pub struct ModelGateway {
    providers: Vec<Arc<dyn InferenceProvider>>,
    circuit_breakers: Arc<CircuitBreakerRegistry>,
    config: GatewayConfig,
    metrics: Arc<MetricsRegistry>,
}

impl ModelGateway {
    pub fn new(providers: Vec<Arc<dyn InferenceProvider>>, config: GatewayConfig) -> Self {
        Self {
            providers,
            circuit_breakers: Arc::new(CircuitBreakerRegistry::default()),
            config,
            metrics: MetricsRegistry::new(),
        }
    }

    /// Shares an existing registry (e.g. the orchestrator's process-wide
    /// one) instead of the gateway's own private counters.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Overrides the per-model circuit breaker defaults (failure
    /// threshold, recovery timeout) used for every provider in the chain.
    pub fn with_circuit_breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breakers = Arc::new(CircuitBreakerRegistry::new(config));
        self
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Runs one completion call through the fallback chain, respecting the
    /// session's cost cap. Each attempt beyond the configured max fallback
    /// depth is refused before any network call is made.
    pub async fn complete(
        &self,
        conversation: &Conversation,
        options: &InferenceOptions,
        budget: &SessionBudget,
    ) -> Result<InferenceResponse, ModelGatewayError> {
        if self.providers.is_empty() {
            return Err(ModelGatewayError::NoProvidersForTier { tier: "any".into() });
        }

        let mut attempts = 0u32;
        let mut last_error: Option<String> = None;

        for provider in &self.providers {
            if attempts >= self.config.max_fallback_depth {
                return Err(ModelGatewayError::FallbackDepthExceeded { max_depth: self.config.max_fallback_depth });
            }

            if budget.spent_usd() >= self.config.session_cost_cap_usd {
                self.metrics.record_cost_cap_rejection();
                return Err(ModelGatewayError::CostCapExceeded {
                    cap_usd: self.config.session_cost_cap_usd,
                    spent_usd: budget.spent_usd(),
                });
            }

            let model_id = provider.model_id().to_string();

            if let Err(open) = self.circuit_breakers.check(&model_id).await {
                last_error = Some(format!("{model_id} circuit open, retry in {:?}", open.recovery_remaining));
                self.metrics.record_gateway_fallback();
                continue;
            }

            attempts += 1;

            let result = tokio::time::timeout(self.config.call_deadline, provider.complete(conversation, options)).await;

            match result {
                Ok(Ok(response)) => {
                    self.circuit_breakers.record_success(&model_id).await;
                    budget.record(response.estimated_cost_usd);
                    self.metrics.record_gateway_call(true, response.estimated_cost_usd);
                    return Ok(response);
                }
                Ok(Err(err)) => {
                    self.circuit_breakers.record_failure(&model_id).await;
                    self.metrics.record_gateway_call(false, 0.0);
                    if let Some(CircuitState::Open { .. }) = self.circuit_breakers.state_of(&model_id).await {
                        self.metrics.record_circuit_trip();
                    }
                    tracing::warn!(model_id, error = %err, "inference provider call failed");
                    last_error = Some(err.to_string());
                }
                Err(_) => {
                    self.circuit_breakers.record_failure(&model_id).await;
                    self.metrics.record_gateway_call(false, 0.0);
                    return Err(ModelGatewayError::Timeout {
                        provider: model_id,
                        elapsed_ms: self.config.call_deadline.as_millis() as u64,
                    });
                }
            }
        }

        tracing::warn!(attempts, last_error = ?last_error, "model gateway fallback chain exhausted");
        Err(ModelGatewayError::FallbackExhausted { attempts: attempts as usize })
    }

    pub async fn circuit_state(&self, model_id: &str) -> Option<CircuitState> {
        self.circuit_breakers.state_of(model_id).await
    }
}

/// Serializes a full multi-turn reasoning session's access to a single
/// conversation buffer, used when several tool calls must append to the
/// same transcript without interleaving.
pub type SharedConversation = Arc<Mutex<Conversation>>;

pub fn total_usage(responses: &[InferenceResponse]) -> TokenUsage {
    let mut total = TokenUsage::default();
    for r in responses {
        total += r.usage;
    }
    total
}
