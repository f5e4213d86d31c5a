//! Error taxonomy for the orchestrator.
//!
//! Each subsystem owns a `thiserror` enum; `RuntimeError` aggregates them
//! with `#[from]` so call sites can propagate with a single `?`.

use thiserror::Error;

/// Top-level error type returned by orchestrator operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("model gateway error: {0}")]
    ModelGateway(#[from] ModelGatewayError),

    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("duplicate filter error: {0}")]
    DuplicateFilter(#[from] DuplicateFilterError),

    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors from the Model Gateway (L1): provider failures, fallback
/// exhaustion, circuit breakers, and cost-cap trips.
#[derive(Error, Debug, Clone)]
pub enum ModelGatewayError {
    #[error("provider {provider} returned an error: {message}")]
    ProviderError { provider: String, message: String },

    #[error("provider {provider} call timed out after {elapsed_ms}ms")]
    Timeout { provider: String, elapsed_ms: u64 },

    #[error("circuit breaker open for model {model_id}, retry after {retry_after_secs}s")]
    CircuitOpen {
        model_id: String,
        retry_after_secs: u64,
    },

    #[error("fallback chain exhausted after {attempts} attempts")]
    FallbackExhausted { attempts: usize },

    #[error("max fallback depth {max_depth} exceeded")]
    FallbackDepthExceeded { max_depth: u32 },

    #[error("per-query cost cap of {cap_usd} USD exceeded (spent {spent_usd} USD)")]
    CostCapExceeded { cap_usd: f64, spent_usd: f64 },

    #[error("response failed schema validation: {0}")]
    SchemaValidation(String),

    #[error("no providers configured for tier {tier}")]
    NoProvidersForTier { tier: String },
}

/// Errors from the Hybrid Retriever and Knowledge-Graph Index (L2/L3).
#[derive(Error, Debug, Clone)]
pub enum RetrievalError {
    #[error("vector store error: {0}")]
    VectorStore(String),

    #[error("sparse index error: {0}")]
    SparseIndex(String),

    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    #[error("access denied to collection {collection} at tier {tier}")]
    AccessDenied { collection: String, tier: String },

    #[error("graph node not found: {0}")]
    NodeNotFound(String),

    #[error("federated search partially failed: {failed_collections:?}")]
    PartialFailure { failed_collections: Vec<String> },

    #[error("federated search failed entirely: {0}")]
    TotalFailure(String),
}

/// Errors from the Memory Store (L4): per-user and collective fact stores.
#[derive(Error, Debug, Clone)]
pub enum MemoryError {
    #[error("per-user lock timed out for user {user_id} after {timeout_ms}ms")]
    LockTimeout { user_id: String, timeout_ms: u64 },

    #[error("fact not found: {0}")]
    FactNotFound(String),

    #[error("collective promotion failed: {0}")]
    PromotionFailed(String),

    #[error("persistence error: {0}")]
    Persistence(String),
}

/// Errors from the Duplicate-Suppression Filter (L5).
#[derive(Error, Debug, Clone)]
pub enum DuplicateFilterError {
    #[error("embedding computation failed: {0}")]
    EmbeddingFailed(String),

    #[error("index error: {0}")]
    IndexError(String),
}

/// Errors from the Stream Protocol (T3).
#[derive(Error, Debug, Clone)]
pub enum StreamError {
    #[error("client disconnected")]
    ClientDisconnected,

    #[error("journal write failed: {0}")]
    JournalWriteFailed(String),

    #[error("event out of order: expected sequence {expected}, got {actual}")]
    OutOfOrder { expected: u64, actual: u64 },

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors from the top-level Orchestrator (T2) and reasoning loop (M2).
#[derive(Error, Debug, Clone)]
pub enum OrchestratorError {
    #[error("step budget of {max_steps} exceeded")]
    StepBudgetExceeded { max_steps: u32 },

    #[error("per-query deadline of {deadline_ms}ms exceeded")]
    DeadlineExceeded { deadline_ms: u64 },

    #[error("tool {tool} not found in registry")]
    ToolNotFound { tool: String },

    #[error("tool {tool} invocation failed: {reason}")]
    ToolInvocationFailed { tool: String, reason: String },

    #[error("invalid phase transition from {from} to {to}")]
    InvalidPhaseTransition { from: String, to: String },

    #[error("pipeline phase {phase} failed: {reason}")]
    PipelineFailed { phase: String, reason: String },
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_error_converts_into_runtime_error() {
        let err: RuntimeError = ModelGatewayError::FallbackExhausted { attempts: 3 }.into();
        assert!(matches!(err, RuntimeError::ModelGateway(_)));
        assert!(err.to_string().contains("fallback chain exhausted"));
    }

    #[test]
    fn retrieval_error_converts_into_runtime_error() {
        let err: RuntimeError = RetrievalError::CollectionNotFound("tax".into()).into();
        assert!(matches!(err, RuntimeError::Retrieval(_)));
    }
}
