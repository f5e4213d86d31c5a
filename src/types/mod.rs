//! Core data model shared across the orchestrator.

mod document;
mod envelope;
mod error;
mod graph;
mod ids;
mod stream;

pub use document::{Collection, CollectiveFact, Document, Fact, KnownCorrection, PublishedItem};
pub use envelope::{AccessTier, AgentState, Observation, QueryEnvelope, StepRecord, ToolCall};
pub use error::{
    DuplicateFilterError, MemoryError, ModelGatewayError, OrchestratorError, RetrievalError,
    RuntimeError, StreamError,
};
pub use graph::{KGEdge, KGNode, KGNodeId};
pub use ids::{CollectionId, DocumentId, FactId, RequestId, UserId};
pub use stream::{CircuitBreakerState, StreamEvent, TokenUsage};
