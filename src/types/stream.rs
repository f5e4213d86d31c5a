//! Stream Event tagged union (T3) and associated accounting types.
//!
//! Mirrors the `#[serde(tag = "type")]` envelope style used for the
//! coordinator's WebSocket protocol, adapted into the orchestrator's
//! server-sent-events framing: one `StreamEvent` per SSE `data:` line.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::RequestId;

/// Token accounting for a single model call or an accumulated total.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "http-api", derive(utoipa::ToSchema))]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Circuit breaker state machine shared by every model/tool the gateway
/// protects. `Open` carries the timestamp it opened at so callers can
/// compute cooldown elapsed without a separate timer task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CircuitBreakerState {
    Closed,
    Open { opened_at: DateTime<Utc> },
    HalfOpen,
}

impl Default for CircuitBreakerState {
    fn default() -> Self {
        CircuitBreakerState::Closed
    }
}

/// One increment of progress streamed to the client over SSE.
///
/// Ordering invariant: for a given `request_id`, `status` precedes any
/// `thinking`/`tool_call`/`observation`/`token` events, and exactly one
/// terminal event (`done` or `error`) is emitted last.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Coarse-grained progress marker (e.g. "retrieving", "reasoning").
    Status { request_id: RequestId, stage: String },
    /// A reasoning-loop "thought" surfaced for transparency.
    Thinking { request_id: RequestId, content: String },
    /// A tool dispatch has started.
    ToolCall {
        request_id: RequestId,
        call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },
    /// A tool dispatch has completed.
    Observation {
        request_id: RequestId,
        call_id: String,
        success: bool,
        summary: String,
    },
    /// The Calibrator phase issued a correction to the Reasoner's draft.
    Correction {
        request_id: RequestId,
        dimension: String,
        detail: String,
    },
    /// A chunk of the final synthesized answer.
    Token { request_id: RequestId, content: String },
    /// Out-of-band bookkeeping (token usage, retrieval stats, etc.).
    Metadata {
        request_id: RequestId,
        key: String,
        value: serde_json::Value,
    },
    /// Terminal: an unrecoverable error ended the stream.
    Error {
        request_id: RequestId,
        code: String,
        message: String,
    },
    /// Terminal: the response completed successfully.
    Done {
        request_id: RequestId,
        usage: TokenUsage,
    },
}

impl StreamEvent {
    pub fn request_id(&self) -> RequestId {
        match self {
            StreamEvent::Status { request_id, .. }
            | StreamEvent::Thinking { request_id, .. }
            | StreamEvent::ToolCall { request_id, .. }
            | StreamEvent::Observation { request_id, .. }
            | StreamEvent::Correction { request_id, .. }
            | StreamEvent::Token { request_id, .. }
            | StreamEvent::Metadata { request_id, .. }
            | StreamEvent::Error { request_id, .. }
            | StreamEvent::Done { request_id, .. } => *request_id,
        }
    }

    /// Terminal events end the stream; no further events may follow.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Error { .. } | StreamEvent::Done { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_and_error_are_terminal() {
        let rid = RequestId::new();
        assert!(StreamEvent::Done { request_id: rid, usage: TokenUsage::default() }.is_terminal());
        assert!(StreamEvent::Error { request_id: rid, code: "x".into(), message: "y".into() }
            .is_terminal());
        assert!(!StreamEvent::Status { request_id: rid, stage: "retrieving".into() }.is_terminal());
    }

    #[test]
    fn token_usage_accumulates() {
        let mut total = TokenUsage::default();
        total += TokenUsage { prompt_tokens: 10, completion_tokens: 5, total_tokens: 15 };
        total += TokenUsage { prompt_tokens: 3, completion_tokens: 2, total_tokens: 5 };
        assert_eq!(total.total_tokens, 20);
    }
}
