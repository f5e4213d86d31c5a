//! Query envelope and agent reasoning state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::ids::{RequestId, UserId};
use super::stream::TokenUsage;

/// The inbound unit of work: one natural-language query plus the context
/// needed to route, retrieve, and answer it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryEnvelope {
    pub request_id: RequestId,
    pub user_id: UserId,
    pub query: String,
    pub conversation_history: Vec<ConversationTurn>,
    pub access_tier: AccessTier,
    pub submitted_at: DateTime<Utc>,
}

impl QueryEnvelope {
    pub fn new(user_id: UserId, query: impl Into<String>, access_tier: AccessTier) -> Self {
        Self {
            request_id: RequestId::new(),
            user_id,
            query: query.into(),
            conversation_history: Vec::new(),
            access_tier,
            submitted_at: Utc::now(),
        }
    }
}

/// A single turn of prior conversation, carried so the reasoner has
/// multi-turn context without re-fetching it from the memory store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnRole {
    User,
    Assistant,
}

/// The access tier a query is authorized to read at. Used as a hard
/// pre-filter in the federated retriever — never a post-filter, so a
/// collection the tier cannot see is never even searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "http-api", derive(utoipa::ToSchema))]
pub enum AccessTier {
    Public,
    Registered,
    Professional,
}

/// Mutable state threaded through one reasoning-loop run: the accumulated
/// conversation, token spend, step count, the classified intent tag that
/// governs step budget and early-exit eligibility, cumulative model cost,
/// whether the loop has taken the early-exit path, and the phase label
/// used for observability.
#[derive(Debug, Clone)]
pub struct AgentState {
    pub request_id: RequestId,
    pub step: u32,
    pub total_usage: TokenUsage,
    pub history: Vec<StepRecord>,
    pub current_phase: String,
    pub started_at: Instant,
    pub intent: String,
    pub cumulative_cost_usd: f64,
    pub early_exit: bool,
}

impl AgentState {
    pub fn new(request_id: RequestId, intent: impl Into<String>) -> Self {
        Self {
            request_id,
            step: 0,
            total_usage: TokenUsage::default(),
            history: Vec::new(),
            current_phase: "think".to_string(),
            started_at: Instant::now(),
            intent: intent.into(),
            cumulative_cost_usd: 0.0,
            early_exit: false,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// One THINK/ACT/OBSERVE cycle recorded for the transcript and for replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: u32,
    pub thought: String,
    pub action: Option<ToolCall>,
    pub observation: Option<Observation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

/// The result of dispatching a tool call back into the loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub tool_name: String,
    pub success: bool,
    pub content: String,
    pub duration: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_tier_ordering_is_increasing() {
        assert!(AccessTier::Public < AccessTier::Registered);
        assert!(AccessTier::Registered < AccessTier::Professional);
    }

    #[test]
    fn agent_state_starts_at_step_zero() {
        let state = AgentState::new(RequestId::new(), "general");
        assert_eq!(state.step, 0);
        assert!(state.history.is_empty());
        assert_eq!(state.intent, "general");
        assert!(!state.early_exit);
    }
}
