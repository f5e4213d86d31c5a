//! Request/response DTOs for the HTTP surface (spec.md §6).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::{AccessTier, TokenUsage};

/// Inbound envelope for `POST /query` and `POST /stream`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct QueryRequest {
    pub query: String,
    pub user_id: String,
    pub conversation_id: Option<String>,
    pub session_id: Option<String>,
    #[serde(default = "default_access_tier")]
    pub access_tier: AccessTier,
}

fn default_access_tier() -> AccessTier {
    AccessTier::Public
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SourceRef {
    pub document_id: String,
    pub title: String,
    pub collection: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QueryTimings {
    pub retrieval_ms: u64,
    pub reasoning_ms: u64,
    pub total_ms: u64,
}

/// Response for `POST /query`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub timings: QueryTimings,
    pub token_usage: TokenUsage,
    pub followup_questions: Vec<String>,
}

/// Request body for `POST /ingest/items` — one batch of candidate
/// published items for the duplicate filter to admit or reject.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct IngestItemsRequest {
    pub items: Vec<IngestItem>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct IngestItem {
    pub title: String,
    pub collection: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IngestItemResult {
    pub title: String,
    pub duplicate: bool,
    pub similar_to: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IngestItemsResponse {
    pub results: Vec<IngestItemResult>,
}

/// Response for `GET /health` — one entry per component the orchestrator
/// depends on, plus the aggregated verdict.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub reasons: Vec<String>,
    pub uptime_seconds: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

/// Response for `GET /metrics` — a snapshot, not a Prometheus scrape
/// surface (no metrics export format is mandated by the system boundary).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MetricsResponse {
    pub snapshot: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub error_type: String,
    pub fatal: bool,
}
