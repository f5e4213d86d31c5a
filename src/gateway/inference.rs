//! Provider-agnostic inference contract (L1).
//!
//! Every model backend the gateway can fall across — OpenAI-compatible,
//! Anthropic Messages API, or a future local backend — implements
//! [`InferenceProvider`]. The gateway only ever talks to this trait; it
//! never branches on which concrete backend answered.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use super::conversation::Conversation;
use crate::types::TokenUsage;

/// A tool the model may call, described in JSON-schema terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A tool invocation the model asked the caller to perform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    ContentFilter,
}

/// Requested shape of the completion: free text, or a value constrained
/// to a JSON schema (used by the Synthesizer phase for structured answers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponseFormat {
    Text,
    JsonSchema { name: String, schema: serde_json::Value },
}

impl Default for ResponseFormat {
    fn default() -> Self {
        ResponseFormat::Text
    }
}

#[derive(Debug, Clone)]
pub struct InferenceOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    pub tools: Vec<ToolDefinition>,
    pub response_format: ResponseFormat,
    pub timeout: Duration,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 2048,
            tools: Vec::new(),
            response_format: ResponseFormat::Text,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InferenceResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub finish_reason: Option<FinishReason>,
    pub usage: TokenUsage,
    /// Cost estimate in USD, used by the gateway's cost-cap guard.
    pub estimated_cost_usd: f64,
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("provider {provider} request failed: {message}")]
    Request { provider: String, message: String },
    #[error("provider {provider} returned an unparseable response: {message}")]
    MalformedResponse { provider: String, message: String },
    #[error("provider {provider} timed out after {elapsed_ms}ms")]
    Timeout { provider: String, elapsed_ms: u64 },
    #[error("provider {provider} is not configured: {reason}")]
    NotConfigured { provider: String, reason: String },
    #[error("provider {provider} rejected the request: {status} {message}")]
    Rejected { provider: String, status: u16, message: String },
}

/// A single model backend. Implementations own their own HTTP client and
/// credential lookup; the gateway only calls [`complete`](InferenceProvider::complete)
/// and reads [`model_id`](InferenceProvider::model_id) for circuit-breaker keying.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Stable identifier used to key circuit-breaker state and logs, e.g.
    /// `"openai:gpt-4o-mini"` or `"anthropic:claude-3-5-sonnet"`.
    fn model_id(&self) -> &str;

    /// Rough per-1k-token price used for the gateway's cost-cap guard.
    fn cost_per_1k_tokens_usd(&self) -> f64;

    async fn complete(
        &self,
        conversation: &Conversation,
        options: &InferenceOptions,
    ) -> Result<InferenceResponse, InferenceError>;
}
