//! Anthropic Messages API backend.

use async_trait::async_trait;

use crate::gateway::conversation::Conversation;
use crate::gateway::inference::{
    FinishReason, InferenceError, InferenceOptions, InferenceProvider, InferenceResponse,
    ResponseFormat, ToolCallRequest,
};
use crate::types::TokenUsage;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    model_id: String,
    model_name: String,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    cost_per_1k_tokens_usd: f64,
}

impl AnthropicProvider {
    pub fn from_env(model_name: impl Into<String>, cost_per_1k_tokens_usd: f64) -> Option<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").ok()?;
        let base_url = std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model_name = model_name.into();
        Some(Self {
            model_id: format!("anthropic:{model_name}"),
            model_name,
            api_key,
            base_url,
            client: reqwest::Client::new(),
            cost_per_1k_tokens_usd,
        })
    }

    fn build_body(&self, conversation: &Conversation, options: &InferenceOptions) -> serde_json::Value {
        let (system, messages) = conversation.to_anthropic_messages();

        let mut body = serde_json::json!({
            "model": self.model_name,
            "messages": messages,
            "max_tokens": options.max_tokens,
            "temperature": options.temperature,
        });

        if let Some(system) = system {
            body["system"] = serde_json::Value::String(system);
        }

        if !options.tools.is_empty() {
            body["tools"] = serde_json::Value::Array(
                options
                    .tools
                    .iter()
                    .map(|t| {
                        serde_json::json!({
                            "name": t.name,
                            "description": t.description,
                            "input_schema": t.parameters,
                        })
                    })
                    .collect(),
            );
        }

        // Anthropic enforces structured output via a forced tool call rather
        // than a response_format field; the Synthesizer phase relies on this
        // when it needs a schema-constrained answer from a Claude model.
        if let ResponseFormat::JsonSchema { name, schema } = &options.response_format {
            let mut tools = body["tools"].as_array().cloned().unwrap_or_default();
            tools.push(serde_json::json!({
                "name": name,
                "description": "Return the final answer matching this schema.",
                "input_schema": schema,
            }));
            body["tools"] = serde_json::Value::Array(tools);
            body["tool_choice"] = serde_json::json!({ "type": "tool", "name": name });
        }

        body
    }

    fn parse_response(&self, raw: &serde_json::Value) -> Result<InferenceResponse, InferenceError> {
        let content_blocks = raw.get("content").and_then(|c| c.as_array()).ok_or_else(|| {
            InferenceError::MalformedResponse { provider: self.model_id.clone(), message: "missing content[]".into() }
        })?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for block in content_blocks {
            match block.get("type").and_then(|t| t.as_str()) {
                Some("text") => {
                    if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                        content.push_str(text);
                    }
                }
                Some("tool_use") => {
                    let id = block.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                    let name = block.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                    let arguments = block.get("input").cloned().unwrap_or(serde_json::Value::Null);
                    tool_calls.push(ToolCallRequest { id, name, arguments });
                }
                _ => {}
            }
        }

        let finish_reason = match raw.get("stop_reason").and_then(|s| s.as_str()) {
            Some("tool_use") => Some(FinishReason::ToolCalls),
            Some("max_tokens") => Some(FinishReason::Length),
            Some("end_turn") | Some("stop_sequence") => Some(FinishReason::Stop),
            _ => None,
        };

        let usage = raw.get("usage").map(|u| {
            let prompt_tokens = u.get("input_tokens").and_then(|v| v.as_u64()).unwrap_or(0);
            let completion_tokens = u.get("output_tokens").and_then(|v| v.as_u64()).unwrap_or(0);
            TokenUsage { prompt_tokens, completion_tokens, total_tokens: prompt_tokens + completion_tokens }
        }).unwrap_or_default();

        let estimated_cost_usd = (usage.total_tokens as f64 / 1000.0) * self.cost_per_1k_tokens_usd;

        Ok(InferenceResponse { content, tool_calls, finish_reason, usage, estimated_cost_usd })
    }
}

#[async_trait]
impl InferenceProvider for AnthropicProvider {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn cost_per_1k_tokens_usd(&self) -> f64 {
        self.cost_per_1k_tokens_usd
    }

    async fn complete(
        &self,
        conversation: &Conversation,
        options: &InferenceOptions,
    ) -> Result<InferenceResponse, InferenceError> {
        let body = self.build_body(conversation, options);
        let url = format!("{}/messages", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .timeout(options.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InferenceError::Timeout { provider: self.model_id.clone(), elapsed_ms: options.timeout.as_millis() as u64 }
                } else {
                    InferenceError::Request { provider: self.model_id.clone(), message: e.to_string() }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(InferenceError::Rejected { provider: self.model_id.clone(), status: status.as_u16(), message });
        }

        let raw: serde_json::Value = response.json().await.map_err(|e| InferenceError::MalformedResponse {
            provider: self.model_id.clone(),
            message: e.to_string(),
        })?;

        self.parse_response(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::conversation::ConversationMessage;

    fn provider() -> AnthropicProvider {
        AnthropicProvider {
            model_id: "anthropic:claude-3-5-sonnet".into(),
            model_name: "claude-3-5-sonnet-20241022".into(),
            api_key: "test-key".into(),
            base_url: DEFAULT_BASE_URL.into(),
            client: reqwest::Client::new(),
            cost_per_1k_tokens_usd: 0.003,
        }
    }

    #[test]
    fn pulls_system_prompt_out_of_message_list() {
        let p = provider();
        let mut conv = Conversation::with_system("You are a legal research assistant.");
        conv.push(ConversationMessage::user("hello"));
        let body = p.build_body(&conv, &InferenceOptions::default());
        assert_eq!(body["system"], "You are a legal research assistant.");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn parses_tool_use_block() {
        let p = provider();
        let raw = serde_json::json!({
            "content": [{ "type": "tool_use", "id": "toolu_1", "name": "search_collection", "input": {"q": "pajak"} }],
            "stop_reason": "tool_use",
            "usage": { "input_tokens": 50, "output_tokens": 10 }
        });
        let resp = p.parse_response(&raw).unwrap();
        assert_eq!(resp.tool_calls[0].name, "search_collection");
        assert_eq!(resp.usage.total_tokens, 60);
        assert_eq!(resp.finish_reason, Some(FinishReason::ToolCalls));
    }
}
