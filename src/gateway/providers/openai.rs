//! OpenAI-compatible chat-completions backend.
//!
//! Also covers any self-hosted gateway that speaks the same wire format
//! (vLLM, LiteLLM, Azure OpenAI with a rewritten base URL) since the
//! request/response shape is identical; only the base URL and key differ.

use async_trait::async_trait;

use crate::gateway::conversation::Conversation;
use crate::gateway::inference::{
    FinishReason, InferenceError, InferenceOptions, InferenceProvider, InferenceResponse,
    ResponseFormat, ToolCallRequest,
};
use crate::types::TokenUsage;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    model_id: String,
    model_name: String,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    cost_per_1k_tokens_usd: f64,
}

impl OpenAiProvider {
    /// Reads `OPENAI_API_KEY` and optionally `OPENAI_BASE_URL` from the
    /// environment. Returns `None` if no key is configured so the gateway
    /// can skip this provider rather than fail at call time.
    pub fn from_env(model_name: impl Into<String>, cost_per_1k_tokens_usd: f64) -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok()?;
        let base_url = std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model_name = model_name.into();
        Some(Self {
            model_id: format!("openai:{model_name}"),
            model_name,
            api_key,
            base_url,
            client: reqwest::Client::new(),
            cost_per_1k_tokens_usd,
        })
    }

    fn build_body(&self, conversation: &Conversation, options: &InferenceOptions) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model_name,
            "messages": conversation.to_openai_messages(),
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
        });

        if !options.tools.is_empty() {
            body["tools"] = serde_json::Value::Array(
                options
                    .tools
                    .iter()
                    .map(|t| {
                        serde_json::json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": t.parameters,
                            }
                        })
                    })
                    .collect(),
            );
        }

        if let ResponseFormat::JsonSchema { name, schema } = &options.response_format {
            body["response_format"] = serde_json::json!({
                "type": "json_schema",
                "json_schema": { "name": name, "schema": schema, "strict": true },
            });
        }

        body
    }

    fn parse_response(&self, raw: &serde_json::Value) -> Result<InferenceResponse, InferenceError> {
        let choice = raw
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or_else(|| InferenceError::MalformedResponse {
                provider: self.model_id.clone(),
                message: "missing choices[0]".into(),
            })?;

        let message = choice.get("message").ok_or_else(|| InferenceError::MalformedResponse {
            provider: self.model_id.clone(),
            message: "missing choices[0].message".into(),
        })?;

        let content = message.get("content").and_then(|c| c.as_str()).unwrap_or("").to_string();

        let tool_calls = message
            .get("tool_calls")
            .and_then(|tc| tc.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|tc| {
                        let id = tc.get("id")?.as_str()?.to_string();
                        let function = tc.get("function")?;
                        let name = function.get("name")?.as_str()?.to_string();
                        let arguments_str = function.get("arguments")?.as_str()?;
                        let arguments = serde_json::from_str(arguments_str).unwrap_or(serde_json::Value::Null);
                        Some(ToolCallRequest { id, name, arguments })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let finish_reason = match choice.get("finish_reason").and_then(|f| f.as_str()) {
            Some("tool_calls") => Some(FinishReason::ToolCalls),
            Some("length") => Some(FinishReason::Length),
            Some("content_filter") => Some(FinishReason::ContentFilter),
            Some("stop") => Some(FinishReason::Stop),
            _ => None,
        };

        let usage = raw.get("usage").map(|u| TokenUsage {
            prompt_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
            completion_tokens: u.get("completion_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
            total_tokens: u.get("total_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
        }).unwrap_or_default();

        let estimated_cost_usd = (usage.total_tokens as f64 / 1000.0) * self.cost_per_1k_tokens_usd;

        Ok(InferenceResponse { content, tool_calls, finish_reason, usage, estimated_cost_usd })
    }
}

#[async_trait]
impl InferenceProvider for OpenAiProvider {
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
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
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

    fn provider() -> OpenAiProvider {
        OpenAiProvider {
            model_id: "openai:gpt-4o-mini".into(),
            model_name: "gpt-4o-mini".into(),
            api_key: "test-key".into(),
            base_url: DEFAULT_BASE_URL.into(),
            client: reqwest::Client::new(),
            cost_per_1k_tokens_usd: 0.0005,
        }
    }

    #[test]
    fn builds_tool_schema_into_request_body() {
        let p = provider();
        let mut conv = Conversation::new();
        conv.push(ConversationMessage::user("find the KITAS renewal rules"));
        let options = InferenceOptions {
            tools: vec![crate::gateway::inference::ToolDefinition {
                name: "search_collection".into(),
                description: "search a legal collection".into(),
                parameters: serde_json::json!({"type": "object"}),
            }],
            ..Default::default()
        };
        let body = p.build_body(&conv, &options);
        assert_eq!(body["tools"][0]["function"]["name"], "search_collection");
    }

    #[test]
    fn parses_tool_call_response() {
        let p = provider();
        let raw = serde_json::json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "function": { "name": "search_collection", "arguments": "{\"q\":\"kitas\"}" }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": { "prompt_tokens": 100, "completion_tokens": 20, "total_tokens": 120 }
        });
        let resp = p.parse_response(&raw).unwrap();
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].name, "search_collection");
        assert_eq!(resp.finish_reason, Some(FinishReason::ToolCalls));
        assert!(resp.estimated_cost_usd > 0.0);
    }

    #[tokio::test]
    async fn from_env_returns_none_without_api_key() {
        std::env::remove_var("OPENAI_API_KEY");
        assert!(OpenAiProvider::from_env("gpt-4o-mini", 0.0005).is_none());
    }
}
