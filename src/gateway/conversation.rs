//! Multi-turn conversation buffer passed to inference providers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ConversationMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: MessageRole::System, content: content.into(), tool_calls: Vec::new(), tool_call_id: None, tool_name: None }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: content.into(), tool_calls: Vec::new(), tool_call_id: None, tool_name: None }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: MessageRole::Assistant, content: content.into(), tool_calls: Vec::new(), tool_call_id: None, tool_name: None }
    }

    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self { role: MessageRole::Assistant, content: String::new(), tool_calls, tool_call_id: None, tool_name: None }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
            tool_name: Some(tool_name.into()),
        }
    }
}

/// Ordered sequence of messages exchanged with the model. Carries helpers
/// to serialize into either OpenAI-compatible or Anthropic Messages API
/// wire shapes, since the two providers disagree on where the system
/// prompt and tool results go.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    pub messages: Vec<ConversationMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system(system: impl Into<String>) -> Self {
        let mut c = Self::new();
        c.push(ConversationMessage::system(system));
        c
    }

    pub fn push(&mut self, message: ConversationMessage) -> &mut Self {
        self.messages.push(message);
        self
    }

    pub fn to_openai_messages(&self) -> Vec<serde_json::Value> {
        self.messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    MessageRole::System => "system",
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                    MessageRole::Tool => "tool",
                };
                let mut v = serde_json::json!({ "role": role, "content": m.content });
                if !m.tool_calls.is_empty() {
                    v["tool_calls"] = serde_json::Value::Array(
                        m.tool_calls
                            .iter()
                            .map(|tc| {
                                serde_json::json!({
                                    "id": tc.id,
                                    "type": "function",
                                    "function": { "name": tc.name, "arguments": tc.arguments },
                                })
                            })
                            .collect(),
                    );
                }
                if let Some(id) = &m.tool_call_id {
                    v["tool_call_id"] = serde_json::Value::String(id.clone());
                }
                v
            })
            .collect()
    }

    /// Anthropic pulls the system prompt out of the message list entirely.
    pub fn to_anthropic_messages(&self) -> (Option<String>, Vec<serde_json::Value>) {
        let mut system = None;
        let mut messages = Vec::new();
        for m in &self.messages {
            match m.role {
                MessageRole::System => system = Some(m.content.clone()),
                MessageRole::User => messages.push(serde_json::json!({ "role": "user", "content": m.content })),
                MessageRole::Assistant => {
                    if m.tool_calls.is_empty() {
                        messages.push(serde_json::json!({ "role": "assistant", "content": m.content }));
                    } else {
                        let mut blocks = Vec::new();
                        if !m.content.is_empty() {
                            blocks.push(serde_json::json!({ "type": "text", "text": m.content }));
                        }
                        for tc in &m.tool_calls {
                            let input: serde_json::Value =
                                serde_json::from_str(&tc.arguments).unwrap_or(serde_json::Value::Null);
                            blocks.push(serde_json::json!({
                                "type": "tool_use", "id": tc.id, "name": tc.name, "input": input,
                            }));
                        }
                        messages.push(serde_json::json!({ "role": "assistant", "content": blocks }));
                    }
                }
                MessageRole::Tool => {
                    messages.push(serde_json::json!({
                        "role": "user",
                        "content": [{
                            "type": "tool_result",
                            "tool_use_id": m.tool_call_id.clone().unwrap_or_default(),
                            "content": m.content,
                        }],
                    }));
                }
            }
        }
        (system, messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_round_trip_preserves_tool_calls() {
        let mut conv = Conversation::with_system("sys");
        conv.push(ConversationMessage::user("hello"));
        conv.push(ConversationMessage::assistant_tool_calls(vec![ToolCall {
            id: "tc1".into(),
            name: "search_collection".into(),
            arguments: r#"{"q":"kitas renewal"}"#.into(),
        }]));
        conv.push(ConversationMessage::tool_result("tc1", "search_collection", "result"));

        let msgs = conv.to_openai_messages();
        assert_eq!(msgs.len(), 4);
        assert_eq!(msgs[0]["role"], "system");
        assert_eq!(msgs[2]["tool_calls"][0]["function"]["name"], "search_collection");
        assert_eq!(msgs[3]["tool_call_id"], "tc1");
    }

    #[test]
    fn anthropic_pulls_system_out_of_messages() {
        let mut conv = Conversation::with_system("sys");
        conv.push(ConversationMessage::user("hello"));
        let (system, messages) = conv.to_anthropic_messages();
        assert_eq!(system.as_deref(), Some("sys"));
        assert_eq!(messages.len(), 1);
    }
}
