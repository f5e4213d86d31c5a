//! M1: Tool Registry — typed capability descriptors the reasoning loop
//! can dispatch against, each paired with a JSON-schema argument contract
//! the model's tool calls are validated against before invocation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use jsonschema::JSONSchema;

use crate::gateway::ToolDefinition;
use crate::types::OrchestratorError;

mod graph_lookup;

pub use graph_lookup::GraphLookupTool;

/// One invocable capability: retrieval, knowledge-graph lookup, or memory
/// recall are the built-ins; additional tools register the same way.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> serde_json::Value;
    async fn invoke(&self, arguments: serde_json::Value) -> Result<serde_json::Value, OrchestratorError>;
}

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Definitions in the shape the model gateway hands to a provider's
    /// tool-calling API.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }

    /// Validates `arguments` against the named tool's schema before the
    /// loop dispatches it, so a malformed tool call from the model fails
    /// fast with a clear message instead of inside the tool body.
    pub fn validate(&self, name: &str, arguments: &serde_json::Value) -> Result<(), OrchestratorError> {
        let tool = self.get(name).ok_or_else(|| OrchestratorError::ToolNotFound { tool: name.to_string() })?;
        let schema = tool.parameters_schema();
        let compiled = JSONSchema::compile(&schema).map_err(|e| OrchestratorError::ToolInvocationFailed {
            tool: name.to_string(),
            reason: format!("invalid schema: {e}"),
        })?;

        if let Err(errors) = compiled.validate(arguments) {
            let messages: Vec<String> = errors.map(|e| e.to_string()).collect();
            return Err(OrchestratorError::ToolInvocationFailed { tool: name.to_string(), reason: messages.join("; ") });
        }
        Ok(())
    }

    pub async fn invoke(&self, name: &str, arguments: serde_json::Value) -> Result<serde_json::Value, OrchestratorError> {
        self.validate(name, &arguments)?;
        let tool = self.get(name).ok_or_else(|| OrchestratorError::ToolNotFound { tool: name.to_string() })?;
        tool.invoke(arguments).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"],
            })
        }
        async fn invoke(&self, arguments: serde_json::Value) -> Result<serde_json::Value, OrchestratorError> {
            Ok(arguments)
        }
    }

    #[tokio::test]
    async fn rejects_arguments_missing_required_field() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let err = registry.invoke("echo", serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::ToolInvocationFailed { .. }));
    }

    #[tokio::test]
    async fn invokes_tool_with_valid_arguments() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let result = registry.invoke("echo", serde_json::json!({"text": "hi"})).await.unwrap();
        assert_eq!(result["text"], "hi");
    }

    #[test]
    fn unknown_tool_is_reported() {
        let registry = ToolRegistry::new();
        let err = registry.validate("missing", &serde_json::json!({})).unwrap_err();
        assert!(matches!(err, OrchestratorError::ToolNotFound { .. }));
    }
}
