//! Built-in tool: bounded knowledge-graph traversal, so the reasoning
//! loop can chase a relational question ("what does this KITAS category
//! upgrade to?") without the orchestrator baking graph access into the
//! prompt itself.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::retrieval::KnowledgeGraphIndex;
use crate::tools::Tool;
use crate::types::{CollectionId, KGNodeId, OrchestratorError};

pub struct GraphLookupTool {
    graph: Arc<KnowledgeGraphIndex>,
}

impl GraphLookupTool {
    pub fn new(graph: Arc<KnowledgeGraphIndex>) -> Self {
        Self { graph }
    }
}

#[derive(Deserialize)]
struct GraphLookupArgs {
    node_id: String,
    collection: String,
    #[serde(default = "default_depth")]
    max_depth: u32,
}

fn default_depth() -> u32 {
    1
}

#[async_trait]
impl Tool for GraphLookupTool {
    fn name(&self) -> &str {
        "graph_lookup"
    }

    fn description(&self) -> &str {
        "Traverses the knowledge graph from a node id, bounded by max_depth, \
         returning neighboring nodes within the same collection."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "node_id": { "type": "string" },
                "collection": { "type": "string" },
                "max_depth": { "type": "integer", "minimum": 1, "maximum": 5 }
            },
            "required": ["node_id", "collection"]
        })
    }

    async fn invoke(&self, arguments: serde_json::Value) -> Result<serde_json::Value, OrchestratorError> {
        let args: GraphLookupArgs = serde_json::from_value(arguments)
            .map_err(|e| OrchestratorError::ToolInvocationFailed { tool: self.name().into(), reason: e.to_string() })?;

        let neighbors = self
            .graph
            .neighbors(&KGNodeId(args.node_id), &CollectionId(args.collection), args.max_depth)
            .await;

        Ok(json!({ "neighbors": neighbors }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn looks_up_neighbors_within_depth() {
        let graph = Arc::new(KnowledgeGraphIndex::new());
        graph
            .upsert_node(crate::types::KGNode {
                id: KGNodeId("kitas".into()),
                label: "KITAS".into(),
                node_type: "visa_type".into(),
                collection: CollectionId("immigration".into()),
                properties: HashMap::new(),
            })
            .await;
        graph
            .upsert_node(crate::types::KGNode {
                id: KGNodeId("kitap".into()),
                label: "KITAP".into(),
                node_type: "visa_type".into(),
                collection: CollectionId("immigration".into()),
                properties: HashMap::new(),
            })
            .await;
        graph
            .add_edge(crate::types::KGEdge { from: KGNodeId("kitas".into()), to: KGNodeId("kitap".into()), relation: "upgrades_to".into() })
            .await;

        let tool = GraphLookupTool::new(graph);
        let result = tool
            .invoke(json!({ "node_id": "kitas", "collection": "immigration", "max_depth": 1 }))
            .await
            .unwrap();
        assert_eq!(result["neighbors"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejects_malformed_arguments() {
        let graph = Arc::new(KnowledgeGraphIndex::new());
        let tool = GraphLookupTool::new(graph);
        let err = tool.invoke(json!({ "collection": "immigration" })).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::ToolInvocationFailed { .. }));
    }
}
