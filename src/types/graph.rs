//! Knowledge-graph node/edge model (L3).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ids::CollectionId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KGNodeId(pub String);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KGNode {
    pub id: KGNodeId,
    pub label: String,
    pub node_type: String,
    pub collection: CollectionId,
    pub properties: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KGEdge {
    pub from: KGNodeId,
    pub to: KGNodeId,
    pub relation: String,
}
