//! L3: Knowledge-Graph Index.
//!
//! A small in-memory labeled-property graph used to answer relational
//! questions ("what visa types lead to this KITAS category?") that pure
//! similarity search handles poorly. Traversal is bounded: a caller
//! always supplies a max depth, since the graph has no natural locality
//! guarantee that would otherwise keep a BFS cheap.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::types::{CollectionId, KGEdge, KGNode, KGNodeId};

#[derive(Default)]
pub struct KnowledgeGraphIndex {
    nodes: tokio::sync::RwLock<HashMap<KGNodeId, KGNode>>,
    edges: tokio::sync::RwLock<Vec<KGEdge>>,
}

impl KnowledgeGraphIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert_node(&self, node: KGNode) {
        self.nodes.write().await.insert(node.id.clone(), node);
    }

    pub async fn add_edge(&self, edge: KGEdge) {
        self.edges.write().await.push(edge);
    }

    /// Bounded breadth-first traversal from `start`, following edges in
    /// either direction, restricted to nodes in `collection` and never
    /// exploring past `max_depth` hops.
    pub async fn neighbors(&self, start: &KGNodeId, collection: &CollectionId, max_depth: u32) -> Vec<KGNode> {
        let nodes = self.nodes.read().await;
        let edges = self.edges.read().await;

        if !nodes.contains_key(start) {
            return Vec::new();
        }

        let mut visited = HashSet::new();
        visited.insert(start.clone());
        let mut frontier = VecDeque::new();
        frontier.push_back((start.clone(), 0u32));
        let mut result = Vec::new();

        while let Some((current, depth)) = frontier.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for edge in edges.iter().filter(|e| e.from == current || e.to == current) {
                let next = if edge.from == current { &edge.to } else { &edge.from };
                if visited.contains(next) {
                    continue;
                }
                if let Some(node) = nodes.get(next) {
                    if &node.collection == collection {
                        visited.insert(next.clone());
                        result.push(node.clone());
                        frontier.push_back((next.clone(), depth + 1));
                    }
                }
            }
        }

        result
    }

    pub async fn node(&self, id: &KGNodeId) -> Option<KGNode> {
        self.nodes.read().await.get(id).cloned()
    }
}
