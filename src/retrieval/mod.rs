//! L2 (hybrid retrieval) and L3 (knowledge-graph index).

pub mod embedding;
pub mod federated;
pub mod fusion;
pub mod graph_index;
pub mod sparse_index;
pub mod vector_store;

pub use embedding::{EmbeddingConfig, EmbeddingProvider, EmbeddingService, MockEmbeddingService};
pub use federated::HybridRetriever;
pub use fusion::reciprocal_rank_fusion;
pub use graph_index::KnowledgeGraphIndex;
pub use sparse_index::{BM25Index, SparseIndex};
pub use vector_store::{InMemoryVectorStore, ScoredDocument, VectorStore};
