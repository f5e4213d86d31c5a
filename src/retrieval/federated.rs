//! L2: Hybrid Retriever — fans a query out across every collection the
//! caller's access tier can see, running dense and sparse search in
//! parallel per collection, then fuses within a collection and again
//! across collections.

use std::sync::Arc;

use futures::future::join_all;

use crate::types::{AccessTier, CollectionId, RetrievalError};

use super::embedding::EmbeddingService;
use super::fusion::reciprocal_rank_fusion;
use super::sparse_index::SparseIndex;
use super::vector_store::{ScoredDocument, VectorStore};

pub struct HybridRetriever {
    vector_store: Arc<dyn VectorStore>,
    sparse_index: Arc<dyn SparseIndex>,
    embedding_service: Arc<dyn EmbeddingService>,
    collections: Vec<CollectionId>,
}

impl HybridRetriever {
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        sparse_index: Arc<dyn SparseIndex>,
        embedding_service: Arc<dyn EmbeddingService>,
        collections: Vec<CollectionId>,
    ) -> Self {
        Self { vector_store, sparse_index, embedding_service, collections }
    }

    /// Searches every collection the given tier is allowed to read,
    /// fusing dense and sparse hits per collection and then fusing across
    /// collections. A per-collection failure degrades that collection to
    /// an empty result rather than failing the whole query, unless every
    /// collection fails, in which case the whole call fails.
    pub async fn search(
        &self,
        query: &str,
        access_tier: AccessTier,
        per_collection_limit: usize,
        total_limit: usize,
    ) -> Result<Vec<ScoredDocument>, RetrievalError> {
        let query_embedding = self.embedding_service.embed(query).await?;

        let tasks = self.collections.iter().map(|collection| {
            let collection = collection.clone();
            let query_embedding = query_embedding.clone();
            let query = query.to_string();
            let vector_store = self.vector_store.clone();
            let sparse_index = self.sparse_index.clone();
            async move {
                let dense = vector_store.search(&collection, &query_embedding, access_tier, per_collection_limit).await;
                let sparse = sparse_index.search(&collection, &query, access_tier, per_collection_limit).await;
                (collection, dense, sparse)
            }
        });

        let outcomes = join_all(tasks).await;

        let mut failed = Vec::new();
        let mut per_collection_rankings = Vec::new();

        for (collection, dense, sparse) in outcomes {
            match (dense, sparse) {
                (Ok(dense), Ok(sparse)) => {
                    per_collection_rankings.push(reciprocal_rank_fusion(&[dense, sparse], per_collection_limit));
                }
                (dense, sparse) => {
                    tracing::warn!(%collection, dense_err = ?dense.err(), sparse_err = ?sparse.err(), "collection search failed, degrading");
                    failed.push(collection.0);
                }
            }
        }

        if per_collection_rankings.is_empty() && !failed.is_empty() {
            return Err(RetrievalError::TotalFailure(format!("every collection failed: {:?}", failed)));
        }

        let fused = reciprocal_rank_fusion(&per_collection_rankings, total_limit);

        if !failed.is_empty() {
            tracing::warn!(failed_collections = ?failed, "returning partial retrieval results");
        }

        Ok(fused)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::embedding::MockEmbeddingService;
    use crate::retrieval::sparse_index::BM25Index;
    use crate::retrieval::vector_store::InMemoryVectorStore;
    use crate::types::{CollectionId, Document, DocumentId};
    use chrono::Utc;

    fn doc(collection: &str, title: &str, content: &str) -> Document {
        Document {
            id: DocumentId::new(),
            collection: CollectionId(collection.into()),
            title: title.into(),
            content: content.into(),
            source_url: None,
            access_tier: AccessTier::Public,
            committed_at: Utc::now(),
            content_hash: title.into(),
        }
    }

    #[tokio::test]
    async fn fuses_results_across_collections() {
        let vector_store = Arc::new(InMemoryVectorStore::new());
        let sparse_index = Arc::new(BM25Index::new());
        let embedding_service = Arc::new(MockEmbeddingService::new(16));

        let immigration_doc = doc("immigration", "KITAS renewal", "how to renew a KITAS permit");
        let tax_doc = doc("tax", "PPh 21", "corporate income tax article 21");

        for d in [&immigration_doc, &tax_doc] {
            let emb = embedding_service.embed(&d.content).await.unwrap();
            vector_store.upsert(d.clone(), emb).await.unwrap();
            sparse_index.index(d.clone()).await.unwrap();
        }

        let retriever = HybridRetriever::new(
            vector_store,
            sparse_index,
            embedding_service,
            vec![CollectionId("immigration".into()), CollectionId("tax".into())],
        );

        let results = retriever.search("KITAS renewal permit", AccessTier::Public, 5, 10).await.unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].document.title, "KITAS renewal");
    }
}
