//! Backend-agnostic vector store trait (L2).
//!
//! Implementations: an embedded LanceDB-backed store under the
//! `vector-lancedb` feature, a remote Qdrant client under `vector-qdrant`,
//! and an in-memory store used in tests and as a fallback when neither
//! backend is configured.

use async_trait::async_trait;

use crate::types::{AccessTier, CollectionId, Document, DocumentId, RetrievalError};

#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, document: Document, embedding: Vec<f32>) -> Result<(), RetrievalError>;

    async fn search(
        &self,
        collection: &CollectionId,
        query_embedding: &[f32],
        access_tier: AccessTier,
        limit: usize,
    ) -> Result<Vec<ScoredDocument>, RetrievalError>;

    async fn delete(&self, collection: &CollectionId, id: &DocumentId) -> Result<(), RetrievalError>;

    async fn health_check(&self) -> Result<bool, RetrievalError>;
}

/// In-memory vector store. Used for unit tests and as a local-dev
/// fallback when no embedded/remote backend is configured at startup.
#[derive(Default)]
pub struct InMemoryVectorStore {
    entries: tokio::sync::RwLock<Vec<(Document, Vec<f32>)>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, document: Document, embedding: Vec<f32>) -> Result<(), RetrievalError> {
        let mut entries = self.entries.write().await;
        entries.retain(|(d, _)| d.id != document.id);
        entries.push((document, embedding));
        Ok(())
    }

    async fn search(
        &self,
        collection: &CollectionId,
        query_embedding: &[f32],
        access_tier: AccessTier,
        limit: usize,
    ) -> Result<Vec<ScoredDocument>, RetrievalError> {
        let entries = self.entries.read().await;
        let mut scored: Vec<ScoredDocument> = entries
            .iter()
            .filter(|(d, _)| &d.collection == collection && d.access_tier <= access_tier)
            .map(|(d, emb)| ScoredDocument {
                document: d.clone(),
                score: crate::retrieval::embedding::cosine_similarity(query_embedding, emb),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn delete(&self, collection: &CollectionId, id: &DocumentId) -> Result<(), RetrievalError> {
        let mut entries = self.entries.write().await;
        entries.retain(|(d, _)| !(&d.collection == collection && &d.id == id));
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, RetrievalError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc(collection: &str, tier: AccessTier, content_hash: &str) -> Document {
        Document {
            id: DocumentId::new(),
            collection: CollectionId(collection.to_string()),
            title: "t".into(),
            content: "c".into(),
            source_url: None,
            access_tier: tier,
            committed_at: Utc::now(),
            content_hash: content_hash.into(),
        }
    }

    #[tokio::test]
    async fn access_tier_is_a_hard_prefilter() {
        let store = InMemoryVectorStore::new();
        store.upsert(doc("tax", AccessTier::Professional, "h1"), vec![1.0, 0.0]).await.unwrap();
        store.upsert(doc("tax", AccessTier::Public, "h2"), vec![1.0, 0.0]).await.unwrap();

        let results = store
            .search(&CollectionId("tax".into()), &[1.0, 0.0], AccessTier::Public, 10)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.access_tier, AccessTier::Public);
    }

    #[tokio::test]
    async fn search_ranks_by_cosine_similarity() {
        let store = InMemoryVectorStore::new();
        store.upsert(doc("tax", AccessTier::Public, "h1"), vec![1.0, 0.0]).await.unwrap();
        store.upsert(doc("tax", AccessTier::Public, "h2"), vec![0.0, 1.0]).await.unwrap();

        let results = store
            .search(&CollectionId("tax".into()), &[1.0, 0.0], AccessTier::Public, 10)
            .await
            .unwrap();

        assert_eq!(results[0].document.content_hash, "h1");
    }
}
