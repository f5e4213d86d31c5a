//! Semantic duplicate check: the second, more expensive layer of L5.
//! Only runs against candidates that already passed the Jaccard prefilter.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::retrieval::embedding::{cosine_similarity, EmbeddingService};
use crate::types::{DuplicateFilterError, PublishedItem};

use super::jaccard::jaccard_similarity;

#[derive(Debug, Clone, PartialEq)]
pub enum DuplicateVerdict {
    Unique,
    Duplicate { of: crate::types::DocumentId, similarity: f32 },
}

pub struct SemanticDuplicateFilter {
    embedding_service: Arc<dyn EmbeddingService>,
    jaccard_threshold: f32,
    cosine_threshold: f32,
    recent: RwLock<Vec<PublishedItem>>,
    window: usize,
}

impl SemanticDuplicateFilter {
    pub fn new(embedding_service: Arc<dyn EmbeddingService>, jaccard_threshold: f32, cosine_threshold: f32, window: usize) -> Self {
        Self { embedding_service, jaccard_threshold, cosine_threshold, recent: RwLock::new(Vec::new()), window }
    }

    /// Checks `candidate` against the recently admitted window. Returns
    /// `Unique` if it should be published, in which case the caller is
    /// expected to feed it back via [`admit`](Self::admit).
    ///
    /// Layer 1 (keyword Jaccard) alone is decisive: an overlap at or above
    /// the threshold reports a duplicate without ever calling the
    /// embedding service. Layer 2 (semantic cosine) only runs over
    /// candidates layer 1 let through.
    pub async fn check(&self, candidate: &PublishedItem) -> Result<DuplicateVerdict, DuplicateFilterError> {
        let recent = self.recent.read().await;

        if let Some(hit) = recent.iter().find(|item| jaccard_similarity(&candidate.content, &item.content) >= self.jaccard_threshold) {
            return Ok(DuplicateVerdict::Duplicate { of: hit.id, similarity: jaccard_similarity(&candidate.content, &hit.content) });
        }

        let candidate_embedding = if candidate.embedding.is_empty() {
            self.embedding_service
                .embed(&candidate.content)
                .await
                .map_err(|e| DuplicateFilterError::EmbeddingFailed(e.to_string()))?
        } else {
            candidate.embedding.clone()
        };

        for item in recent.iter() {
            let similarity = cosine_similarity(&candidate_embedding, &item.embedding);
            if similarity >= self.cosine_threshold {
                return Ok(DuplicateVerdict::Duplicate { of: item.id, similarity });
            }
        }

        Ok(DuplicateVerdict::Unique)
    }

    pub async fn admit(&self, item: PublishedItem) {
        let mut recent = self.recent.write().await;
        recent.push(item);
        let len = recent.len();
        if len > self.window {
            recent.drain(0..len - self.window);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::embedding::MockEmbeddingService;
    use crate::types::{CollectionId, DocumentId};

    async fn item(embedding_service: &dyn EmbeddingService, content: &str) -> PublishedItem {
        PublishedItem {
            id: DocumentId::new(),
            collection: CollectionId("tax".into()),
            title: content.into(),
            content: content.into(),
            keywords: Vec::new(),
            embedding: embedding_service.embed(content).await.unwrap(),
        }
    }

    #[tokio::test]
    async fn admits_unrelated_content_as_unique() {
        let embedding_service = Arc::new(MockEmbeddingService::new(16));
        let filter = SemanticDuplicateFilter::new(embedding_service.clone(), 0.3, 0.9, 50);

        let first = item(embedding_service.as_ref(), "PT PMA minimum capital requirements").await;
        filter.admit(first).await;

        let second = item(embedding_service.as_ref(), "KITAS sponsor letter checklist").await;
        assert_eq!(filter.check(&second).await.unwrap(), DuplicateVerdict::Unique);
    }

    #[tokio::test]
    async fn flags_near_identical_content_as_duplicate() {
        let embedding_service = Arc::new(MockEmbeddingService::new(16));
        let filter = SemanticDuplicateFilter::new(embedding_service.clone(), 0.3, 0.95, 50);

        let original = item(embedding_service.as_ref(), "KITAS renewal requires a valid sponsor letter").await;
        let original_id = original.id;
        filter.admit(original).await;

        let near_dup = item(embedding_service.as_ref(), "KITAS renewal requires a valid sponsor letter").await;
        match filter.check(&near_dup).await.unwrap() {
            DuplicateVerdict::Duplicate { of, .. } => assert_eq!(of, original_id),
            DuplicateVerdict::Unique => panic!("expected a duplicate verdict"),
        }
    }

    struct PanicsOnEmbedService;

    #[async_trait::async_trait]
    impl EmbeddingService for PanicsOnEmbedService {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, crate::types::RetrievalError> {
            panic!("layer 1 should have short-circuited before the embedding service was called");
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, crate::types::RetrievalError> {
            panic!("layer 1 should have short-circuited before the embedding service was called");
        }

        fn dimension(&self) -> usize {
            16
        }
    }

    #[tokio::test]
    async fn jaccard_overlap_above_threshold_skips_the_embedding_model() {
        let filter = SemanticDuplicateFilter::new(Arc::new(PanicsOnEmbedService), 0.6, 0.88, 50);

        let published = PublishedItem {
            id: DocumentId::new(),
            collection: CollectionId("tax".into()),
            title: "KITAS renewal requires a valid sponsor letter".into(),
            content: "KITAS renewal requires a valid sponsor letter".into(),
            keywords: Vec::new(),
            embedding: Vec::new(),
        };
        let published_id = published.id;
        filter.admit(published).await;

        let candidate = PublishedItem {
            id: DocumentId::new(),
            collection: CollectionId("tax".into()),
            title: "KITAS renewal requires a valid sponsor letter".into(),
            content: "KITAS renewal requires a valid sponsor letter".into(),
            keywords: Vec::new(),
            embedding: Vec::new(),
        };

        match filter.check(&candidate).await.unwrap() {
            DuplicateVerdict::Duplicate { of, similarity } => {
                assert_eq!(of, published_id);
                assert!(similarity >= 0.6);
            }
            DuplicateVerdict::Unique => panic!("expected a duplicate verdict"),
        }
    }
}
