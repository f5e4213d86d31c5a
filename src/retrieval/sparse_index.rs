//! Keyword/BM25-style sparse index, the second leg of L2's hybrid search.
//!
//! Kept intentionally simple: an in-memory inverted index scored with
//! BM25. Swapping in a real full-text engine (tantivy, Meilisearch) is a
//! drop-in behind the same [`SparseIndex`] trait.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::types::{AccessTier, CollectionId, Document, DocumentId, RetrievalError};

use super::vector_store::ScoredDocument;

const BM25_K1: f32 = 1.5;
const BM25_B: f32 = 0.75;

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

#[async_trait]
pub trait SparseIndex: Send + Sync {
    async fn index(&self, document: Document) -> Result<(), RetrievalError>;
    async fn search(
        &self,
        collection: &CollectionId,
        query: &str,
        access_tier: AccessTier,
        limit: usize,
    ) -> Result<Vec<ScoredDocument>, RetrievalError>;
    async fn remove(&self, collection: &CollectionId, id: &DocumentId) -> Result<(), RetrievalError>;
}

struct IndexedDoc {
    document: Document,
    term_freq: HashMap<String, u32>,
    length: usize,
}

#[derive(Default)]
pub struct BM25Index {
    docs: tokio::sync::RwLock<Vec<IndexedDoc>>,
}

impl BM25Index {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SparseIndex for BM25Index {
    async fn index(&self, document: Document) -> Result<(), RetrievalError> {
        let tokens = tokenize(&format!("{} {}", document.title, document.content));
        let mut term_freq = HashMap::new();
        for t in &tokens {
            *term_freq.entry(t.clone()).or_insert(0u32) += 1;
        }
        let indexed = IndexedDoc { length: tokens.len(), term_freq, document };

        let mut docs = self.docs.write().await;
        docs.retain(|d| d.document.id != indexed.document.id);
        docs.push(indexed);
        Ok(())
    }

    async fn search(
        &self,
        collection: &CollectionId,
        query: &str,
        access_tier: AccessTier,
        limit: usize,
    ) -> Result<Vec<ScoredDocument>, RetrievalError> {
        let docs = self.docs.read().await;
        let candidates: Vec<&IndexedDoc> = docs
            .iter()
            .filter(|d| &d.document.collection == collection && d.document.access_tier <= access_tier)
            .collect();

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let avg_len = candidates.iter().map(|d| d.length as f32).sum::<f32>() / candidates.len() as f32;
        let n = candidates.len() as f32;
        let query_terms = tokenize(query);

        let mut scored: Vec<ScoredDocument> = candidates
            .iter()
            .map(|d| {
                let mut score = 0.0f32;
                for term in &query_terms {
                    let df = candidates.iter().filter(|c| c.term_freq.contains_key(term)).count() as f32;
                    if df == 0.0 {
                        continue;
                    }
                    let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                    let tf = *d.term_freq.get(term).unwrap_or(&0) as f32;
                    let norm = 1.0 - BM25_B + BM25_B * (d.length as f32 / avg_len.max(1.0));
                    score += idf * (tf * (BM25_K1 + 1.0)) / (tf + BM25_K1 * norm);
                }
                ScoredDocument { document: d.document.clone(), score }
            })
            .filter(|s| s.score > 0.0)
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn remove(&self, collection: &CollectionId, id: &DocumentId) -> Result<(), RetrievalError> {
        let mut docs = self.docs.write().await;
        docs.retain(|d| !(&d.document.collection == collection && &d.document.id == id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc(title: &str, content: &str, tier: AccessTier) -> Document {
        Document {
            id: DocumentId::new(),
            collection: CollectionId("immigration".into()),
            title: title.into(),
            content: content.into(),
            source_url: None,
            access_tier: tier,
            committed_at: Utc::now(),
            content_hash: "h".into(),
        }
    }

    #[tokio::test]
    async fn ranks_exact_keyword_match_highest() {
        let index = BM25Index::new();
        index.index(doc("KITAS renewal", "How to renew a KITAS permit", AccessTier::Public)).await.unwrap();
        index.index(doc("Tax filing", "Annual corporate tax filing deadlines", AccessTier::Public)).await.unwrap();

        let results = index
            .search(&CollectionId("immigration".into()), "kitas renewal", AccessTier::Public, 10)
            .await
            .unwrap();

        assert_eq!(results[0].document.title, "KITAS renewal");
    }

    #[tokio::test]
    async fn respects_access_tier_prefilter() {
        let index = BM25Index::new();
        index.index(doc("Pro memo", "confidential KITAS strategy", AccessTier::Professional)).await.unwrap();

        let results = index
            .search(&CollectionId("immigration".into()), "kitas", AccessTier::Public, 10)
            .await
            .unwrap();

        assert!(results.is_empty());
    }
}
