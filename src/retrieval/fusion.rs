//! Reciprocal Rank Fusion: merges the dense and sparse result lists from
//! L2 into a single ranking without needing the two score scales to be
//! comparable.

use std::collections::HashMap;

use crate::types::DocumentId;

use super::vector_store::ScoredDocument;

/// RRF constant. 60 is the value from the original Cormack et al. paper
/// and is insensitive to the exact rank distribution in practice.
const RRF_K: f32 = 60.0;

/// Fuses any number of ranked result lists (e.g. dense + sparse, or
/// dense-per-collection before a single sparse pass) into one ranking.
/// A document that appears in more lists, or ranks highly in any of
/// them, rises to the top.
pub fn reciprocal_rank_fusion(rankings: &[Vec<ScoredDocument>], limit: usize) -> Vec<ScoredDocument> {
    let mut fused_scores: HashMap<DocumentId, f32> = HashMap::new();
    let mut documents: HashMap<DocumentId, ScoredDocument> = HashMap::new();

    for ranking in rankings {
        for (rank, scored) in ranking.iter().enumerate() {
            let contribution = 1.0 / (RRF_K + rank as f32 + 1.0);
            *fused_scores.entry(scored.document.id).or_insert(0.0) += contribution;
            documents.entry(scored.document.id).or_insert_with(|| scored.clone());
        }
    }

    let mut fused: Vec<ScoredDocument> = fused_scores
        .into_iter()
        .map(|(id, score)| {
            let mut doc = documents.remove(&id).expect("document present for every scored id");
            doc.score = score;
            doc
        })
        .collect();

    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    fused.truncate(limit);
    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccessTier, CollectionId, Document};
    use chrono::Utc;

    fn doc(hash: &str) -> Document {
        Document {
            id: DocumentId::new(),
            collection: CollectionId("tax".into()),
            title: hash.into(),
            content: String::new(),
            source_url: None,
            access_tier: AccessTier::Public,
            committed_at: Utc::now(),
            content_hash: hash.into(),
        }
    }

    #[test]
    fn document_present_in_both_lists_outranks_single_list_hits() {
        let shared = doc("shared");
        let dense_only = doc("dense-only");
        let sparse_only = doc("sparse-only");

        let dense = vec![
            ScoredDocument { document: shared.clone(), score: 0.9 },
            ScoredDocument { document: dense_only.clone(), score: 0.8 },
        ];
        let sparse = vec![
            ScoredDocument { document: shared.clone(), score: 12.0 },
            ScoredDocument { document: sparse_only.clone(), score: 8.0 },
        ];

        let fused = reciprocal_rank_fusion(&[dense, sparse], 10);
        assert_eq!(fused[0].document.id, shared.id);
    }

    #[test]
    fn respects_limit() {
        let ranking = vec![doc("a"), doc("b"), doc("c")]
            .into_iter()
            .map(|d| ScoredDocument { document: d, score: 1.0 })
            .collect();
        let fused = reciprocal_rank_fusion(&[ranking], 2);
        assert_eq!(fused.len(), 2);
    }
}
