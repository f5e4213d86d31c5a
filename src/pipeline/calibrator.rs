//! Calibrator phase (M3): a deterministic audit of the Reasoner's draft.
//! Makes no model call — it only checks the draft's citations against
//! what was actually retrieved and cross-references known corrections,
//! so its output is reproducible given the same draft and context.

use crate::retrieval::ScoredDocument;
use crate::types::{DocumentId, KnownCorrection};

use super::reasoner::DraftAnswer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    pub dimension: String,
    pub detail: String,
}

#[derive(Debug, Clone)]
pub struct CalibrationReport {
    pub corrections: Vec<Correction>,
    /// Citations in the draft that don't correspond to any retrieved
    /// document — a strong signal the model invented a source.
    pub unsupported_citations: Vec<DocumentId>,
}

impl CalibrationReport {
    pub fn is_clean(&self) -> bool {
        self.corrections.is_empty() && self.unsupported_citations.is_empty()
    }
}

pub struct Calibrator;

impl Calibrator {
    pub fn new() -> Self {
        Self
    }

    pub fn calibrate(&self, draft: &DraftAnswer, context: &[ScoredDocument], known_corrections: &[KnownCorrection]) -> CalibrationReport {
        let retrieved_ids: Vec<DocumentId> = context.iter().map(|s| s.document.id).collect();
        let unsupported_citations: Vec<DocumentId> =
            draft.citations.iter().filter(|id| !retrieved_ids.contains(id)).copied().collect();

        let mut corrections = Vec::new();

        if draft.citations.is_empty() && !context.is_empty() {
            corrections.push(Correction {
                dimension: "citation_coverage".into(),
                detail: "draft answer cites no retrieved source despite context being available".into(),
            });
        }

        for known in known_corrections {
            let topic_lower = known.topic.to_lowercase();
            if draft.content.to_lowercase().contains(&topic_lower) {
                corrections.push(Correction {
                    dimension: "known_correction".into(),
                    detail: format!("{}: {}", known.topic, known.correction),
                });
            }
        }

        if !unsupported_citations.is_empty() {
            corrections.push(Correction {
                dimension: "unsupported_citation".into(),
                detail: format!("draft cites {} document(s) not present in retrieved context", unsupported_citations.len()),
            });
        }

        CalibrationReport { corrections, unsupported_citations }
    }
}

impl Default for Calibrator {
    fn default() -> Self {
        Self::new()
    }
}
