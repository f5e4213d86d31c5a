//! M3: Three-Phase Generation Pipeline — Reasoner drafts from retrieved
//! context, the Calibrator deterministically audits the draft, and the
//! Synthesizer produces the final answer (with a deterministic fallback
//! if its own revision call fails).

mod calibrator;
mod reasoner;
mod synthesizer;

pub use calibrator::{Calibrator, CalibrationReport, Correction};
pub use reasoner::{DraftAnswer, Reasoner};
pub use synthesizer::Synthesizer;

use std::sync::Arc;

use crate::gateway::{InferenceProvider, ModelGatewayError};
use crate::retrieval::ScoredDocument;
use crate::types::KnownCorrection;

/// Runs Reasoner → Calibrator → Synthesizer end to end for one query.
pub struct GenerationPipeline {
    reasoner: Reasoner,
    calibrator: Calibrator,
    synthesizer: Synthesizer,
}

impl GenerationPipeline {
    pub fn new(reasoner_provider: Arc<dyn InferenceProvider>, synthesizer_provider: Arc<dyn InferenceProvider>) -> Self {
        Self {
            reasoner: Reasoner::new(reasoner_provider),
            calibrator: Calibrator::new(),
            synthesizer: Synthesizer::new(synthesizer_provider),
        }
    }

    pub async fn run(
        &self,
        query: &str,
        context: &[ScoredDocument],
        known_corrections: &[KnownCorrection],
    ) -> Result<(String, CalibrationReport), ModelGatewayError> {
        let draft = self.reasoner.draft(query, context).await?;
        let report = self.calibrator.calibrate(&draft, context, known_corrections);
        let answer = self.synthesizer.synthesize(&draft, &report).await;
        Ok((answer, report))
    }
}
