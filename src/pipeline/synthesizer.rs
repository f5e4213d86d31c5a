//! Synthesizer phase (M3): produces the final user-facing answer,
//! folding in any corrections the Calibrator raised. Falls back to a
//! deterministic template (draft plus appended corrections) if the model
//! call fails, so a gateway outage degrades quality rather than availability.

use std::sync::Arc;

use crate::gateway::{Conversation, ConversationMessage, InferenceOptions, InferenceProvider};

use super::calibrator::{CalibrationReport, Correction};
use super::reasoner::DraftAnswer;

pub struct Synthesizer {
    provider: Arc<dyn InferenceProvider>,
}

impl Synthesizer {
    pub fn new(provider: Arc<dyn InferenceProvider>) -> Self {
        Self { provider }
    }

    pub async fn synthesize(&self, draft: &DraftAnswer, report: &CalibrationReport) -> String {
        if report.is_clean() {
            return draft.content.clone();
        }

        match self.synthesize_with_model(draft, &report.corrections).await {
            Ok(content) => content,
            Err(error) => {
                tracing::warn!(%error, "synthesizer model call failed, falling back to deterministic template");
                deterministic_fallback(draft, &report.corrections)
            }
        }
    }

    async fn synthesize_with_model(&self, draft: &DraftAnswer, corrections: &[Correction]) -> Result<String, String> {
        let mut conversation = Conversation::with_system(
            "Revise the draft answer to address every listed correction. Keep citations intact. \
             Return only the revised answer.",
        );

        let corrections_block =
            corrections.iter().map(|c| format!("- [{}] {}", c.dimension, c.detail)).collect::<Vec<_>>().join("\n");

        conversation.push(ConversationMessage::user(format!(
            "Draft:\n{}\n\nCorrections to address:\n{corrections_block}",
            draft.content
        )));

        let response = self
            .provider
            .complete(&conversation, &InferenceOptions::default())
            .await
            .map_err(|e| e.to_string())?;

        Ok(response.content)
    }
}

fn deterministic_fallback(draft: &DraftAnswer, corrections: &[Correction]) -> String {
    let mut out = draft.content.clone();
    out.push_str("\n\nNote:");
    for correction in corrections {
        out.push_str(&format!("\n- {}", correction.detail));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{FinishReason, InferenceError, InferenceResponse};
    use async_trait::async_trait;

    struct FailingProvider;

    #[async_trait]
    impl InferenceProvider for FailingProvider {
        fn model_id(&self) -> &str {
            "test:failing"
        }
        fn cost_per_1k_tokens_usd(&self) -> f64 {
            0.0
        }
        async fn complete(&self, _c: &Conversation, _o: &InferenceOptions) -> Result<InferenceResponse, InferenceError> {
            Err(InferenceError::Request { provider: "test:failing".into(), message: "connection reset".into() })
        }
    }

    struct RevisingProvider;

    #[async_trait]
    impl InferenceProvider for RevisingProvider {
        fn model_id(&self) -> &str {
            "test:revising"
        }
        fn cost_per_1k_tokens_usd(&self) -> f64 {
            0.0
        }
        async fn complete(&self, _c: &Conversation, _o: &InferenceOptions) -> Result<InferenceResponse, InferenceError> {
            Ok(InferenceResponse { content: "revised answer".into(), finish_reason: Some(FinishReason::Stop), ..Default::default() })
        }
    }

    #[tokio::test]
    async fn clean_report_returns_draft_unchanged() {
        let synthesizer = Synthesizer::new(Arc::new(FailingProvider));
        let draft = DraftAnswer { content: "answer".into(), citations: vec![] };
        let report = CalibrationReport { corrections: vec![], unsupported_citations: vec![] };

        assert_eq!(synthesizer.synthesize(&draft, &report).await, "answer");
    }

    #[tokio::test]
    async fn falls_back_to_deterministic_template_on_model_failure() {
        let synthesizer = Synthesizer::new(Arc::new(FailingProvider));
        let draft = DraftAnswer { content: "answer".into(), citations: vec![] };
        let report = CalibrationReport {
            corrections: vec![Correction { dimension: "x".into(), detail: "needs a caveat".into() }],
            unsupported_citations: vec![],
        };

        let result = synthesizer.synthesize(&draft, &report).await;
        assert!(result.contains("answer"));
        assert!(result.contains("needs a caveat"));
    }

    #[tokio::test]
    async fn uses_model_revision_when_available() {
        let synthesizer = Synthesizer::new(Arc::new(RevisingProvider));
        let draft = DraftAnswer { content: "answer".into(), citations: vec![] };
        let report = CalibrationReport {
            corrections: vec![Correction { dimension: "x".into(), detail: "y".into() }],
            unsupported_citations: vec![],
        };

        assert_eq!(synthesizer.synthesize(&draft, &report).await, "revised answer");
    }
}
