//! Reasoner phase (M3): turns retrieved context into a draft answer with
//! citations. Always goes through the model gateway — unlike the
//! Calibrator, there is no deterministic substitute for drafting prose.

use std::sync::Arc;

use crate::gateway::{Conversation, ConversationMessage, InferenceOptions, InferenceProvider, ModelGatewayError};
use crate::retrieval::ScoredDocument;
use crate::types::DocumentId;

#[derive(Debug, Clone)]
pub struct DraftAnswer {
    pub content: String,
    pub citations: Vec<DocumentId>,
}

pub struct Reasoner {
    provider: Arc<dyn InferenceProvider>,
}

impl Reasoner {
    pub fn new(provider: Arc<dyn InferenceProvider>) -> Self {
        Self { provider }
    }

    pub async fn draft(&self, query: &str, context: &[ScoredDocument]) -> Result<DraftAnswer, ModelGatewayError> {
        let mut conversation = Conversation::with_system(
            "You are a legal research assistant for Indonesian immigration, tax, and corporate \
             law. Answer only from the provided sources. Cite each claim with the source's \
             document id in brackets.",
        );

        let context_block = context
            .iter()
            .map(|s| format!("[{}] {}: {}", s.document.id, s.document.title, s.document.content))
            .collect::<Vec<_>>()
            .join("\n\n");

        conversation.push(ConversationMessage::user(format!(
            "Sources:\n{context_block}\n\nQuestion: {query}"
        )));

        let response = self
            .provider
            .complete(&conversation, &InferenceOptions::default())
            .await
            .map_err(|e| ModelGatewayError::ProviderError { provider: self.provider.model_id().to_string(), message: e.to_string() })?;

        let citations = context
            .iter()
            .filter(|s| response.content.contains(&s.document.id.to_string()))
            .map(|s| s.document.id)
            .collect();

        Ok(DraftAnswer { content: response.content, citations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{FinishReason, InferenceError, InferenceResponse};
    use crate::types::{AccessTier, CollectionId, Document};
    use async_trait::async_trait;
    use chrono::Utc;

    struct StubProvider;

    #[async_trait]
    impl InferenceProvider for StubProvider {
        fn model_id(&self) -> &str {
            "test:stub"
        }
        fn cost_per_1k_tokens_usd(&self) -> f64 {
            0.0
        }
        async fn complete(&self, conversation: &Conversation, _o: &InferenceOptions) -> Result<InferenceResponse, InferenceError> {
            let doc_id = conversation.messages[1].content.split('[').nth(1).unwrap().split(']').next().unwrap();
            Ok(InferenceResponse {
                content: format!("Per [{doc_id}], renewal requires a sponsor letter."),
                finish_reason: Some(FinishReason::Stop),
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn draft_cites_sources_it_quotes() {
        let reasoner = Reasoner::new(Arc::new(StubProvider));
        let document = Document {
            id: DocumentId::new(),
            collection: CollectionId("immigration".into()),
            title: "KITAS renewal".into(),
            content: "requires a sponsor letter".into(),
            source_url: None,
            access_tier: AccessTier::Public,
            committed_at: Utc::now(),
            content_hash: "h".into(),
        };
        let context = vec![ScoredDocument { document: document.clone(), score: 1.0 }];

        let draft = reasoner.draft("how do I renew my KITAS?", &context).await.unwrap();
        assert_eq!(draft.citations, vec![document.id]);
    }
}
