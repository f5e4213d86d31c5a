//! T2: Orchestrator — the top-level entry point wiring every component
//! (L1–L5, M1–M3, T1) into one query-handling pipeline.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::dedup::SemanticDuplicateFilter;
use crate::gateway::{Conversation, ConversationMessage, InferenceProvider, ModelGateway, SessionBudget};
use crate::memory::{CollectiveStore, UserMemoryStore};
use crate::metrics::MetricsRegistry;
use crate::pipeline::GenerationPipeline;
use crate::reasoning::{LoopConfig, ReasoningLoopRunner};
use crate::retrieval::{EmbeddingService, HybridRetriever, KnowledgeGraphIndex};
use crate::routing::IntentClassifier;
use crate::tools::ToolRegistry;
use crate::types::{KnownCorrection, OrchestratorError, QueryEnvelope, StreamEvent, TokenUsage};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub session_deadline: Duration,
    pub loop_config: LoopConfig,
    pub per_collection_limit: usize,
    pub total_retrieval_limit: usize,
    /// L5: keyword-Jaccard prefilter threshold.
    pub dedup_jaccard_threshold: f32,
    /// L5: semantic cosine threshold for candidates that survive the prefilter.
    pub dedup_cosine_threshold: f32,
    /// L5: size of the recently-admitted rolling window.
    pub dedup_window: usize,
    /// Intent names (matching [`crate::routing::Intent::as_str`]) that skip
    /// retrieval and the reasoning loop entirely, going straight to
    /// synthesis over empty context.
    pub early_exit_intents: Vec<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            session_deadline: Duration::from_secs(90),
            loop_config: LoopConfig::default(),
            per_collection_limit: 8,
            total_retrieval_limit: 12,
            dedup_jaccard_threshold: 0.6,
            dedup_cosine_threshold: 0.88,
            dedup_window: 500,
            early_exit_intents: vec!["greeting".into(), "chitchat".into()],
        }
    }
}

/// The complete agentic RAG pipeline for one deployment: classify intent,
/// retrieve across the targeted collections, run the reasoning loop with
/// tool access, then Reasoner → Calibrator → Synthesizer over the result.
pub struct Orchestrator {
    intent_classifier: IntentClassifier,
    retriever: HybridRetriever,
    graph_index: Arc<KnowledgeGraphIndex>,
    user_memory: Arc<UserMemoryStore>,
    collective_store: Arc<CollectiveStore>,
    dup_filter: Arc<SemanticDuplicateFilter>,
    tool_registry: Arc<ToolRegistry>,
    gateway: Arc<ModelGateway>,
    pipeline: GenerationPipeline,
    config: Arc<RwLock<OrchestratorConfig>>,
    metrics: Arc<MetricsRegistry>,
}

impl Orchestrator {
    pub fn new(
        intent_classifier: IntentClassifier,
        retriever: HybridRetriever,
        graph_index: Arc<KnowledgeGraphIndex>,
        user_memory: Arc<UserMemoryStore>,
        collective_store: Arc<CollectiveStore>,
        embedding_service: Arc<dyn EmbeddingService>,
        tool_registry: Arc<ToolRegistry>,
        gateway: Arc<ModelGateway>,
        reasoner_provider: Arc<dyn InferenceProvider>,
        synthesizer_provider: Arc<dyn InferenceProvider>,
        config: OrchestratorConfig,
    ) -> Self {
        let metrics = MetricsRegistry::new();
        let dup_filter = Arc::new(SemanticDuplicateFilter::new(
            embedding_service,
            config.dedup_jaccard_threshold,
            config.dedup_cosine_threshold,
            config.dedup_window,
        ));
        Self {
            intent_classifier,
            retriever,
            graph_index,
            user_memory,
            collective_store,
            dup_filter,
            tool_registry,
            gateway,
            pipeline: GenerationPipeline::new(reasoner_provider, synthesizer_provider),
            config: Arc::new(RwLock::new(config)),
            metrics,
        }
    }

    /// Handles one query end to end, streaming progress through
    /// `on_event` as it goes. Returns the final answer text and the
    /// accumulated token usage for the session.
    pub async fn handle_query(
        &self,
        envelope: QueryEnvelope,
        known_corrections: &[KnownCorrection],
        reasoning_provider: Arc<dyn InferenceProvider>,
        mut on_event: impl FnMut(StreamEvent) + Send,
    ) -> Result<(String, TokenUsage), OrchestratorError> {
        let config = self.config.read().await.clone();
        let request_id = envelope.request_id;
        let session_started = std::time::Instant::now();

        on_event(StreamEvent::Status { request_id, stage: "classifying".into() });
        let classification = self.intent_classifier.classify(&envelope.query);
        let early_exit = config.early_exit_intents.iter().any(|i| i == classification.intent.as_str());

        let (context, retrieval_latency_micros) = if early_exit {
            (Vec::new(), 0)
        } else {
            on_event(StreamEvent::Status { request_id, stage: "retrieving".into() });
            let retrieval_started = std::time::Instant::now();
            let context_result = self
                .retriever
                .search(&envelope.query, envelope.access_tier, config.per_collection_limit, config.total_retrieval_limit)
                .await;
            let retrieval_latency_micros = retrieval_started.elapsed().as_micros() as u64;
            self.metrics.record_retrieval(false, context_result.is_err(), retrieval_latency_micros);
            let context = context_result
                .map_err(|e| OrchestratorError::PipelineFailed { phase: "retrieval".into(), reason: e.to_string() })?;
            (context, retrieval_latency_micros)
        };

        tracing::debug!(intent = ?classification.intent, confidence = classification.confidence, hits = context.len(), early_exit, "retrieval complete");

        let (loop_total_usage, reasoning_latency_micros) = if early_exit {
            on_event(StreamEvent::Status { request_id, stage: "synthesizing".into() });
            (TokenUsage::default(), 0)
        } else {
            on_event(StreamEvent::Status { request_id, stage: "reasoning".into() });
            let mut conversation = Conversation::with_system(
                "You are an agentic legal research assistant. Use tools to gather any additional \
                 context you need before answering.",
            );
            conversation.push(ConversationMessage::user(&envelope.query));

            let reasoning_started = std::time::Instant::now();
            let runner = ReasoningLoopRunner::new(reasoning_provider, self.tool_registry.clone(), config.loop_config.clone(), config.session_deadline);
            self.metrics.record_loop_started();
            let loop_result = runner.run(request_id, classification.intent.as_str(), conversation, &mut on_event).await?;
            self.metrics.record_loop_termination(&loop_result.termination_reason);
            let reasoning_latency_micros = reasoning_started.elapsed().as_micros() as u64;

            on_event(StreamEvent::Status { request_id, stage: "synthesizing".into() });
            (loop_result.state.total_usage, reasoning_latency_micros)
        };

        let (answer, report) = self
            .pipeline
            .run(&envelope.query, &context, known_corrections)
            .await
            .map_err(|e| OrchestratorError::PipelineFailed { phase: "generation".into(), reason: e.to_string() })?;

        for correction in &report.corrections {
            on_event(StreamEvent::Correction { request_id, dimension: correction.dimension.clone(), detail: correction.detail.clone() });
        }

        if !early_exit {
            let _ = self.user_memory.record(&envelope.user_id, format!("asked: {}", envelope.query), Some(request_id)).await;
            self.metrics.record_fact_recorded();
            let promoted_before = self.collective_store.promoted_facts().len();
            self.collective_store.confirm(&answer, &envelope.user_id);
            if self.collective_store.promoted_facts().len() > promoted_before {
                self.metrics.record_fact_promoted();
            }
        }

        let total_usage = loop_total_usage;

        let sources: Vec<serde_json::Value> = context
            .iter()
            .map(|scored| {
                serde_json::json!({
                    "document_id": scored.document.id.to_string(),
                    "title": scored.document.title,
                    "collection": scored.document.collection.to_string(),
                })
            })
            .collect();
        on_event(StreamEvent::Metadata {
            request_id,
            key: "response_metadata".into(),
            value: serde_json::json!({
                "sources": sources,
                "followup_questions": Vec::<String>::new(),
                "token_usage": total_usage,
                "timings": {
                    "retrieval_ms": retrieval_latency_micros / 1_000,
                    "reasoning_ms": reasoning_latency_micros / 1_000,
                    "total_ms": session_started.elapsed().as_millis() as u64,
                },
            }),
        });

        on_event(StreamEvent::Done { request_id, usage: total_usage });

        Ok((answer, total_usage))
    }

    pub fn budget(&self) -> SessionBudget {
        SessionBudget::default()
    }

    pub fn graph_index(&self) -> &KnowledgeGraphIndex {
        &self.graph_index
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn gateway(&self) -> &ModelGateway {
        &self.gateway
    }

    /// L5: checks one candidate item against the recently-published
    /// rolling window and, if unique, admits it so later checks see it.
    /// This is the ingestion-time counterpart to `handle_query`'s
    /// read-only retrieval path.
    pub async fn ingest_item(&self, item: crate::types::PublishedItem) -> Result<crate::dedup::DuplicateVerdict, crate::types::DuplicateFilterError> {
        let verdict = self.dup_filter.check(&item).await?;
        if matches!(verdict, crate::dedup::DuplicateVerdict::Unique) {
            self.dup_filter.admit(item).await;
        }
        Ok(verdict)
    }
}
