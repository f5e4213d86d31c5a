//! Integration tests for the end-to-end scenarios and cross-cutting
//! properties the orchestrator is expected to satisfy: early exit on
//! greetings, model failover with circuit-breaker tripping, duplicate
//! suppression without an embedding call, and atomic concurrent fact
//! promotion.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use ragna_orchestrator::dedup::DuplicateVerdict;
use ragna_orchestrator::gateway::{
    CircuitBreakerConfig, Conversation, GatewayConfig, InferenceError, InferenceOptions,
    InferenceProvider, InferenceResponse, ModelGateway,
};
use ragna_orchestrator::memory::{CollectiveStore, UserMemoryStore};
use ragna_orchestrator::orchestrator::{Orchestrator, OrchestratorConfig};
use ragna_orchestrator::reasoning::LoopConfig;
use ragna_orchestrator::retrieval::{BM25Index, HybridRetriever, InMemoryVectorStore, KnowledgeGraphIndex, MockEmbeddingService};
use ragna_orchestrator::routing::IntentClassifier;
use ragna_orchestrator::tools::ToolRegistry;
use ragna_orchestrator::types::{AccessTier, CollectionId, DocumentId, PublishedItem, QueryEnvelope, StreamEvent, UserId};

/// Always finishes with no tool calls, echoing a fixed answer.
struct StubProvider {
    id: &'static str,
    answer: &'static str,
}

#[async_trait]
impl InferenceProvider for StubProvider {
    fn model_id(&self) -> &str {
        self.id
    }
    fn cost_per_1k_tokens_usd(&self) -> f64 {
        0.001
    }
    async fn complete(&self, _c: &Conversation, _o: &InferenceOptions) -> Result<InferenceResponse, InferenceError> {
        Ok(InferenceResponse {
            content: self.answer.into(),
            finish_reason: Some(ragna_orchestrator::gateway::FinishReason::Stop),
            ..Default::default()
        })
    }
}

/// Fails its first `fail_times` calls, then succeeds.
struct FlakyProvider {
    id: &'static str,
    fail_times: AtomicU32,
}

#[async_trait]
impl InferenceProvider for FlakyProvider {
    fn model_id(&self) -> &str {
        self.id
    }
    fn cost_per_1k_tokens_usd(&self) -> f64 {
        0.001
    }
    async fn complete(&self, _c: &Conversation, _o: &InferenceOptions) -> Result<InferenceResponse, InferenceError> {
        if self.fail_times.load(Ordering::SeqCst) > 0 {
            self.fail_times.fetch_sub(1, Ordering::SeqCst);
            return Err(InferenceError::Request { provider: self.id.into(), message: "service unavailable".into() });
        }
        Ok(InferenceResponse {
            content: "PT PMA requires minimum paid-up capital of IDR 10 billion.".into(),
            finish_reason: Some(ragna_orchestrator::gateway::FinishReason::Stop),
            ..Default::default()
        })
    }
}

fn collections() -> Vec<CollectionId> {
    vec![CollectionId::new("immigration"), CollectionId::new("tax"), CollectionId::new("corporate")]
}

fn build_orchestrator(config: OrchestratorConfig) -> (Orchestrator, Arc<dyn InferenceProvider>) {
    let embedding_service = Arc::new(MockEmbeddingService::new(16));
    let retriever = HybridRetriever::new(
        Arc::new(InMemoryVectorStore::new()),
        Arc::new(BM25Index::new()),
        embedding_service.clone(),
        collections(),
    );
    let graph_index = Arc::new(KnowledgeGraphIndex::new());
    let tool_registry = Arc::new(ToolRegistry::new());
    let intent_classifier = IntentClassifier::new(collections());
    let user_memory = Arc::new(UserMemoryStore::new());
    let collective_store = Arc::new(CollectiveStore::new(3));

    let provider: Arc<dyn InferenceProvider> = Arc::new(StubProvider { id: "test:stub", answer: "Hello! How can I help with your legal question?" });
    let gateway = Arc::new(ModelGateway::new(vec![provider.clone()], GatewayConfig::default()));

    let orchestrator = Orchestrator::new(
        intent_classifier,
        retriever,
        graph_index,
        user_memory,
        collective_store,
        embedding_service,
        tool_registry,
        gateway,
        provider.clone(),
        provider.clone(),
        config,
    );
    (orchestrator, provider)
}

/// E2 — "hi" must classify as a greeting, skip retrieval and the
/// reasoning loop, and reach `done` with no `tool_call` events.
#[tokio::test]
async fn e2_greeting_short_circuits_the_reasoning_loop() {
    let (orchestrator, reasoning_provider) = build_orchestrator(OrchestratorConfig::default());
    let envelope = QueryEnvelope::new(UserId("u1".into()), "hi", AccessTier::Public);

    let mut events = Vec::new();
    let result = orchestrator
        .handle_query(envelope, &[], reasoning_provider, |event| events.push(event))
        .await
        .unwrap();

    assert!(!result.0.is_empty());
    assert!(!events.iter().any(|e| matches!(e, StreamEvent::ToolCall { .. })));
    assert!(matches!(events.last(), Some(StreamEvent::Done { .. })));
    // No retrieving/reasoning stage should have been announced.
    assert!(!events.iter().any(|e| matches!(e, StreamEvent::Status { stage, .. } if stage == "retrieving" || stage == "reasoning")));
}

/// E4 — the first model fails three times, the breaker opens, and the
/// gateway falls over to the next provider; the call still succeeds.
#[tokio::test]
async fn e4_falls_over_to_next_model_after_repeated_failures() {
    let primary = Arc::new(FlakyProvider { id: "primary", fail_times: AtomicU32::new(3) });
    let secondary = Arc::new(FlakyProvider { id: "secondary", fail_times: AtomicU32::new(0) });

    let circuit_config = CircuitBreakerConfig { failure_threshold: 3, recovery_timeout: Duration::from_secs(30), half_open_max_calls: 1 };
    let gateway = ModelGateway::new(
        vec![primary.clone() as Arc<dyn InferenceProvider>, secondary.clone() as Arc<dyn InferenceProvider>],
        GatewayConfig { max_fallback_depth: 5, ..GatewayConfig::default() },
    )
    .with_circuit_breaker_config(circuit_config);

    let budget = ragna_orchestrator::gateway::SessionBudget::default();

    // Each call falls over to the secondary within the same request, so
    // three calls are enough to accumulate three consecutive failures on
    // the primary and trip its breaker.
    for _ in 0..3 {
        let _ = gateway.complete(&Conversation::new(), &InferenceOptions::default(), &budget).await;
    }

    let result = gateway.complete(&Conversation::new(), &InferenceOptions::default(), &budget).await;
    assert!(result.is_ok(), "fallback to the secondary provider should have succeeded");
    assert!(result.unwrap().content.contains("PT PMA"));

    assert!(matches!(
        gateway.circuit_state("primary").await,
        Some(ragna_orchestrator::gateway::CircuitState::Open { .. })
    ));
}

/// E5 — Testable Property 5: a title differing only by stop-word
/// substitution must be flagged as a duplicate via the keyword-Jaccard
/// prefilter alone, with zero embedding calls.
#[tokio::test]
async fn e5_stop_word_substitution_is_caught_by_the_keyword_prefilter() {
    let (orchestrator, _) = build_orchestrator(OrchestratorConfig::default());

    let original = PublishedItem {
        id: DocumentId::new(),
        collection: CollectionId::new("immigration"),
        title: "Indonesia Extends Digital Nomad Visa to 5 Years".into(),
        content: "Indonesia Extends Digital Nomad Visa to 5 Years".into(),
        keywords: Vec::new(),
        embedding: Vec::new(),
    };
    let original_id = original.id;
    orchestrator.ingest_item(original).await.unwrap();

    let candidate = PublishedItem {
        id: DocumentId::new(),
        collection: CollectionId::new("immigration"),
        title: "Indonesian Digital Nomad Visa Extended to Five Years".into(),
        content: "Indonesian Digital Nomad Visa Extended to Five Years".into(),
        keywords: Vec::new(),
        embedding: Vec::new(),
    };

    match orchestrator.ingest_item(candidate).await.unwrap() {
        DuplicateVerdict::Duplicate { of, .. } => assert_eq!(of, original_id),
        DuplicateVerdict::Unique => panic!("expected a duplicate verdict from the keyword prefilter"),
    }
}

/// E6 — five concurrent contributions from five distinct users promote
/// exactly once, with a final source count of five.
#[tokio::test]
async fn e6_concurrent_contributions_promote_exactly_once() {
    let store = Arc::new(CollectiveStore::new(3));
    let statement = "KITAS renewal now requires biometric re-registration";

    let mut handles = Vec::new();
    for i in 0..5 {
        let store = store.clone();
        let user = UserId(format!("user-{i}"));
        handles.push(tokio::spawn(async move { store.confirm(statement, &user) }));
    }

    let mut promotions = 0;
    let mut last_fact = None;
    for handle in handles {
        let fact = handle.await.unwrap();
        last_fact = Some(fact.clone());
    }
    let promoted_facts = store.promoted_facts();
    promotions += promoted_facts.len();

    assert_eq!(promotions, 1);
    assert_eq!(last_fact.unwrap().statement, statement);
    assert_eq!(promoted_facts[0].source_count, 5);
}
