//! Orchestrator entry point: loads deployment configuration, wires every
//! component (L1–L5, M1–M3, T1–T4), and serves the HTTP surface.

use std::sync::Arc;

use clap::Parser;
use ragna_orchestrator::config::Config;
use ragna_orchestrator::gateway::{CircuitBreakerConfig, GatewayConfig, InferenceProvider, ModelGateway};
use ragna_orchestrator::gateway::providers::{AnthropicProvider, OpenAiProvider};
use ragna_orchestrator::memory::{CollectiveStore, UserMemoryStore};
use ragna_orchestrator::metrics::MetricsRegistry;
use ragna_orchestrator::orchestrator::{Orchestrator, OrchestratorConfig};
use ragna_orchestrator::reasoning::LoopConfig;
use ragna_orchestrator::retrieval::embedding::{EmbeddingProvider, OllamaEmbeddingService, OpenAiEmbeddingService};
use ragna_orchestrator::retrieval::{
    BM25Index, EmbeddingConfig, EmbeddingService, HybridRetriever, InMemoryVectorStore,
    KnowledgeGraphIndex, MockEmbeddingService,
};
use ragna_orchestrator::routing::IntentClassifier;
use ragna_orchestrator::tools::{GraphLookupTool, ToolRegistry};
use ragna_orchestrator::types::{CollectionId, KnownCorrection};

#[derive(Parser, Debug)]
#[command(name = "ragna-orchestrator", version, about = "Agentic RAG orchestrator for Indonesian immigration, tax, and corporate law")]
struct Cli {
    /// Path to a TOML configuration file; falls back to environment variables when absent.
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

/// Builds the fallback chain from `config.gateway.model_chain`, trying
/// Anthropic then an OpenAI-compatible backend for each entry and
/// skipping any whose provider has no credentials configured.
fn build_provider_chain(config: &Config) -> Vec<Arc<dyn InferenceProvider>> {
    let mut providers: Vec<Arc<dyn InferenceProvider>> = Vec::new();
    for entry in &config.gateway.model_chain {
        if let Some(provider) = AnthropicProvider::from_env(&entry.model_id, entry.cost_per_1k_tokens_usd) {
            providers.push(Arc::new(provider));
            continue;
        }
        if let Some(provider) = OpenAiProvider::from_env(&entry.model_id, entry.cost_per_1k_tokens_usd) {
            providers.push(Arc::new(provider));
            continue;
        }
        tracing::warn!(model_id = %entry.model_id, "no credentials configured for chain entry, skipping");
    }
    providers
}

fn init_tracing(config: &Config) {
    use ragna_orchestrator::config::LogFormat;
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = fmt().with_env_filter(filter);
    match config.logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.validate()?;

    init_tracing(&config);
    tracing::info!(host = %config.api.host, port = config.api.port, "starting orchestrator");

    let metrics = MetricsRegistry::new();

    let embedding_service: Arc<dyn EmbeddingService> = match EmbeddingConfig::from_env() {
        Some(embedding_config) => {
            tracing::info!(provider = ?embedding_config.provider, "using configured embedding provider");
            match embedding_config.provider {
                EmbeddingProvider::OpenAi => Arc::new(OpenAiEmbeddingService::new(embedding_config)),
                EmbeddingProvider::Ollama => Arc::new(OllamaEmbeddingService::new(embedding_config)),
            }
        }
        None => {
            tracing::warn!("no embedding provider configured, falling back to a deterministic mock embedding service");
            Arc::new(MockEmbeddingService::new(config.retrieval.vector_dimension))
        }
    };

    let vector_store = Arc::new(InMemoryVectorStore::new());
    let sparse_index = Arc::new(BM25Index::new());
    let collections: Vec<CollectionId> = config.retrieval.collections.iter().map(|c| CollectionId::new(c.clone())).collect();
    let retriever = HybridRetriever::new(vector_store, sparse_index, embedding_service.clone(), collections.clone());

    let graph_index = Arc::new(KnowledgeGraphIndex::new());

    let mut tool_registry = ToolRegistry::new();
    tool_registry.register(Arc::new(GraphLookupTool::new(graph_index.clone())));
    let tool_registry = Arc::new(tool_registry);

    let intent_classifier = IntentClassifier::new(collections.clone());

    let user_memory = Arc::new(
        UserMemoryStore::with_limits(config.memory.lock_timeout, config.memory.read_concurrency).with_metrics(metrics.clone()),
    );
    let collective_store = Arc::new(CollectiveStore::new(config.memory.promotion_threshold as u32));

    let providers = build_provider_chain(&config);
    if providers.is_empty() {
        tracing::error!("no model providers configured — every query will fail at the gateway");
    }
    let gateway_config = GatewayConfig {
        max_fallback_depth: config.gateway.max_fallback_depth,
        call_deadline: config.gateway.call_deadline,
        session_cost_cap_usd: config.gateway.cost_cap_usd,
    };
    let circuit_breaker_config = CircuitBreakerConfig {
        failure_threshold: config.gateway.circuit_failure_threshold,
        recovery_timeout: config.gateway.circuit_cooldown,
        half_open_max_calls: config.gateway.circuit_success_threshold,
    };
    let gateway = Arc::new(
        ModelGateway::new(providers.clone(), gateway_config)
            .with_metrics(metrics.clone())
            .with_circuit_breaker_config(circuit_breaker_config),
    );

    let reasoner_provider = providers.first().cloned().ok_or_else(|| anyhow::anyhow!("no model providers available for the reasoner"))?;
    let synthesizer_provider = providers.first().cloned().ok_or_else(|| anyhow::anyhow!("no model providers available for the synthesizer"))?;
    let reasoning_provider = providers.first().cloned().ok_or_else(|| anyhow::anyhow!("no model providers available for the reasoning loop"))?;

    let orchestrator_config = OrchestratorConfig {
        session_deadline: config.reasoning.session_deadline,
        loop_config: LoopConfig {
            max_steps: config.reasoning.max_steps,
            max_total_tokens: config.reasoning.max_total_tokens,
            step_deadline: config.reasoning.step_deadline,
        },
        per_collection_limit: config.retrieval.per_collection_limit,
        total_retrieval_limit: config.retrieval.total_retrieval_limit,
        dedup_jaccard_threshold: config.dedup.keyword_jaccard_threshold,
        dedup_cosine_threshold: config.dedup.semantic_cosine_threshold,
        dedup_window: config.dedup.rolling_window_size,
        early_exit_intents: config.reasoning.early_exit_intents.clone(),
    };

    let orchestrator = Arc::new(Orchestrator::new(
        intent_classifier,
        retriever,
        graph_index,
        user_memory,
        collective_store,
        embedding_service,
        tool_registry,
        gateway,
        reasoner_provider,
        synthesizer_provider,
        orchestrator_config,
    ));

    // No Known Corrections are seeded at startup; an operator-facing
    // ingestion path for them is out of this crate's scope (see Non-goals).
    let known_corrections: Vec<KnownCorrection> = Vec::new();

    #[cfg(feature = "http-api")]
    {
        use ragna_orchestrator::api::{HttpApiConfig, HttpApiServer};

        let http_config = HttpApiConfig {
            bind_address: config.api.host.clone(),
            port: config.api.port,
            enable_cors: true,
            enable_tracing: true,
            enable_rate_limiting: true,
            cors_origins: config.api.cors_origins.clone(),
        };
        let server = HttpApiServer::new(http_config, orchestrator, reasoning_provider, known_corrections);
        server.start().await?;
    }

    #[cfg(not(feature = "http-api"))]
    {
        let _ = (orchestrator, reasoning_provider, known_corrections);
        tracing::error!("built without the `http-api` feature — nothing to serve");
    }

    Ok(())
}
