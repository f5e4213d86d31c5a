//! Axum router assembly: CORS, tracing, rate limiting, security headers.
//! Deliberately carries no authentication layer — that sits in front of
//! this service (reverse proxy / API gateway), not inside it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::http::{header, HeaderValue, Method};
use axum::middleware as axum_middleware;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::gateway::InferenceProvider;
use crate::orchestrator::Orchestrator;
use crate::types::{KnownCorrection, RuntimeError};

use super::middleware::{rate_limit_middleware, security_headers_middleware};
use super::routes::{self, AppState};
use super::types::{
    ErrorResponse, HealthResponse, IngestItem, IngestItemResult, IngestItemsRequest,
    IngestItemsResponse, MetricsResponse, QueryRequest, QueryResponse, QueryTimings, SourceRef,
};

#[derive(OpenApi)]
#[openapi(
    paths(super::routes::query),
    components(schemas(
        QueryRequest,
        QueryResponse,
        QueryTimings,
        SourceRef,
        IngestItemsRequest,
        IngestItem,
        IngestItemsResponse,
        IngestItemResult,
        HealthResponse,
        MetricsResponse,
        ErrorResponse,
    )),
    tags(
        (name = "query", description = "Conversational query endpoints"),
        (name = "ingest", description = "Collection ingestion"),
        (name = "system", description = "Health and metrics")
    ),
    info(title = "Agentic RAG Orchestrator API", description = "HTTP surface for Indonesian immigration, tax, and corporate law orchestration", version = "1.0.0")
)]
pub struct ApiDoc;

#[derive(Debug, Clone)]
pub struct HttpApiConfig {
    pub bind_address: String,
    pub port: u16,
    pub enable_cors: bool,
    pub enable_tracing: bool,
    pub enable_rate_limiting: bool,
    pub cors_origins: Vec<String>,
}

impl Default for HttpApiConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
            enable_cors: true,
            enable_tracing: true,
            enable_rate_limiting: true,
            cors_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

pub struct HttpApiServer {
    config: HttpApiConfig,
    state: Arc<AppState>,
}

impl HttpApiServer {
    pub fn new(
        config: HttpApiConfig,
        orchestrator: Arc<Orchestrator>,
        reasoning_provider: Arc<dyn InferenceProvider>,
        known_corrections: Vec<KnownCorrection>,
    ) -> Self {
        let state = Arc::new(AppState { orchestrator, reasoning_provider, known_corrections, start_time: Instant::now() });
        Self { config, state }
    }

    pub async fn start(&self) -> Result<(), RuntimeError> {
        let app = self.create_router();
        let addr = format!("{}:{}", self.config.bind_address, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| RuntimeError::Internal(format!("failed to bind to {addr}: {e}")))?;

        tracing::info!(%addr, "HTTP API server starting");

        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|e| RuntimeError::Internal(format!("server error: {e}")))?;

        Ok(())
    }

    fn create_router(&self) -> Router {
        let mut router = Router::new()
            .route("/query", post(routes::query))
            .route("/stream", post(routes::stream))
            .route("/ingest/items", post(routes::ingest_items))
            .route("/health", get(routes::health))
            .route("/metrics", get(routes::metrics))
            .with_state(self.state.clone())
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

        if self.config.enable_tracing {
            router = router.layer(TraceLayer::new_for_http());
        }

        if self.config.enable_cors {
            let allowed_origins: Vec<HeaderValue> = self.config.cors_origins.iter().filter_map(|o| o.parse().ok()).collect();
            let cors = CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE])
                .allow_credentials(false);
            router = router.layer(cors);
        }

        if self.config.enable_rate_limiting {
            router = router.layer(axum_middleware::from_fn(rate_limit_middleware));
        }

        router.layer(axum_middleware::from_fn(security_headers_middleware))
    }
}
