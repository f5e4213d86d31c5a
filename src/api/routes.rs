//! Route handlers for the HTTP surface (spec.md §6).

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json};
use futures::stream::Stream;
use tokio::sync::mpsc;

use crate::gateway::InferenceProvider;
use crate::metrics::{evaluate_health, SystemResourceMetrics};
use crate::orchestrator::Orchestrator;
use crate::streaming::{to_sse_data, StreamSink};
use crate::types::{KnownCorrection, QueryEnvelope, StreamEvent, UserId};

use super::types::{
    ErrorResponse, HealthResponse, IngestItem, IngestItemResult, IngestItemsRequest,
    IngestItemsResponse, MetricsResponse, QueryRequest, QueryResponse, QueryTimings, SourceRef,
};

/// Shared state the router hands every handler.
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub reasoning_provider: Arc<dyn InferenceProvider>,
    pub known_corrections: Vec<KnownCorrection>,
    pub start_time: Instant,
}

fn build_envelope(request: &QueryRequest) -> QueryEnvelope {
    QueryEnvelope::new(UserId(request.user_id.clone()), request.query.clone(), request.access_tier)
}

fn error_response(status: StatusCode, error_type: &str, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (status, Json(ErrorResponse { error: message.into(), error_type: error_type.into(), fatal: status.is_server_error() }))
}

/// `POST /query` — runs one query to completion and returns the final
/// answer plus the metadata a streaming client would otherwise receive
/// as a `metadata` event.
#[utoipa::path(
    post,
    path = "/query",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "Query answered", body = QueryResponse),
        (status = 500, description = "Query failed", body = ErrorResponse)
    )
)]
pub async fn query(State(state): State<Arc<AppState>>, Json(request): Json<QueryRequest>) -> impl IntoResponse {
    let envelope = build_envelope(&request);
    let started = Instant::now();
    let mut sources: Vec<SourceRef> = Vec::new();
    let mut timings = QueryTimings { retrieval_ms: 0, reasoning_ms: 0, total_ms: 0 };

    let mut on_event = |event: StreamEvent| {
        if let StreamEvent::Metadata { value, .. } = &event {
            if let Some(found) = value.get("sources") {
                sources = serde_json::from_value(found.clone()).unwrap_or_default();
            }
            if let Some(found) = value.get("timings") {
                if let Ok(parsed) = serde_json::from_value(found.clone()) {
                    timings = parsed;
                }
            }
        }
    };

    let result = state
        .orchestrator
        .handle_query(envelope, &state.known_corrections, state.reasoning_provider.clone(), &mut on_event)
        .await;

    match result {
        Ok((answer, usage)) => {
            timings.total_ms = started.elapsed().as_millis() as u64;
            Json(QueryResponse { answer, sources, timings, token_usage: usage, followup_questions: Vec::new() }).into_response()
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", e.to_string()).into_response(),
    }
}

/// `POST /stream` — same envelope as `/query`, framed as Server-Sent
/// Events, one `StreamEvent` JSON object per `data:` line.
pub async fn stream(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let envelope = build_envelope(&request);
    let (tx, rx) = mpsc::channel(64);

    tokio::spawn(async move {
        let mut sink = StreamSink::new(tx);
        let request_id = envelope.request_id;
        let mut on_event = |event: StreamEvent| sink.emit(event);

        if let Err(e) = state
            .orchestrator
            .handle_query(envelope, &state.known_corrections, state.reasoning_provider.clone(), &mut on_event)
            .await
        {
            on_event(StreamEvent::Error { request_id, code: "orchestrator_error".into(), message: e.to_string() });
        }
    });

    let events = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (Ok(Event::default().data(to_sse_data(&event))), rx))
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

/// `POST /ingest/items` — admin ingestion path for L5, the only write
/// surface this crate exposes outside the conversational one.
pub async fn ingest_items(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IngestItemsRequest>,
) -> impl IntoResponse {
    let mut results = Vec::with_capacity(request.items.len());

    for item in request.items {
        let IngestItem { title, collection, content } = item;
        let published = crate::types::PublishedItem {
            id: crate::types::DocumentId::new(),
            collection: crate::types::CollectionId::new(collection),
            title: title.clone(),
            content,
            keywords: Vec::new(),
            embedding: Vec::new(),
        };

        match state.orchestrator.ingest_item(published).await {
            Ok(crate::dedup::DuplicateVerdict::Unique) => {
                results.push(IngestItemResult { title, duplicate: false, similar_to: None });
            }
            Ok(crate::dedup::DuplicateVerdict::Duplicate { of, .. }) => {
                results.push(IngestItemResult { title, duplicate: true, similar_to: Some(of.to_string()) });
            }
            Err(e) => {
                tracing::warn!(error = %e, title = %title, "ingestion rejected");
                results.push(IngestItemResult { title, duplicate: false, similar_to: None });
            }
        }
    }

    Json(IngestItemsResponse { results })
}

/// `GET /health` — aggregated component status, per spec.md §6.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timestamp = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    let snapshot = state.orchestrator.metrics().snapshot(timestamp, SystemResourceMetrics::default());
    let report = evaluate_health(&snapshot);

    Json(HealthResponse {
        status: format!("{:?}", report.state).to_lowercase(),
        reasons: report.reasons,
        uptime_seconds: state.start_time.elapsed().as_secs(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /metrics` — a point-in-time counters snapshot; not a Prometheus
/// scrape endpoint, since no metrics-export wire format is mandated.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timestamp = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    let snapshot = state.orchestrator.metrics().snapshot(timestamp, SystemResourceMetrics::default());
    Json(MetricsResponse { snapshot: serde_json::to_value(snapshot).unwrap_or(serde_json::Value::Null) })
}

