//! T4: Metrics & Health.
//!
//! A process-wide [`MetricsRegistry`] of atomic counters fed by the
//! gateway, retriever, dedup filter and reasoning loop, periodically
//! flattened into a [`MetricsSnapshot`] and handed to one or more
//! [`MetricsExporter`] backends (a JSON file written atomically, and/or
//! an OTLP collector behind the `otlp` feature).

pub mod file;
#[cfg(feature = "otlp")]
pub mod otlp;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metrics export failed: {0}")]
    ExportFailed(String),
    #[error("metrics configuration error: {0}")]
    ConfigError(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("metrics shutdown failed: {0}")]
    ShutdownFailed(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtlpProtocol {
    #[default]
    Grpc,
    HttpBinary,
    HttpJson,
}

/// OTLP exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtlpConfig {
    pub endpoint: String,
    #[serde(default)]
    pub protocol: OtlpProtocol,
    #[serde(default = "default_otlp_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_otlp_timeout() -> u64 {
    10
}

/// File-based metrics exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetricsConfig {
    pub path: PathBuf,
    #[serde(default = "default_pretty_print")]
    pub pretty_print: bool,
}

fn default_pretty_print() -> bool {
    true
}

impl Default for FileMetricsConfig {
    fn default() -> Self {
        Self { path: std::env::temp_dir().join("ragna_orchestrator_metrics.json"), pretty_print: true }
    }
}

/// Top-level metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_export_interval")]
    pub export_interval_seconds: u64,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_service_namespace")]
    pub service_namespace: String,
    /// Requires the `otlp` feature.
    pub otlp: Option<OtlpConfig>,
    pub file: Option<FileMetricsConfig>,
}

fn default_enabled() -> bool {
    true
}

fn default_export_interval() -> u64 {
    60
}

fn default_service_name() -> String {
    "ragna-orchestrator".to_string()
}

fn default_service_namespace() -> String {
    "ragna".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            export_interval_seconds: 60,
            service_name: default_service_name(),
            service_namespace: default_service_namespace(),
            otlp: None,
            file: Some(FileMetricsConfig::default()),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// Point-in-time snapshot of the orchestrator's operational counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: u64,
    pub gateway: GatewayMetrics,
    pub retrieval: RetrievalMetrics,
    pub dedup: DedupMetrics,
    pub reasoning: ReasoningMetrics,
    pub memory: MemoryMetrics,
    pub system: SystemResourceMetrics,
}

/// L1 Model Gateway counters: how much the fallback chain and the cost
/// cap actually had to intervene.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayMetrics {
    pub calls_total: u64,
    pub calls_succeeded: u64,
    pub fallback_count: u64,
    pub circuit_trips: u64,
    pub cost_cap_rejections: u64,
    pub total_cost_spent_usd: f64,
}

/// L2/L3 retrieval counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalMetrics {
    pub queries_total: u64,
    pub queries_degraded: u64,
    pub queries_failed: u64,
    pub average_latency_ms: f64,
}

/// L5 duplicate filter counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DedupMetrics {
    pub candidates_checked: u64,
    pub duplicates_rejected: u64,
}

/// M2 reasoning loop counters, broken down by termination reason.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReasoningMetrics {
    pub loops_started: u64,
    pub steps_total: u64,
    pub terminations_completed: u64,
    pub terminations_max_steps: u64,
    pub terminations_max_tokens: u64,
    pub terminations_error: u64,
}

/// L4 memory store counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub facts_recorded: u64,
    pub facts_promoted: u64,
    pub lock_timeouts: u64,
}

/// System resource usage, sampled at snapshot time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemResourceMetrics {
    pub memory_usage_mb: f64,
    pub cpu_usage_percent: f64,
}

// ---------------------------------------------------------------------------
// Registry: the live counters components increment during a request
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Counters {
    gateway_calls_total: AtomicU64,
    gateway_calls_succeeded: AtomicU64,
    gateway_fallback_count: AtomicU64,
    gateway_circuit_trips: AtomicU64,
    gateway_cost_cap_rejections: AtomicU64,
    gateway_cost_spent_micros_usd: AtomicU64,
    retrieval_queries_total: AtomicU64,
    retrieval_queries_degraded: AtomicU64,
    retrieval_queries_failed: AtomicU64,
    retrieval_latency_micros_total: AtomicU64,
    dedup_candidates_checked: AtomicU64,
    dedup_duplicates_rejected: AtomicU64,
    reasoning_loops_started: AtomicU64,
    reasoning_steps_total: AtomicU64,
    reasoning_terminations_completed: AtomicU64,
    reasoning_terminations_max_steps: AtomicU64,
    reasoning_terminations_max_tokens: AtomicU64,
    reasoning_terminations_error: AtomicU64,
    memory_facts_recorded: AtomicU64,
    memory_facts_promoted: AtomicU64,
    memory_lock_timeouts: AtomicU64,
}

/// Process-wide counters shared (via `Arc`) across the gateway, retriever,
/// dedup filter and reasoning loop. Cheap to increment on the hot path;
/// `snapshot()` flattens everything for export.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: Counters,
}

impl MetricsRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_gateway_call(&self, succeeded: bool, cost_usd: f64) {
        self.counters.gateway_calls_total.fetch_add(1, Ordering::Relaxed);
        if succeeded {
            self.counters.gateway_calls_succeeded.fetch_add(1, Ordering::Relaxed);
        }
        let micros = (cost_usd * 1_000_000.0).round() as u64;
        self.counters.gateway_cost_spent_micros_usd.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn record_gateway_fallback(&self) {
        self.counters.gateway_fallback_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_circuit_trip(&self) {
        self.counters.gateway_circuit_trips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cost_cap_rejection(&self) {
        self.counters.gateway_cost_cap_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retrieval(&self, degraded: bool, failed: bool, latency_micros: u64) {
        self.counters.retrieval_queries_total.fetch_add(1, Ordering::Relaxed);
        if degraded {
            self.counters.retrieval_queries_degraded.fetch_add(1, Ordering::Relaxed);
        }
        if failed {
            self.counters.retrieval_queries_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.counters.retrieval_latency_micros_total.fetch_add(latency_micros, Ordering::Relaxed);
    }

    pub fn record_dedup_check(&self, was_duplicate: bool) {
        self.counters.dedup_candidates_checked.fetch_add(1, Ordering::Relaxed);
        if was_duplicate {
            self.counters.dedup_duplicates_rejected.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_loop_started(&self) {
        self.counters.reasoning_loops_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_loop_step(&self) {
        self.counters.reasoning_steps_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_loop_termination(&self, reason: &crate::reasoning::TerminationReason) {
        use crate::reasoning::TerminationReason::*;
        match reason {
            Completed => self.counters.reasoning_terminations_completed.fetch_add(1, Ordering::Relaxed),
            MaxSteps => self.counters.reasoning_terminations_max_steps.fetch_add(1, Ordering::Relaxed),
            MaxTokens => self.counters.reasoning_terminations_max_tokens.fetch_add(1, Ordering::Relaxed),
            Error { .. } => self.counters.reasoning_terminations_error.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn record_fact_recorded(&self) {
        self.counters.memory_facts_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fact_promoted(&self) {
        self.counters.memory_facts_promoted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_memory_lock_timeout(&self) {
        self.counters.memory_lock_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Flattens the live counters into a point-in-time snapshot. `now`
    /// is passed in rather than sampled internally so callers control
    /// the clock source (and tests stay deterministic).
    pub fn snapshot(&self, timestamp: u64, system: SystemResourceMetrics) -> MetricsSnapshot {
        let c = &self.counters;
        let retrieval_total = c.retrieval_queries_total.load(Ordering::Relaxed);
        let average_latency_ms = if retrieval_total > 0 {
            (c.retrieval_latency_micros_total.load(Ordering::Relaxed) as f64 / retrieval_total as f64) / 1000.0
        } else {
            0.0
        };

        MetricsSnapshot {
            timestamp,
            gateway: GatewayMetrics {
                calls_total: c.gateway_calls_total.load(Ordering::Relaxed),
                calls_succeeded: c.gateway_calls_succeeded.load(Ordering::Relaxed),
                fallback_count: c.gateway_fallback_count.load(Ordering::Relaxed),
                circuit_trips: c.gateway_circuit_trips.load(Ordering::Relaxed),
                cost_cap_rejections: c.gateway_cost_cap_rejections.load(Ordering::Relaxed),
                total_cost_spent_usd: c.gateway_cost_spent_micros_usd.load(Ordering::Relaxed) as f64 / 1_000_000.0,
            },
            retrieval: RetrievalMetrics {
                queries_total: retrieval_total,
                queries_degraded: c.retrieval_queries_degraded.load(Ordering::Relaxed),
                queries_failed: c.retrieval_queries_failed.load(Ordering::Relaxed),
                average_latency_ms,
            },
            dedup: DedupMetrics {
                candidates_checked: c.dedup_candidates_checked.load(Ordering::Relaxed),
                duplicates_rejected: c.dedup_duplicates_rejected.load(Ordering::Relaxed),
            },
            reasoning: ReasoningMetrics {
                loops_started: c.reasoning_loops_started.load(Ordering::Relaxed),
                steps_total: c.reasoning_steps_total.load(Ordering::Relaxed),
                terminations_completed: c.reasoning_terminations_completed.load(Ordering::Relaxed),
                terminations_max_steps: c.reasoning_terminations_max_steps.load(Ordering::Relaxed),
                terminations_max_tokens: c.reasoning_terminations_max_tokens.load(Ordering::Relaxed),
                terminations_error: c.reasoning_terminations_error.load(Ordering::Relaxed),
            },
            memory: MemoryMetrics {
                facts_recorded: c.memory_facts_recorded.load(Ordering::Relaxed),
                facts_promoted: c.memory_facts_promoted.load(Ordering::Relaxed),
                lock_timeouts: c.memory_lock_timeouts.load(Ordering::Relaxed),
            },
            system,
        }
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Aggregated health used for `GET /health`. Degrades to `Degraded` once
/// any gateway circuit has tripped or a retrieval collection has failed
/// recently, and to `Unhealthy` once the gateway is no longer completing
/// any calls at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub state: HealthState,
    pub reasons: Vec<String>,
}

pub fn evaluate_health(snapshot: &MetricsSnapshot) -> HealthReport {
    let mut reasons = Vec::new();

    if snapshot.gateway.calls_total > 0 && snapshot.gateway.calls_succeeded == 0 {
        reasons.push("model gateway has not completed a single successful call".to_string());
        return HealthReport { state: HealthState::Unhealthy, reasons };
    }

    if snapshot.gateway.circuit_trips > 0 {
        reasons.push(format!("{} circuit breaker trip(s) recorded", snapshot.gateway.circuit_trips));
    }
    if snapshot.retrieval.queries_failed > 0 {
        reasons.push(format!("{} retrieval quer(y/ies) failed outright", snapshot.retrieval.queries_failed));
    }
    if snapshot.retrieval.queries_degraded > 0 {
        reasons.push(format!("{} retrieval quer(y/ies) degraded (partial collection failure)", snapshot.retrieval.queries_degraded));
    }

    let state = if reasons.is_empty() { HealthState::Healthy } else { HealthState::Degraded };
    HealthReport { state, reasons }
}

// ---------------------------------------------------------------------------
// Exporter trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait MetricsExporter: Send + Sync {
    async fn export(&self, snapshot: &MetricsSnapshot) -> Result<(), MetricsError>;
    async fn shutdown(&self) -> Result<(), MetricsError>;
}

// ---------------------------------------------------------------------------
// Composite exporter
// ---------------------------------------------------------------------------

/// Combines multiple exporters into a single exporter. All backends run on
/// every export; individual failures are logged but do not prevent other
/// backends from running.
pub struct CompositeExporter {
    exporters: Vec<Arc<dyn MetricsExporter>>,
}

impl CompositeExporter {
    pub fn new(exporters: Vec<Arc<dyn MetricsExporter>>) -> Self {
        Self { exporters }
    }
}

#[async_trait]
impl MetricsExporter for CompositeExporter {
    async fn export(&self, snapshot: &MetricsSnapshot) -> Result<(), MetricsError> {
        let mut last_error: Option<MetricsError> = None;
        for exporter in &self.exporters {
            if let Err(e) = exporter.export(snapshot).await {
                tracing::warn!("metrics exporter failed: {e}");
                last_error = Some(e);
            }
        }
        if self.exporters.len() == 1 {
            if let Some(e) = last_error {
                return Err(e);
            }
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), MetricsError> {
        let mut last_error: Option<MetricsError> = None;
        for exporter in &self.exporters {
            if let Err(e) = exporter.shutdown().await {
                tracing::warn!("metrics exporter shutdown failed: {e}");
                last_error = Some(e);
            }
        }
        if self.exporters.len() == 1 {
            if let Some(e) = last_error {
                return Err(e);
            }
        }
        Ok(())
    }
}

/// Build an exporter (or composite) from configuration.
pub fn create_exporter(config: &MetricsConfig) -> Result<Arc<dyn MetricsExporter>, MetricsError> {
    let mut exporters: Vec<Arc<dyn MetricsExporter>> = Vec::new();

    if let Some(ref file_cfg) = config.file {
        exporters.push(Arc::new(file::FileExporter::new(file_cfg.clone())?));
    }

    #[cfg(feature = "otlp")]
    if let Some(ref otlp_cfg) = config.otlp {
        let export_interval = std::time::Duration::from_secs(config.export_interval_seconds);
        exporters.push(Arc::new(otlp::OtlpExporter::new(
            otlp_cfg.clone(),
            &config.service_name,
            &config.service_namespace,
            export_interval,
        )?));
    }

    #[cfg(not(feature = "otlp"))]
    if config.otlp.is_some() {
        tracing::warn!("OTLP metrics configured but the `otlp` feature is not enabled; skipping");
    }

    if exporters.is_empty() {
        return Err(MetricsError::ConfigError("no metrics exporters configured".into()));
    }

    Ok(Arc::new(CompositeExporter::new(exporters)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoning::TerminationReason;

    #[test]
    fn snapshot_reflects_recorded_counters() {
        let registry = MetricsRegistry::new();
        registry.record_gateway_call(true, 0.02);
        registry.record_gateway_call(false, 0.0);
        registry.record_gateway_fallback();
        registry.record_circuit_trip();
        registry.record_retrieval(false, false, 4_000);
        registry.record_retrieval(true, false, 6_000);
        registry.record_dedup_check(true);
        registry.record_loop_started();
        registry.record_loop_step();
        registry.record_loop_termination(&TerminationReason::MaxSteps);
        registry.record_fact_recorded();

        let snapshot = registry.snapshot(1_700_000_000, SystemResourceMetrics::default());

        assert_eq!(snapshot.gateway.calls_total, 2);
        assert_eq!(snapshot.gateway.calls_succeeded, 1);
        assert_eq!(snapshot.gateway.fallback_count, 1);
        assert_eq!(snapshot.gateway.circuit_trips, 1);
        assert!((snapshot.gateway.total_cost_spent_usd - 0.02).abs() < 1e-9);
        assert_eq!(snapshot.retrieval.queries_total, 2);
        assert_eq!(snapshot.retrieval.queries_degraded, 1);
        assert!((snapshot.retrieval.average_latency_ms - 5.0).abs() < 1e-9);
        assert_eq!(snapshot.dedup.duplicates_rejected, 1);
        assert_eq!(snapshot.reasoning.terminations_max_steps, 1);
        assert_eq!(snapshot.memory.facts_recorded, 1);
    }

    #[test]
    fn health_is_degraded_once_a_circuit_trips() {
        let registry = MetricsRegistry::new();
        registry.record_gateway_call(true, 0.01);
        registry.record_circuit_trip();
        let snapshot = registry.snapshot(0, SystemResourceMetrics::default());
        let health = evaluate_health(&snapshot);
        assert_eq!(health.state, HealthState::Degraded);
        assert!(!health.reasons.is_empty());
    }

    #[test]
    fn health_is_unhealthy_when_every_gateway_call_fails() {
        let registry = MetricsRegistry::new();
        registry.record_gateway_call(false, 0.0);
        registry.record_gateway_call(false, 0.0);
        let snapshot = registry.snapshot(0, SystemResourceMetrics::default());
        assert_eq!(evaluate_health(&snapshot).state, HealthState::Unhealthy);
    }

    #[test]
    fn health_is_healthy_with_no_incidents() {
        let registry = MetricsRegistry::new();
        registry.record_gateway_call(true, 0.01);
        registry.record_retrieval(false, false, 1_000);
        let snapshot = registry.snapshot(0, SystemResourceMetrics::default());
        assert_eq!(evaluate_health(&snapshot).state, HealthState::Healthy);
    }
}
