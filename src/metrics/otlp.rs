//! OpenTelemetry OTLP metrics exporter.
//!
//! Records orchestrator metrics as OpenTelemetry gauge instruments and
//! exports them via gRPC or HTTP to any OTLP-compatible collector (e.g.
//! Prometheus, Grafana Alloy, Datadog, New Relic).

use super::{MetricsError, MetricsExporter, MetricsSnapshot, OtlpConfig, OtlpProtocol};
use async_trait::async_trait;
use opentelemetry::metrics::{Gauge, MeterProvider};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use std::time::Duration;

/// Holds all OpenTelemetry gauge instruments.
struct Instruments {
    // Gateway
    gw_calls_total: Gauge<f64>,
    gw_calls_succeeded: Gauge<f64>,
    gw_fallback_count: Gauge<f64>,
    gw_circuit_trips: Gauge<f64>,
    gw_cost_cap_rejections: Gauge<f64>,
    gw_cost_spent_usd: Gauge<f64>,
    // Retrieval
    ret_queries_total: Gauge<f64>,
    ret_queries_degraded: Gauge<f64>,
    ret_queries_failed: Gauge<f64>,
    ret_avg_latency_ms: Gauge<f64>,
    // Dedup
    dedup_candidates_checked: Gauge<f64>,
    dedup_duplicates_rejected: Gauge<f64>,
    // Reasoning
    rs_loops_started: Gauge<f64>,
    rs_steps_total: Gauge<f64>,
    rs_terminations_completed: Gauge<f64>,
    rs_terminations_max_steps: Gauge<f64>,
    rs_terminations_max_tokens: Gauge<f64>,
    rs_terminations_error: Gauge<f64>,
    // Memory
    mem_facts_recorded: Gauge<f64>,
    mem_facts_promoted: Gauge<f64>,
    // System
    system_memory_mb: Gauge<f64>,
    system_cpu_percent: Gauge<f64>,
}

/// Exports metrics via OpenTelemetry OTLP protocol.
pub struct OtlpExporter {
    provider: SdkMeterProvider,
    instruments: Instruments,
}

impl OtlpExporter {
    /// Create a new OTLP exporter from configuration.
    pub fn new(
        config: OtlpConfig,
        service_name: &str,
        service_namespace: &str,
        export_interval: Duration,
    ) -> Result<Self, MetricsError> {
        use opentelemetry::KeyValue;
        use opentelemetry_otlp::MetricExporter;
        use opentelemetry_sdk::metrics::PeriodicReader;
        use opentelemetry_sdk::Resource;

        let timeout = Duration::from_secs(config.timeout_seconds);

        let metric_exporter = match config.protocol {
            OtlpProtocol::Grpc => MetricExporter::builder()
                .with_tonic()
                .with_endpoint(&config.endpoint)
                .with_timeout(timeout)
                .build()
                .map_err(|e| {
                    MetricsError::ConfigError(format!("Failed to build gRPC OTLP exporter: {}", e))
                })?,
            OtlpProtocol::HttpBinary | OtlpProtocol::HttpJson => MetricExporter::builder()
                .with_http()
                .with_endpoint(&config.endpoint)
                .with_timeout(timeout)
                .build()
                .map_err(|e| {
                    MetricsError::ConfigError(format!("Failed to build HTTP OTLP exporter: {}", e))
                })?,
        };

        let reader = PeriodicReader::builder(metric_exporter)
            .with_interval(export_interval)
            .build();

        let resource = Resource::builder()
            .with_service_name(service_name.to_string())
            .with_attribute(KeyValue::new(
                "service.namespace",
                service_namespace.to_string(),
            ))
            .build();

        let provider = SdkMeterProvider::builder()
            .with_reader(reader)
            .with_resource(resource)
            .build();

        let meter = provider.meter("ragna.orchestrator");

        let instruments = Instruments {
            gw_calls_total: meter
                .f64_gauge("gateway.calls_total")
                .with_description("Total model gateway completion calls attempted")
                .build(),
            gw_calls_succeeded: meter
                .f64_gauge("gateway.calls_succeeded")
                .with_description("Model gateway calls that returned a response")
                .build(),
            gw_fallback_count: meter
                .f64_gauge("gateway.fallback_count")
                .with_description("Times the gateway skipped a provider whose circuit was open")
                .build(),
            gw_circuit_trips: meter
                .f64_gauge("gateway.circuit_trips")
                .with_description("Total circuit breaker trips across all providers")
                .build(),
            gw_cost_cap_rejections: meter
                .f64_gauge("gateway.cost_cap_rejections")
                .with_description("Calls refused due to the session cost cap")
                .build(),
            gw_cost_spent_usd: meter
                .f64_gauge("gateway.cost_spent_usd")
                .with_description("Cumulative estimated spend across completion calls")
                .build(),
            ret_queries_total: meter
                .f64_gauge("retrieval.queries_total")
                .with_description("Total hybrid retrieval queries run")
                .build(),
            ret_queries_degraded: meter
                .f64_gauge("retrieval.queries_degraded")
                .with_description("Queries that completed with one or more failed collections")
                .build(),
            ret_queries_failed: meter
                .f64_gauge("retrieval.queries_failed")
                .with_description("Queries where every collection failed")
                .build(),
            ret_avg_latency_ms: meter
                .f64_gauge("retrieval.average_latency_ms")
                .with_description("Average retrieval latency in milliseconds")
                .build(),
            dedup_candidates_checked: meter
                .f64_gauge("dedup.candidates_checked")
                .with_description("Candidate answers run through the duplicate filter")
                .build(),
            dedup_duplicates_rejected: meter
                .f64_gauge("dedup.duplicates_rejected")
                .with_description("Candidates flagged as duplicates")
                .build(),
            rs_loops_started: meter
                .f64_gauge("reasoning.loops_started")
                .with_description("Reasoning loops started")
                .build(),
            rs_steps_total: meter
                .f64_gauge("reasoning.steps_total")
                .with_description("Total reasoning loop steps executed")
                .build(),
            rs_terminations_completed: meter
                .f64_gauge("reasoning.terminations_completed")
                .with_description("Reasoning loops that ended with a response")
                .build(),
            rs_terminations_max_steps: meter
                .f64_gauge("reasoning.terminations_max_steps")
                .with_description("Reasoning loops that hit the step budget")
                .build(),
            rs_terminations_max_tokens: meter
                .f64_gauge("reasoning.terminations_max_tokens")
                .with_description("Reasoning loops that hit the token budget")
                .build(),
            rs_terminations_error: meter
                .f64_gauge("reasoning.terminations_error")
                .with_description("Reasoning loops that terminated on error")
                .build(),
            mem_facts_recorded: meter
                .f64_gauge("memory.facts_recorded")
                .with_description("Facts recorded into per-user memory")
                .build(),
            mem_facts_promoted: meter
                .f64_gauge("memory.facts_promoted")
                .with_description("Facts promoted into the collective store")
                .build(),
            system_memory_mb: meter
                .f64_gauge("system.memory_usage_mb")
                .with_description("System memory usage in megabytes")
                .build(),
            system_cpu_percent: meter
                .f64_gauge("system.cpu_usage_percent")
                .with_description("System CPU usage percentage")
                .build(),
        };

        tracing::info!(
            "OTLP metrics exporter initialized: endpoint={}, protocol={:?}",
            config.endpoint,
            config.protocol
        );

        Ok(Self { provider, instruments })
    }
}

#[async_trait]
impl MetricsExporter for OtlpExporter {
    async fn export(&self, snapshot: &MetricsSnapshot) -> Result<(), MetricsError> {
        let i = &self.instruments;

        i.gw_calls_total.record(snapshot.gateway.calls_total as f64, &[]);
        i.gw_calls_succeeded.record(snapshot.gateway.calls_succeeded as f64, &[]);
        i.gw_fallback_count.record(snapshot.gateway.fallback_count as f64, &[]);
        i.gw_circuit_trips.record(snapshot.gateway.circuit_trips as f64, &[]);
        i.gw_cost_cap_rejections.record(snapshot.gateway.cost_cap_rejections as f64, &[]);
        i.gw_cost_spent_usd.record(snapshot.gateway.total_cost_spent_usd, &[]);

        i.ret_queries_total.record(snapshot.retrieval.queries_total as f64, &[]);
        i.ret_queries_degraded.record(snapshot.retrieval.queries_degraded as f64, &[]);
        i.ret_queries_failed.record(snapshot.retrieval.queries_failed as f64, &[]);
        i.ret_avg_latency_ms.record(snapshot.retrieval.average_latency_ms, &[]);

        i.dedup_candidates_checked.record(snapshot.dedup.candidates_checked as f64, &[]);
        i.dedup_duplicates_rejected.record(snapshot.dedup.duplicates_rejected as f64, &[]);

        i.rs_loops_started.record(snapshot.reasoning.loops_started as f64, &[]);
        i.rs_steps_total.record(snapshot.reasoning.steps_total as f64, &[]);
        i.rs_terminations_completed.record(snapshot.reasoning.terminations_completed as f64, &[]);
        i.rs_terminations_max_steps.record(snapshot.reasoning.terminations_max_steps as f64, &[]);
        i.rs_terminations_max_tokens.record(snapshot.reasoning.terminations_max_tokens as f64, &[]);
        i.rs_terminations_error.record(snapshot.reasoning.terminations_error as f64, &[]);

        i.mem_facts_recorded.record(snapshot.memory.facts_recorded as f64, &[]);
        i.mem_facts_promoted.record(snapshot.memory.facts_promoted as f64, &[]);

        i.system_memory_mb.record(snapshot.system.memory_usage_mb, &[]);
        i.system_cpu_percent.record(snapshot.system.cpu_usage_percent, &[]);

        tracing::trace!("recorded metrics snapshot to OTLP gauges");
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), MetricsError> {
        self.provider.shutdown().map_err(|e| {
            MetricsError::ShutdownFailed(format!("OTLP meter provider shutdown failed: {}", e))
        })
    }
}
