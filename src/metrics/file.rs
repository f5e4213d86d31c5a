//! File-based metrics exporter.
//!
//! Writes JSON snapshots atomically using `tempfile` + rename to prevent
//! partial reads by monitoring tools. The write path is deliberately
//! domain-agnostic — it serializes whatever `MetricsSnapshot` the
//! registry hands it, so this file carries no gateway/retrieval/dedup
//! knowledge of its own; that lives in `MetricsSnapshot` and the
//! `Counters` it's built from.

use super::{FileMetricsConfig, MetricsError, MetricsExporter, MetricsSnapshot};
use async_trait::async_trait;
use std::path::PathBuf;

/// Exports metrics snapshots as JSON files using atomic writes.
pub struct FileExporter {
    path: PathBuf,
    pretty_print: bool,
}

impl FileExporter {
    /// Create a new file exporter, ensuring the parent directory exists.
    pub fn new(config: FileMetricsConfig) -> Result<Self, MetricsError> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MetricsError::ConfigError(format!(
                    "Failed to create metrics directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        Ok(Self {
            path: config.path,
            pretty_print: config.pretty_print,
        })
    }
}

#[async_trait]
impl MetricsExporter for FileExporter {
    async fn export(&self, snapshot: &MetricsSnapshot) -> Result<(), MetricsError> {
        let json = if self.pretty_print {
            serde_json::to_string_pretty(snapshot)?
        } else {
            serde_json::to_string(snapshot)?
        };

        let path = self.path.clone();

        // Perform the atomic write on a blocking thread to avoid blocking the runtime.
        tokio::task::spawn_blocking(move || -> Result<(), MetricsError> {
            use std::io::Write;

            let parent = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
            tmp.write_all(json.as_bytes())?;
            tmp.flush()?;
            tmp.persist(&path).map_err(|e| {
                MetricsError::ExportFailed(format!(
                    "Failed to persist metrics file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            Ok(())
        })
        .await
        .map_err(|e| MetricsError::ExportFailed(format!("Blocking task panicked: {}", e)))??;

        tracing::debug!("Metrics snapshot written to {}", self.path.display());
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), MetricsError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{
        DedupMetrics, GatewayMetrics, MemoryMetrics, ReasoningMetrics, RetrievalMetrics,
        SystemResourceMetrics,
    };

    fn sample_snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: 1700000000,
            gateway: GatewayMetrics {
                calls_total: 10,
                calls_succeeded: 9,
                fallback_count: 2,
                circuit_trips: 1,
                cost_cap_rejections: 0,
                total_cost_spent_usd: 0.42,
            },
            retrieval: RetrievalMetrics {
                queries_total: 5,
                queries_degraded: 1,
                queries_failed: 0,
                average_latency_ms: 120.0,
            },
            dedup: DedupMetrics { candidates_checked: 8, duplicates_rejected: 2 },
            reasoning: ReasoningMetrics {
                loops_started: 5,
                steps_total: 14,
                terminations_completed: 4,
                terminations_max_steps: 1,
                terminations_max_tokens: 0,
                terminations_error: 0,
            },
            memory: MemoryMetrics { facts_recorded: 5, facts_promoted: 1, lock_timeouts: 0 },
            system: SystemResourceMetrics { memory_usage_mb: 512.0, cpu_usage_percent: 30.0 },
        }
    }

    #[tokio::test]
    async fn test_file_exporter_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");

        let exporter = FileExporter::new(FileMetricsConfig {
            path: path.clone(),
            pretty_print: true,
        })
        .unwrap();

        let snapshot = sample_snapshot();
        exporter.export(&snapshot).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: MetricsSnapshot = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.timestamp, 1700000000);
        assert_eq!(loaded.gateway.calls_succeeded, 9);
    }

    #[tokio::test]
    async fn test_file_exporter_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deep").join("metrics.json");

        let exporter = FileExporter::new(FileMetricsConfig {
            path: path.clone(),
            pretty_print: false,
        })
        .unwrap();

        let snapshot = sample_snapshot();
        exporter.export(&snapshot).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_file_exporter_compact_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("compact.json");

        let exporter = FileExporter::new(FileMetricsConfig {
            path: path.clone(),
            pretty_print: false,
        })
        .unwrap();

        let snapshot = sample_snapshot();
        exporter.export(&snapshot).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        // Compact JSON contains no newlines.
        assert!(!content.trim().contains('\n'));
    }

    #[tokio::test]
    async fn test_file_exporter_writes_a_live_registry_snapshot() {
        use crate::metrics::MetricsRegistry;

        let registry = MetricsRegistry::new();
        registry.record_fact_recorded();
        registry.record_fact_recorded();
        registry.record_fact_promoted();
        registry.record_memory_lock_timeout();
        let snapshot = registry.snapshot(1700000002, SystemResourceMetrics::default());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.json");
        let exporter = FileExporter::new(FileMetricsConfig { path: path.clone(), pretty_print: false }).unwrap();
        exporter.export(&snapshot).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: MetricsSnapshot = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.memory.facts_recorded, 2);
        assert_eq!(loaded.memory.facts_promoted, 1);
        assert_eq!(loaded.memory.lock_timeouts, 1);
    }

    #[tokio::test]
    async fn test_file_exporter_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shutdown.json");

        let exporter = FileExporter::new(FileMetricsConfig {
            path,
            pretty_print: true,
        })
        .unwrap();

        assert!(exporter.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn test_file_exporter_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overwrite.json");

        let exporter = FileExporter::new(FileMetricsConfig {
            path: path.clone(),
            pretty_print: false,
        })
        .unwrap();

        let mut snapshot = sample_snapshot();
        exporter.export(&snapshot).await.unwrap();

        // Overwrite with different data.
        snapshot.timestamp = 1700000001;
        snapshot.gateway.calls_total = 42;
        exporter.export(&snapshot).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: MetricsSnapshot = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.timestamp, 1700000001);
        assert_eq!(loaded.gateway.calls_total, 42);
    }
}
