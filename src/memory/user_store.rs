//! Per-user fact store.
//!
//! Writes for a single user are serialized through a keyed mutex so two
//! concurrent requests from the same user can't interleave appends, while
//! writes for different users never block each other. Acquiring that
//! mutex is bounded by a deadline — a wedged writer fails the waiter
//! loudly instead of hanging the request — and concurrent readers of one
//! user's partition are capped by a semaphore so a burst of reads can't
//! starve the writer.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, Semaphore};

use crate::metrics::MetricsRegistry;
use crate::types::{Fact, FactId, MemoryError, RequestId, UserId};

struct Partition {
    facts: Mutex<Vec<Fact>>,
    read_gate: Semaphore,
}

impl Partition {
    fn new(read_concurrency: usize) -> Self {
        Self { facts: Mutex::new(Vec::new()), read_gate: Semaphore::new(read_concurrency) }
    }
}

pub struct UserMemoryStore {
    partitions: DashMap<UserId, Arc<Partition>>,
    lock_timeout: Duration,
    read_concurrency: usize,
    metrics: Arc<MetricsRegistry>,
}

impl UserMemoryStore {
    pub fn new() -> Self {
        Self {
            partitions: DashMap::new(),
            lock_timeout: Duration::from_secs(5),
            read_concurrency: 10,
            metrics: MetricsRegistry::new(),
        }
    }

    pub fn with_limits(lock_timeout: Duration, read_concurrency: usize) -> Self {
        Self { partitions: DashMap::new(), lock_timeout, read_concurrency, metrics: MetricsRegistry::new() }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    fn partition(&self, user_id: &UserId) -> Arc<Partition> {
        self.partitions.entry(user_id.clone()).or_insert_with(|| Arc::new(Partition::new(self.read_concurrency))).clone()
    }

    /// Appends one fact to `user_id`'s partition. Waits up to
    /// `lock_timeout` for the per-user write lock before giving up with
    /// `MemoryError::LockTimeout`.
    pub async fn record(
        &self,
        user_id: &UserId,
        statement: impl Into<String>,
        source_request: Option<RequestId>,
    ) -> Result<Fact, MemoryError> {
        let partition = self.partition(user_id);
        let mut facts = self.acquire_write(user_id, &partition).await?;
        let fact = Fact {
            id: FactId::new(),
            user_id: user_id.clone(),
            statement: statement.into(),
            source_request,
            recorded_at: chrono::Utc::now(),
        };
        facts.push(fact.clone());
        Ok(fact)
    }

    /// Reads `user_id`'s facts, admitted through the bounded read gate.
    /// Returns an empty vector for a user with no partition yet rather
    /// than creating one just to read it.
    pub async fn facts_for(&self, user_id: &UserId) -> Vec<Fact> {
        let partition = match self.partitions.get(user_id) {
            Some(partition) => partition.clone(),
            None => return Vec::new(),
        };
        let _permit = partition.read_gate.acquire().await.expect("read_gate semaphore is never closed");
        partition.facts.lock().await.clone()
    }

    async fn acquire_write<'a>(
        &self,
        user_id: &UserId,
        partition: &'a Arc<Partition>,
    ) -> Result<tokio::sync::MutexGuard<'a, Vec<Fact>>, MemoryError> {
        match tokio::time::timeout(self.lock_timeout, partition.facts.lock()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                self.metrics.record_memory_lock_timeout();
                Err(MemoryError::LockTimeout { user_id: user_id.to_string(), timeout_ms: self.lock_timeout.as_millis() as u64 })
            }
        }
    }
}

impl Default for UserMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn facts_are_partitioned_per_user() {
        let store = UserMemoryStore::new();
        let alice = UserId("alice".into());
        let bob = UserId("bob".into());

        store.record(&alice, "alice's KITAS expires in March", None).await.unwrap();
        store.record(&bob, "bob filed PPh 21 last quarter", None).await.unwrap();

        assert_eq!(store.facts_for(&alice).await.len(), 1);
        assert_eq!(store.facts_for(&bob).await.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_writes_for_same_user_do_not_drop_entries() {
        let store = Arc::new(UserMemoryStore::new());
        let user = UserId("alice".into());

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            let user = user.clone();
            handles.push(tokio::spawn(async move {
                store.record(&user, format!("fact {i}"), None).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(store.facts_for(&user).await.len(), 20);
    }

    #[tokio::test]
    async fn write_lock_timeout_surfaces_as_memory_error_and_increments_the_counter() {
        let metrics = MetricsRegistry::new();
        let store = UserMemoryStore::with_limits(Duration::from_millis(20), 10).with_metrics(metrics.clone());
        let user = UserId("alice".into());

        let partition = store.partition(&user);
        let guard = partition.facts.lock().await;

        let result = store.record(&user, "should time out", None).await;
        assert!(matches!(result, Err(MemoryError::LockTimeout { .. })));
        drop(guard);

        let snapshot = metrics.snapshot(0, Default::default());
        assert_eq!(snapshot.memory.lock_timeouts, 1);
    }

    #[tokio::test]
    async fn reads_are_bounded_by_the_configured_concurrency() {
        let store = UserMemoryStore::with_limits(Duration::from_secs(5), 2);
        let user = UserId("alice".into());
        store.record(&user, "fact", None).await.unwrap();

        let partition = store.partition(&user);
        assert_eq!(partition.read_gate.available_permits(), 2);

        let _p1 = partition.read_gate.try_acquire().unwrap();
        let _p2 = partition.read_gate.try_acquire().unwrap();
        assert!(partition.read_gate.try_acquire().is_err());
    }
}
