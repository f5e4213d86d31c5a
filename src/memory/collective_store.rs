//! Collective fact store.
//!
//! Facts observed across independent users accumulate a source count keyed
//! by content hash; once `promotion_threshold` distinct *users* confirm the
//! same statement, it promotes into the shared store other users'
//! retrieval can draw on. Confirmations are deduped by user, not by
//! request — one user re-asking the same question many times cannot
//! single-handedly promote a fact.

use dashmap::DashMap;
use sha2::{Digest, Sha256};

use crate::types::{CollectiveFact, FactId, UserId};

pub struct CollectiveStore {
    facts: DashMap<String, CollectiveFact>,
    confirmations: DashMap<String, std::collections::HashSet<UserId>>,
    promotion_threshold: u32,
}

fn content_hash(statement: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(statement.trim().to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}

impl CollectiveStore {
    pub fn new(promotion_threshold: u32) -> Self {
        Self { facts: DashMap::new(), confirmations: DashMap::new(), promotion_threshold }
    }

    /// Records one independent confirmation of `statement` from
    /// `source_user`. Confirmations from the same user never count twice
    /// toward the threshold, no matter how many requests they make.
    /// Returns the fact as it stands after this confirmation, promoted if
    /// the threshold was just reached.
    pub fn confirm(&self, statement: &str, source_user: &UserId) -> CollectiveFact {
        let hash = content_hash(statement);

        let mut seen = self.confirmations.entry(hash.clone()).or_default();
        seen.insert(source_user.clone());
        let source_count = seen.len() as u32;
        drop(seen);

        let mut fact = self.facts.entry(hash.clone()).or_insert_with(|| CollectiveFact {
            id: FactId::new(),
            statement: statement.to_string(),
            content_hash: hash.clone(),
            source_count: 0,
            promoted_at: None,
        });

        fact.source_count = source_count;
        if fact.promoted_at.is_none() && fact.is_promotable(self.promotion_threshold) {
            fact.promoted_at = Some(chrono::Utc::now());
        }

        fact.clone()
    }

    pub fn promoted_facts(&self) -> Vec<CollectiveFact> {
        self.facts.iter().filter(|f| f.promoted_at.is_some()).map(|f| f.clone()).collect()
    }
}
