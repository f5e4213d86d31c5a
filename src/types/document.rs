//! Document, collection, and fact-store data shapes (L2–L4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::envelope::AccessTier;
use super::ids::{CollectionId, DocumentId, FactId, UserId};

/// A single retrievable unit ingested into a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub collection: CollectionId,
    pub title: String,
    pub content: String,
    pub source_url: Option<String>,
    pub access_tier: AccessTier,
    pub committed_at: DateTime<Utc>,
    pub content_hash: String,
}

/// One of the named domain collections the federated retriever fans
/// out across (immigration, tax, corporate).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    pub display_name: String,
    pub min_access_tier: AccessTier,
    pub document_count: usize,
}

/// A fact recorded into a single user's private memory partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    pub id: FactId,
    pub user_id: UserId,
    pub statement: String,
    pub source_request: Option<super::ids::RequestId>,
    pub recorded_at: DateTime<Utc>,
}

/// A fact promoted to the collective store after independent confirmation
/// from `source_count` distinct users/requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectiveFact {
    pub id: FactId,
    pub statement: String,
    pub content_hash: String,
    pub source_count: u32,
    pub promoted_at: Option<DateTime<Utc>>,
}

impl CollectiveFact {
    /// Whether this fact has accumulated enough independent confirmations
    /// to be promoted into the collective store (spec default: 3).
    pub fn is_promotable(&self, threshold: u32) -> bool {
        self.source_count >= threshold
    }
}

/// A correction or published clarification surfaced by the Calibrator
/// phase and made available for future queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnownCorrection {
    pub id: FactId,
    pub topic: String,
    pub correction: String,
    pub issued_at: DateTime<Utc>,
}

/// An item published out of the duplicate-suppression pipeline (L5) for
/// downstream ingestion — the unit that duplicate detection decides
/// whether to admit or drop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedItem {
    pub id: DocumentId,
    pub collection: CollectionId,
    pub title: String,
    pub content: String,
    pub keywords: Vec<String>,
    pub embedding: Vec<f32>,
}
