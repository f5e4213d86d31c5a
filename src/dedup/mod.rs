//! L5: Duplicate Filter — a two-layer gate in front of publication into a
//! collection. A cheap keyword-Jaccard prefilter rejects obvious repeats
//! without touching the embedding service; anything that survives gets a
//! semantic cosine-similarity check against recent admissions.

mod jaccard;
mod semantic;

pub use jaccard::jaccard_similarity;
pub use semantic::{DuplicateVerdict, SemanticDuplicateFilter};
