//! T1: Intent Classifier — decides which collections a query's retrieval
//! should target before L2's hybrid search runs.

mod intent;

pub use intent::{Intent, IntentClassification, IntentClassifier};
