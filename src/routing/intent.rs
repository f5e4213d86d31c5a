//! T1: Intent Classifier.
//!
//! A deterministic, keyword-weighted classifier that picks which
//! collections the hybrid retriever should fan out across. Below the
//! confidence threshold it falls back to querying every collection
//! rather than guessing wrong and narrowing the search incorrectly.

use std::collections::HashMap;

use crate::types::CollectionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Greeting,
    Immigration,
    Tax,
    Corporate,
    General,
}

impl Intent {
    pub fn collection(&self) -> Option<&'static str> {
        match self {
            Intent::Immigration => Some("immigration"),
            Intent::Tax => Some("tax"),
            Intent::Corporate => Some("corporate"),
            Intent::Greeting | Intent::General => None,
        }
    }

    /// Stable name used to match against `early_exit_intents` config entries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::Immigration => "immigration",
            Intent::Tax => "tax",
            Intent::Corporate => "corporate",
            Intent::General => "general",
        }
    }
}

const GREETING_PHRASES: &[&str] = &["hi", "hello", "hey", "thanks", "thank you", "good morning", "good evening", "bye"];

#[derive(Debug, Clone)]
pub struct IntentClassification {
    pub intent: Intent,
    pub confidence: f32,
    pub target_collections: Vec<CollectionId>,
}

pub struct IntentClassifier {
    confidence_threshold: f32,
    keyword_weights: HashMap<Intent, Vec<&'static str>>,
    all_collections: Vec<CollectionId>,
}

impl IntentClassifier {
    pub fn new(all_collections: Vec<CollectionId>) -> Self {
        let mut keyword_weights = HashMap::new();
        keyword_weights.insert(
            Intent::Immigration,
            vec!["kitas", "kitap", "visa", "immigration", "sponsor", "permit", "passport", "deportation", "imigrasi"],
        );
        keyword_weights.insert(
            Intent::Tax,
            vec!["tax", "pph", "ppn", "npwp", "withholding", "vat", "pajak", "deduction", "filing"],
        );
        keyword_weights.insert(
            Intent::Corporate,
            vec!["pt pma", "company", "incorporation", "shareholder", "director", "corporate", "capital", "license", "oss"],
        );

        Self { confidence_threshold: 0.34, keyword_weights, all_collections }
    }

    pub fn classify(&self, query: &str) -> IntentClassification {
        let lower = query.to_lowercase();
        let trimmed = lower.trim().trim_end_matches(|c: char| c == '!' || c == '.' || c == '?');

        if GREETING_PHRASES.contains(&trimmed) {
            return IntentClassification { intent: Intent::Greeting, confidence: 1.0, target_collections: Vec::new() };
        }

        let mut scores: HashMap<Intent, f32> = HashMap::new();

        for (intent, keywords) in &self.keyword_weights {
            let hits = keywords.iter().filter(|kw| lower.contains(*kw)).count();
            if hits > 0 {
                scores.insert(*intent, hits as f32 / keywords.len() as f32);
            }
        }

        let best = scores.iter().max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal));

        match best {
            Some((intent, confidence)) if *confidence >= self.confidence_threshold => IntentClassification {
                intent: *intent,
                confidence: *confidence,
                target_collections: intent
                    .collection()
                    .map(|c| vec![CollectionId::new(c)])
                    .unwrap_or_else(|| self.all_collections.clone()),
            },
            _ => IntentClassification { intent: Intent::General, confidence: 0.0, target_collections: self.all_collections.clone() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> IntentClassifier {
        IntentClassifier::new(vec![
            CollectionId::new("immigration"),
            CollectionId::new("tax"),
            CollectionId::new("corporate"),
        ])
    }

    #[test]
    fn classifies_kitas_query_as_immigration() {
        let result = classifier().classify("How do I renew my KITAS before it expires?");
        assert_eq!(result.intent, Intent::Immigration);
        assert_eq!(result.target_collections, vec![CollectionId::new("immigration")]);
    }

    #[test]
    fn classifies_npwp_query_as_tax() {
        let result = classifier().classify("What is the deadline for NPWP annual PPh filing?");
        assert_eq!(result.intent, Intent::Tax);
    }

    #[test]
    fn low_confidence_falls_back_to_every_collection() {
        let result = classifier().classify("Tell me something interesting about Jakarta.");
        assert_eq!(result.intent, Intent::General);
        assert_eq!(result.target_collections.len(), 3);
    }

    #[test]
    fn classifies_a_bare_greeting_without_touching_collections() {
        let result = classifier().classify("hi");
        assert_eq!(result.intent, Intent::Greeting);
        assert!(result.target_collections.is_empty());

        let result = classifier().classify("Hello!");
        assert_eq!(result.intent, Intent::Greeting);
    }
}
