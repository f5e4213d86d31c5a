//! Keyword overlap-coefficient prefilter: the cheap first layer of L5.

use std::collections::HashSet;

fn keyword_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(|t| t.to_string())
        .collect()
}

/// Overlap coefficient of two texts' keyword sets — `|A ∩ B| / min(|A|, |B|)`
/// — in `[0.0, 1.0]`. Named `jaccard_similarity` for historical reasons but
/// deliberately *not* true Jaccard (`|A ∩ B| / |A ∪ B|`): the denominator is
/// the smaller set, not the union, so a short title fully contained in a
/// longer one still scores 1.0 rather than being diluted by the longer
/// title's extra keywords.
pub fn jaccard_similarity(a: &str, b: &str) -> f32 {
    let set_a = keyword_set(a);
    let set_b = keyword_set(b);
    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    let intersection = set_a.intersection(&set_b).count() as f32;
    let min_size = set_a.len().min(set_b.len()) as f32;
    if min_size == 0.0 {
        0.0
    } else {
        intersection / min_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_has_similarity_one() {
        let text = "KITAS renewal requires a valid sponsor letter";
        assert_eq!(jaccard_similarity(text, text), 1.0);
    }

    #[test]
    fn unrelated_text_has_low_similarity() {
        let a = "KITAS renewal requires a valid sponsor letter";
        let b = "corporate income tax article 21 withholding schedule";
        assert!(jaccard_similarity(a, b) < 0.2);
    }

    #[test]
    fn near_duplicate_text_has_high_similarity() {
        let a = "KITAS renewal requires a valid sponsor letter and passport";
        let b = "KITAS renewal requires a valid sponsor letter and a passport";
        assert!(jaccard_similarity(a, b) > 0.8);
    }
}
