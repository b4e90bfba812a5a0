//! Query complexity assessment.
//!
//! A weighted feature score over the raw query maps it to one of the four
//! complexity bands. The feature weights are runtime tunables.

use crate::config::ThinkingConfig;

use super::thought::Complexity;

const CONJUNCTIONS: &[&str] = &["and", "or", "but", "however", "also", "while", "whereas"];

const MULTI_STEP_CUES: &[&str] = &[
    "compare", "then", "why", "how", "if", "when", "versus", "after", "before", "trade-off",
    "tradeoff", "step",
];

const DOMAIN_KEYWORDS: &[&str] = &[
    "algorithm", "architecture", "protocol", "theorem", "derivative", "integral", "quantum",
    "distributed", "concurrency", "cryptography", "optimization", "complexity", "invariant",
];

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "of", "to", "in", "on", "for", "with", "at",
    "by", "from", "that", "this", "it", "as", "be", "do", "does", "did", "what", "which",
];

/// Classify a query into a complexity band.
pub fn assess(query: &str, config: &ThinkingConfig) -> Complexity {
    let lower = query.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();

    let length_feature = (words.len() as f64 / 12.0).min(3.0);
    let conjunctions = words
        .iter()
        .filter(|w| CONJUNCTIONS.contains(&w.trim_matches(|c: char| !c.is_alphanumeric())))
        .count() as f64;
    let cues = MULTI_STEP_CUES
        .iter()
        .filter(|cue| lower.contains(*cue))
        .count() as f64;
    let domain = DOMAIN_KEYWORDS
        .iter()
        .filter(|kw| lower.contains(*kw))
        .count() as f64;

    // Distinct content words stand in for noun phrases.
    let mut content: Vec<&str> = words
        .iter()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.len() > 3 && !STOPWORDS.contains(w))
        .collect();
    content.sort_unstable();
    content.dedup();
    let noun_feature = (content.len() as f64 / 4.0).min(3.0);

    let score = config.length_weight * length_feature
        + config.conjunction_weight * conjunctions
        + config.cue_weight * cues
        + config.noun_weight * noun_feature
        + config.domain_weight * domain;

    if score < 2.5 {
        Complexity::Simple
    } else if score < 5.5 {
        Complexity::Medium
    } else if score < 9.0 {
        Complexity::High
    } else {
        Complexity::Expert
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ThinkingConfig {
        ThinkingConfig::default()
    }

    #[test]
    fn test_short_lookup_is_simple() {
        assert_eq!(assess("capital of France", &config()), Complexity::Simple);
    }

    #[test]
    fn test_multi_step_question_is_at_least_medium() {
        let band = assess(
            "If a train leaves at 3pm and another leaves at 4pm, when do they meet?",
            &config(),
        );
        assert!(band != Complexity::Simple, "got {band:?}");
    }

    #[test]
    fn test_comparison_with_domain_terms_scores_high() {
        let band = assess(
            "Compare the concurrency architecture trade-offs of an actor protocol versus \
             shared-memory locking, and explain why distributed consensus changes the picture",
            &config(),
        );
        assert!(
            matches!(band, Complexity::High | Complexity::Expert),
            "got {band:?}"
        );
    }

    #[test]
    fn test_dense_technical_prompt_is_expert() {
        let band = assess(
            "Compare quantum cryptography protocols and distributed optimization algorithms, \
             then derive the complexity invariant for each architecture, explain why the \
             theorem holds when concurrency increases, and how the trade-off shifts if \
             the protocol changes after partition",
            &config(),
        );
        assert_eq!(band, Complexity::Expert);
    }

    #[test]
    fn test_weights_shift_the_band() {
        let mut heavy = config();
        heavy.cue_weight = 10.0;
        let simple_query = "why though";
        assert_ne!(assess(simple_query, &heavy), Complexity::Simple);
    }
}
