//! Rule-based query intent analysis and expansion.
//!
//! A small keyword rule set tags the query with intents and emits
//! expansion strings (synonyms plus intent-specific keyphrases) that the
//! engine retrieves against alongside the original query.

use serde::Serialize;

/// Detected query intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryIntent {
    How,
    Why,
    Compare,
    Define,
    Troubleshoot,
    Code,
}

impl QueryIntent {
    /// Keyphrases whose presence in a snippet earns the intent bonus.
    pub fn keyphrases(&self) -> &'static [&'static str] {
        match self {
            QueryIntent::How => &["steps", "guide", "usage", "configure", "setup"],
            QueryIntent::Why => &["because", "reason", "rationale", "design", "tradeoff"],
            QueryIntent::Compare => &["versus", "difference", "alternative", "instead"],
            QueryIntent::Define => &["definition", "means", "refers", "overview"],
            QueryIntent::Troubleshoot => &["error", "fix", "failure", "debug", "workaround"],
            QueryIntent::Code => &["example", "snippet", "function", "api", "signature"],
        }
    }
}

/// The analysis result: intents plus expansion queries.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryAnalysis {
    pub intents: Vec<QueryIntent>,
    pub expansions: Vec<String>,
}

/// Synonym table applied term-by-term to build expansions.
const SYNONYMS: &[(&str, &str)] = &[
    ("build", "compile"),
    ("error", "failure"),
    ("fix", "resolve"),
    ("fast", "performance"),
    ("config", "configuration"),
    ("setup", "install"),
    ("delete", "remove"),
    ("create", "add"),
    ("use", "usage"),
];

/// Analyze a query: detect intent tags and produce expansions.
///
/// Expansion order is deterministic: synonym rewrites first (in query
/// order), then one keyphrase expansion per detected intent.
pub fn analyze(query: &str) -> QueryAnalysis {
    let lower = query.to_lowercase();
    let mut intents = Vec::new();

    let mut tag = |intent: QueryIntent, hit: bool| {
        if hit && !intents.contains(&intent) {
            intents.push(intent);
        }
    };

    tag(
        QueryIntent::How,
        lower.starts_with("how") || lower.contains("how to") || lower.contains("how do"),
    );
    tag(QueryIntent::Why, lower.starts_with("why") || lower.contains("why "));
    tag(
        QueryIntent::Compare,
        lower.contains(" vs ")
            || lower.contains("versus")
            || lower.contains("compare")
            || lower.contains("difference between"),
    );
    tag(
        QueryIntent::Define,
        lower.starts_with("what is")
            || lower.starts_with("what are")
            || lower.contains("define")
            || lower.contains("meaning of"),
    );
    tag(
        QueryIntent::Troubleshoot,
        lower.contains("error")
            || lower.contains("fail")
            || lower.contains("broken")
            || lower.contains("not working")
            || lower.contains("crash"),
    );
    tag(
        QueryIntent::Code,
        lower.contains("code")
            || lower.contains("example")
            || lower.contains("function")
            || lower.contains("snippet")
            || lower.contains("api"),
    );

    let mut expansions = Vec::new();
    for (term, synonym) in SYNONYMS {
        if lower.split_whitespace().any(|w| w == *term) {
            let rewritten = lower
                .split_whitespace()
                .map(|w| if w == *term { *synonym } else { w })
                .collect::<Vec<_>>()
                .join(" ");
            if rewritten != lower {
                expansions.push(rewritten);
            }
        }
    }
    for intent in &intents {
        // One keyphrase-augmented expansion per intent keeps the source
        // count bounded.
        let phrase = intent.keyphrases()[0];
        expansions.push(format!("{lower} {phrase}"));
    }
    expansions.dedup();

    QueryAnalysis { intents, expansions }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_how_queries_are_tagged() {
        let analysis = analyze("How to configure the retry policy?");
        assert!(analysis.intents.contains(&QueryIntent::How));
    }

    #[test]
    fn test_compare_and_define_detection() {
        assert!(analyze("redis vs memcached")
            .intents
            .contains(&QueryIntent::Compare));
        assert!(analyze("What is a context bundle?")
            .intents
            .contains(&QueryIntent::Define));
    }

    #[test]
    fn test_troubleshoot_and_code_detection() {
        let analysis = analyze("why does the build error with a code example attached");
        assert!(analysis.intents.contains(&QueryIntent::Why));
        assert!(analysis.intents.contains(&QueryIntent::Troubleshoot));
        assert!(analysis.intents.contains(&QueryIntent::Code));
    }

    #[test]
    fn test_synonym_expansion_rewrites_terms() {
        let analysis = analyze("fix the build");
        assert!(analysis
            .expansions
            .iter()
            .any(|e| e.contains("resolve") || e.contains("compile")));
    }

    #[test]
    fn test_plain_query_has_no_intents() {
        let analysis = analyze("weather in lisbon");
        assert!(analysis.intents.is_empty());
        assert!(analysis.expansions.is_empty());
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let a = analyze("how to fix the error in the api code");
        let b = analyze("how to fix the error in the api code");
        assert_eq!(a.expansions, b.expansions);
        assert_eq!(a.intents, b.intents);
    }
}
