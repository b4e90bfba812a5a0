//! Baseline retrieval over the knowledge corpus.
//!
//! Thin cosine top-k wrapper plus the candidate/bundle types shared with
//! the Context7 engine and the coordinator.

use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;
use crate::knowledge::Corpus;

/// Rough token estimate for budget accounting: one token per four chars.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// A scored retrieval result.
#[derive(Debug, Clone, Serialize)]
pub struct ContextCandidate {
    pub source_id: String,
    pub snippet: String,
    pub base_relevance: f32,
    pub intent_bonus: f32,
    pub recency_bonus: f32,
    pub cluster_bonus: f32,
    /// Cluster assignment, once clustering has run.
    pub cluster: Option<usize>,
    pub final_score: f32,
}

impl ContextCandidate {
    pub fn new(source_id: String, snippet: String, base_relevance: f32) -> Self {
        Self {
            source_id,
            snippet,
            base_relevance,
            intent_bonus: 0.0,
            recency_bonus: 0.0,
            cluster_bonus: 0.0,
            cluster: None,
            final_score: base_relevance,
        }
    }

    pub fn token_estimate(&self) -> usize {
        estimate_tokens(&self.snippet)
    }
}

/// The selected candidates handed to the reasoning engine.
///
/// Invariants: no two entries share `(source_id, snippet)` and the total
/// token estimate stays within the configured budget.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContextBundle {
    pub entries: Vec<ContextCandidate>,
    pub token_estimate: usize,
}

impl ContextBundle {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Add a candidate unless it duplicates an existing `(source, snippet)`
    /// pair or would blow the budget. Returns whether it was added.
    pub fn push_within(&mut self, candidate: ContextCandidate, budget: usize) -> bool {
        let duplicate = self
            .entries
            .iter()
            .any(|e| e.source_id == candidate.source_id && e.snippet == candidate.snippet);
        if duplicate {
            return false;
        }
        let cost = candidate.token_estimate();
        if self.token_estimate + cost > budget {
            return false;
        }
        self.token_estimate += cost;
        self.entries.push(candidate);
        true
    }

    /// Distinct source ids in the bundle.
    pub fn distinct_sources(&self) -> usize {
        let mut ids: Vec<&str> = self.entries.iter().map(|e| e.source_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }
}

/// Cosine top-k retriever over the corpus (C3). Stateless beyond its corpus
/// reference.
#[derive(Clone)]
pub struct BaselineRetriever {
    corpus: Arc<Corpus>,
}

impl BaselineRetriever {
    pub fn new(corpus: Arc<Corpus>) -> Self {
        Self { corpus }
    }

    pub fn corpus(&self) -> &Arc<Corpus> {
        &self.corpus
    }

    /// Top-k candidates with base relevance = cosine score.
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ContextCandidate>> {
        Ok(self
            .corpus
            .search(query, k)
            .into_iter()
            .map(|hit| ContextCandidate::new(hit.doc_id, hit.snippet, hit.score))
            .collect())
    }
}

// ============================================================================
// TESTS
// ============================================================================
