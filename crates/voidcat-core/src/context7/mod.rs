//! Context7 engine.
//!
//! Produces a higher-quality context bundle than raw top-k by combining
//! three signals: lexical similarity, intent-matched query expansion, and
//! cluster coherence. Selection is adaptive under a token budget and fully
//! deterministic so the same query over the same corpus yields the same
//! bundle.

mod intent;

pub use intent::{analyze, QueryAnalysis, QueryIntent};

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Context7Config;
use crate::knowledge::SparseVector;
use crate::retrieval::{BaselineRetriever, ContextBundle, ContextCandidate};

/// Per-candidate score breakdown kept for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateBreakdown {
    pub source_id: String,
    pub base_relevance: f32,
    pub intent_bonus: f32,
    pub recency_bonus: f32,
    pub cluster_bonus: f32,
    pub final_score: f32,
    pub cluster: usize,
    /// Why the candidate was (not) selected.
    pub outcome: &'static str,
}

/// Analytics record emitted alongside every bundle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SelectionAnalytics {
    pub candidates: Vec<CandidateBreakdown>,
    pub cluster_count: usize,
    pub sources_consulted: usize,
    pub sources_failed: usize,
    /// Set when every retrieval source failed; the coordinator falls back.
    pub all_sources_failed: bool,
}

/// Multi-source, cluster-coherent context selection (C4).
pub struct Context7Engine {
    retriever: BaselineRetriever,
}

impl Context7Engine {
    pub fn new(retriever: BaselineRetriever) -> Self {
        Self { retriever }
    }

    /// Gather, score, cluster, and adaptively select context for a query.
    pub fn gather(
        &self,
        query: &str,
        user_context: Option<&str>,
        config: &Context7Config,
    ) -> (ContextBundle, SelectionAnalytics) {
        let analysis = intent::analyze(query);

        // -- Multi-source gathering --------------------------------------
        let mut sources: Vec<String> = vec![query.to_string()];
        sources.extend(
            analysis
                .expansions
                .iter()
                .take(config.max_sources.saturating_sub(1))
                .cloned(),
        );
        if let Some(context) = user_context {
            if !context.trim().is_empty() {
                sources.push(context.to_string());
            }
        }

        let mut merged: Vec<ContextCandidate> = Vec::new();
        let mut failed = 0usize;
        for source in &sources {
            match self.retriever.retrieve(source, config.per_source_quota) {
                Ok(candidates) => {
                    for candidate in candidates {
                        let duplicate = merged.iter().any(|c| {
                            c.source_id == candidate.source_id && c.snippet == candidate.snippet
                        });
                        if !duplicate {
                            merged.push(candidate);
                        }
                    }
                }
                Err(error) => {
                    warn!(%error, source, "context source failed, skipping");
                    failed += 1;
                }
            }
        }

        let mut analytics = SelectionAnalytics {
            sources_consulted: sources.len(),
            sources_failed: failed,
            all_sources_failed: failed == sources.len(),
            ..Default::default()
        };
        if merged.is_empty() {
            debug!("context7 produced no candidates");
            return (ContextBundle::default(), analytics);
        }

        // -- Scoring ------------------------------------------------------
        let corpus = self.retriever.corpus();
        let newest = corpus.newest_modified();
        for candidate in &mut merged {
            let snippet_lower = candidate.snippet.to_lowercase();
            let intent_hit = analysis
                .intents
                .iter()
                .any(|i| i.keyphrases().iter().any(|p| snippet_lower.contains(p)));
            if intent_hit {
                candidate.intent_bonus = config.intent_weight;
            }

            // Recency relative to the newest document, so scoring does not
            // depend on wall clock.
            if let (Some(modified), Some(newest)) = (corpus.modified(&candidate.source_id), newest)
            {
                let age_days = (newest - modified).num_days().max(0) as f32;
                candidate.recency_bonus = config.recency_weight / (1.0 + age_days / 30.0);
            }
        }

        // -- Clustering ---------------------------------------------------
        let vectors: Vec<SparseVector> =
            merged.iter().map(|c| corpus.vectorize(&c.snippet)).collect();
        let clusters = single_link_clusters(&vectors, config.cluster_threshold);
        let coherence = cluster_coherence(&vectors, &clusters);
        analytics.cluster_count = coherence.len();

        for (index, candidate) in merged.iter_mut().enumerate() {
            let cluster = clusters[index];
            candidate.cluster = Some(cluster);
            candidate.cluster_bonus = config.cluster_weight * coherence[&cluster];
            candidate.final_score = candidate.base_relevance
                + candidate.intent_bonus
                + candidate.recency_bonus
                + candidate.cluster_bonus;
        }

        // -- Adaptive selection ------------------------------------------
        // Ties break on (coherence desc, source id asc, snippet asc) so the
        // ordering is total and reruns are identical.
        merged.sort_by(|a, b| {
            b.final_score
                .total_cmp(&a.final_score)
                .then_with(|| {
                    let ca = coherence[&a.cluster.unwrap_or(0)];
                    let cb = coherence[&b.cluster.unwrap_or(0)];
                    cb.total_cmp(&ca)
                })
                .then_with(|| a.source_id.cmp(&b.source_id))
                .then_with(|| a.snippet.cmp(&b.snippet))
        });

        let mut bundle = ContextBundle::default();
        let mut per_cluster: HashMap<usize, usize> = HashMap::new();
        let mut outcomes: Vec<&'static str> = Vec::with_capacity(merged.len());

        for candidate in &merged {
            let cluster = candidate.cluster.unwrap_or(0);
            if per_cluster.get(&cluster).copied().unwrap_or(0) >= config.max_per_cluster {
                outcomes.push("cluster_cap");
                continue;
            }
            if bundle.push_within(candidate.clone(), config.token_budget) {
                *per_cluster.entry(cluster).or_default() += 1;
                outcomes.push("selected");
            } else {
                outcomes.push("budget_exceeded");
            }
        }

        // Second pass: pull in unrepresented sources until the minimum is
        // reached. Budget and cluster caps still bind.
        if bundle.distinct_sources() < config.min_sources {
            for (index, candidate) in merged.iter().enumerate() {
                if bundle.distinct_sources() >= config.min_sources {
                    break;
                }
                if outcomes[index] == "selected" {
                    continue;
                }
                let cluster = candidate.cluster.unwrap_or(0);
                if per_cluster.get(&cluster).copied().unwrap_or(0) >= config.max_per_cluster {
                    continue;
                }
                let represented = bundle
                    .entries
                    .iter()
                    .any(|e| e.source_id == candidate.source_id);
                if !represented && bundle.push_within(candidate.clone(), config.token_budget) {
                    *per_cluster.entry(cluster).or_default() += 1;
                    outcomes[index] = "selected_for_source_diversity";
                }
            }
        }

        analytics.candidates = merged
            .iter()
            .zip(&outcomes)
            .map(|(c, outcome)| CandidateBreakdown {
                source_id: c.source_id.clone(),
                base_relevance: c.base_relevance,
                intent_bonus: c.intent_bonus,
                recency_bonus: c.recency_bonus,
                cluster_bonus: c.cluster_bonus,
                final_score: c.final_score,
                cluster: c.cluster.unwrap_or(0),
                outcome,
            })
            .collect();

        debug!(
            selected = bundle.len(),
            candidates = merged.len(),
            clusters = analytics.cluster_count,
            tokens = bundle.token_estimate,
            "context bundle assembled"
        );
        (bundle, analytics)
    }
}

/// Single-link agglomerative clustering via union-find: any pair with
/// cosine >= threshold is merged. Returns a canonical cluster id per item
/// (smallest member index).
fn single_link_clusters(vectors: &[SparseVector], threshold: f32) -> Vec<usize> {
    let mut parent: Vec<usize> = (0..vectors.len()).collect();

    fn find(parent: &mut Vec<usize>, i: usize) -> usize {
        if parent[i] != i {
            let root = find(parent, parent[i]);
            parent[i] = root;
        }
        parent[i]
    }

    for i in 0..vectors.len() {
        for j in (i + 1)..vectors.len() {
            if vectors[i].cosine(&vectors[j]) >= threshold {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    let (low, high) = if ri < rj { (ri, rj) } else { (rj, ri) };
                    parent[high] = low;
                }
            }
        }
    }

    (0..vectors.len())
        .map(|i| find(&mut parent, i))
        .collect()
}

/// Mean intra-cluster similarity per cluster. Singletons score 1.0.
fn cluster_coherence(vectors: &[SparseVector], clusters: &[usize]) -> HashMap<usize, f32> {
    let mut members: HashMap<usize, Vec<usize>> = HashMap::new();
    for (index, cluster) in clusters.iter().enumerate() {
        members.entry(*cluster).or_default().push(index);
    }

    members
        .into_iter()
        .map(|(cluster, indices)| {
            if indices.len() < 2 {
                return (cluster, 1.0);
            }
            let mut total = 0.0;
            let mut pairs = 0u32;
            for (a, &i) in indices.iter().enumerate() {
                for &j in &indices[a + 1..] {
                    total += vectors[i].cosine(&vectors[j]);
                    pairs += 1;
                }
            }
            (cluster, total / pairs as f32)
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
