//! Sparse TF-IDF vectorization.
//!
//! Terms are interned into a [`Vocabulary`]; vectors are sorted
//! `(term_id, weight)` pairs, unit-normalized so cosine similarity is a
//! plain sparse dot product.

use std::collections::{HashMap, HashSet};

/// Tokenize text into lowercase word tokens, stripping non-alphanumeric chars.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Interned term table shared by a corpus.
#[derive(Debug, Default, Clone)]
pub struct Vocabulary {
    terms: HashMap<String, u32>,
}

impl Vocabulary {
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Intern a term, assigning the next id on first sight.
    pub fn intern(&mut self, term: &str) -> u32 {
        let next = self.terms.len() as u32;
        *self.terms.entry(term.to_string()).or_insert(next)
    }

    /// Look up a term without interning.
    pub fn get(&self, term: &str) -> Option<u32> {
        self.terms.get(term).copied()
    }
}

/// A sparse, unit-normalized term-weight vector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector(Vec<(u32, f32)>);

impl SparseVector {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Build from raw term weights; sorts by term id and normalizes to unit
    /// length. An all-zero input yields the empty vector.
    pub fn from_weights(mut weights: Vec<(u32, f32)>) -> Self {
        weights.retain(|(_, w)| *w > 0.0);
        weights.sort_unstable_by_key(|(id, _)| *id);
        let norm = weights.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for (_, w) in &mut weights {
                *w /= norm;
            }
        }
        Self(weights)
    }

    /// Cosine similarity. Both sides are unit vectors, so this is the dot
    /// product over the intersection of term ids.
    pub fn cosine(&self, other: &SparseVector) -> f32 {
        let (mut i, mut j) = (0, 0);
        let mut dot = 0.0;
        while i < self.0.len() && j < other.0.len() {
            match self.0[i].0.cmp(&other.0[j].0) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    dot += self.0[i].1 * other.0[j].1;
                    i += 1;
                    j += 1;
                }
            }
        }
        dot
    }
}

/// Fitted TF-IDF model: vocabulary plus per-term IDF.
#[derive(Debug, Default, Clone)]
pub struct TfIdfModel {
    vocabulary: Vocabulary,
    idf: Vec<f32>,
}

impl TfIdfModel {
    /// Fit over the given token lists (one list per indexing unit).
    pub fn fit(token_lists: &[Vec<String>]) -> Self {
        let mut vocabulary = Vocabulary::default();
        let mut document_frequency: Vec<u32> = Vec::new();

        for tokens in token_lists {
            let unique: HashSet<&String> = tokens.iter().collect();
            for term in unique {
                let id = vocabulary.intern(term) as usize;
                if id >= document_frequency.len() {
                    document_frequency.resize(id + 1, 0);
                }
                document_frequency[id] += 1;
            }
        }

        let n = token_lists.len() as f32;
        let idf = document_frequency
            .iter()
            .map(|&df| {
                if df == 0 {
                    0.0
                } else {
                    (n / df as f32).ln() + 1.0
                }
            })
            .collect();

        Self { vocabulary, idf }
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    /// Vectorize a token list against the fitted vocabulary. Unknown terms
    /// are dropped.
    pub fn vectorize(&self, tokens: &[String]) -> SparseVector {
        if tokens.is_empty() {
            return SparseVector::default();
        }
        let mut counts: HashMap<u32, f32> = HashMap::new();
        for token in tokens {
            if let Some(id) = self.vocabulary.get(token) {
                *counts.entry(id).or_default() += 1.0;
            }
        }
        let total = tokens.len() as f32;
        let weights = counts
            .into_iter()
            .map(|(id, count)| {
                let idf = self.idf.get(id as usize).copied().unwrap_or(0.0);
                (id, (count / total) * idf)
            })
            .collect();
        SparseVector::from_weights(weights)
    }

    /// Tokenize then vectorize.
    pub fn vectorize_text(&self, text: &str) -> SparseVector {
        self.vectorize(&tokenize(text))
    }
}

// ============================================================================
// TESTS
// ============================================================================
