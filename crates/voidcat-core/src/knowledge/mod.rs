//! Knowledge store.
//!
//! Loads a directory of markdown files into an in-memory corpus at startup
//! and fits a TF-IDF model across it. The corpus is immutable afterwards
//! and shared read-only; a restart rebuilds everything.

mod tfidf;

pub use tfidf::{tokenize, SparseVector, TfIdfModel, Vocabulary};

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::KnowledgeConfig;
use crate::error::{CoreError, Result};

/// One overlapping window of a document.
#[derive(Debug, Clone)]
struct Chunk {
    text: String,
    vector: SparseVector,
}

/// An ingested markdown file.
#[derive(Debug, Clone)]
pub struct Document {
    /// Stable id: the path relative to the knowledge root.
    pub id: String,
    pub path: PathBuf,
    /// File modification time, when the filesystem reports one.
    pub modified: Option<DateTime<Utc>>,
    chunks: Vec<Chunk>,
}

/// A ranked search hit.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub doc_id: String,
    pub score: f32,
    /// Best-scoring chunk of the document.
    pub snippet: String,
}

/// The fitted corpus: documents plus the shared TF-IDF model.
#[derive(Debug, Default)]
pub struct Corpus {
    documents: Vec<Document>,
    model: TfIdfModel,
}

impl Corpus {
    /// Scan `dir` recursively for markdown files and fit the model.
    ///
    /// A missing or empty directory yields an empty corpus; the caller
    /// records "no knowledge context" downstream instead of failing.
    /// Duplicate relative paths are rejected.
    pub fn load(dir: &Path, config: &KnowledgeConfig) -> Result<Self> {
        let mut files = Vec::new();
        if dir.is_dir() {
            collect_markdown(dir, &mut files)?;
        } else {
            warn!(path = %dir.display(), "knowledge directory does not exist");
        }
        files.sort();

        let mut sources = Vec::with_capacity(files.len());
        let mut seen: HashSet<String> = HashSet::new();
        for path in files {
            let id = path
                .strip_prefix(dir)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            if !seen.insert(id.clone()) {
                return Err(CoreError::duplicate(&id));
            }
            let text = std::fs::read_to_string(&path)?;
            let modified = std::fs::metadata(&path)
                .ok()
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Utc>::from);
            sources.push((id, path, text, modified));
        }

        let corpus = Self::build(sources, config);
        info!(
            documents = corpus.documents.len(),
            vocabulary = corpus.model.vocabulary_len(),
            "knowledge corpus ready"
        );
        Ok(corpus)
    }

    /// Build a corpus from in-memory sources. Used by `load` and by tests.
    pub fn from_texts(sources: Vec<(String, String)>, config: &KnowledgeConfig) -> Self {
        let sources = sources
            .into_iter()
            .map(|(id, text)| (id.clone(), PathBuf::from(id), text, None))
            .collect();
        Self::build(sources, config)
    }

    fn build(
        sources: Vec<(String, PathBuf, String, Option<DateTime<Utc>>)>,
        config: &KnowledgeConfig,
    ) -> Self {
        // Chunk first, then fit IDF over chunks so every vector lives in the
        // corpus feature space.
        let mut chunk_texts: Vec<(usize, String)> = Vec::new();
        let mut shells = Vec::with_capacity(sources.len());
        for (index, (id, path, text, modified)) in sources.into_iter().enumerate() {
            for window in windows(&text, config) {
                chunk_texts.push((index, window));
            }
            shells.push((id, path, modified));
        }

        let token_lists: Vec<Vec<String>> =
            chunk_texts.iter().map(|(_, t)| tokenize(t)).collect();
        let model = TfIdfModel::fit(&token_lists);

        let mut documents: Vec<Document> = shells
            .into_iter()
            .map(|(id, path, modified)| Document {
                id,
                path,
                modified,
                chunks: Vec::new(),
            })
            .collect();
        for ((index, text), tokens) in chunk_texts.into_iter().zip(&token_lists) {
            let vector = model.vectorize(tokens);
            documents[index].chunks.push(Chunk { text, vector });
        }

        debug!(chunks = token_lists.len(), "corpus vectorized");
        Self { documents, model }
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn vocabulary_len(&self) -> usize {
        self.model.vocabulary_len()
    }

    /// Modification timestamp of a document, when known.
    pub fn modified(&self, doc_id: &str) -> Option<DateTime<Utc>> {
        self.documents
            .iter()
            .find(|d| d.id == doc_id)
            .and_then(|d| d.modified)
    }

    /// Newest modification timestamp across the corpus. Recency bonuses are
    /// computed relative to this, keeping scoring independent of wall clock.
    pub fn newest_modified(&self) -> Option<DateTime<Utc>> {
        self.documents.iter().filter_map(|d| d.modified).max()
    }

    /// Vectorize arbitrary text in the corpus feature space.
    pub fn vectorize(&self, text: &str) -> SparseVector {
        self.model.vectorize_text(text)
    }

    /// Cosine-similarity top-k. Each document scores as its best chunk;
    /// the snippet is that chunk's text. Ties break on document id so the
    /// ranking is deterministic.
    pub fn search(&self, query: &str, k: usize) -> Vec<SearchHit> {
        if self.documents.is_empty() || k == 0 {
            return Vec::new();
        }
        let query_vector = self.model.vectorize_text(query);
        if query_vector.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<SearchHit> = self
            .documents
            .iter()
            .filter_map(|doc| {
                let best = doc
                    .chunks
                    .iter()
                    .map(|chunk| (query_vector.cosine(&chunk.vector), chunk))
                    .max_by(|a, b| a.0.total_cmp(&b.0))?;
                if best.0 <= 0.0 {
                    return None;
                }
                Some(SearchHit {
                    doc_id: doc.id.clone(),
                    score: best.0,
                    snippet: best.1.text.clone(),
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        hits.truncate(k);
        hits
    }
}

/// Split text into overlapping windows per the chunking config. Short
/// documents come back whole.
fn windows(text: &str, config: &KnowledgeConfig) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if trimmed.len() <= config.max_doc_chars {
        return vec![trimmed.to_string()];
    }

    let stride = config.chunk_stride.max(1).min(config.chunk_window.max(1));
    let chars: Vec<char> = trimmed.chars().collect();
    let mut out = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + config.chunk_window).min(chars.len());
        out.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += stride;
    }
    out
}

fn collect_markdown(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_markdown(&path, out)?;
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("md") | Some("markdown")
        ) {
            out.push(path);
        }
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
