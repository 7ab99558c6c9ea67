//! Lexical (BM25) index over ingested chunk texts.
//!
//! Keyword search complements the semantic index: exact terms, model
//! numbers, and rare names that embeddings blur are matched literally
//! here. The corpus is an insertion-ordered list of [`CorpusEntry`]
//! records; the BM25 term index is rebuilt in full on every mutation and
//! on startup from a persisted snapshot. Full rebuilds are acceptable at
//! single-tenant document-set scale.
//!
//! Scoring follows the Okapi BM25 variant with `k1 = 1.5`, `b = 0.75`
//! and an epsilon-floored IDF, so rankings are reproducible across
//! restarts from the same snapshot.

use std::collections::HashMap;
use std::path::PathBuf;

use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};

use crate::document::{CorpusEntry, SearchResult};
use crate::error::{RagError, Result};

const K1: f64 = 1.5;
const B: f64 = 0.75;
/// Negative IDFs (terms in most documents) are floored at
/// `EPSILON * average_idf` instead of going negative.
const EPSILON: f64 = 0.25;

/// Lowercase whitespace tokenization, applied identically to corpus
/// entries and queries.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase().split_whitespace().map(str::to_string).collect()
}

/// Per-entry term statistics plus corpus-wide IDF.
struct Bm25Stats {
    term_freqs: Vec<HashMap<String, usize>>,
    doc_lens: Vec<usize>,
    avg_doc_len: f64,
    idf: HashMap<String, f64>,
}

impl Bm25Stats {
    fn build(entries: &[CorpusEntry]) -> Self {
        let tokenized: Vec<Vec<String>> = entries.iter().map(|e| tokenize(&e.text)).collect();
        let doc_lens: Vec<usize> = tokenized.iter().map(Vec::len).collect();
        let total_len: usize = doc_lens.iter().sum();
        let n = entries.len() as f64;
        let avg_doc_len = if entries.is_empty() { 0.0 } else { total_len as f64 / n };

        let mut term_freqs = Vec::with_capacity(tokenized.len());
        let mut doc_freqs: HashMap<String, usize> = HashMap::new();
        for tokens in &tokenized {
            let mut freqs: HashMap<String, usize> = HashMap::new();
            for token in tokens {
                *freqs.entry(token.clone()).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }
            term_freqs.push(freqs);
        }

        // Okapi IDF with an epsilon floor for very common terms.
        let mut idf: HashMap<String, f64> = HashMap::new();
        let mut idf_sum = 0.0;
        let mut negative: Vec<String> = Vec::new();
        for (term, df) in &doc_freqs {
            let value = ((n - *df as f64 + 0.5) / (*df as f64 + 0.5)).ln();
            idf_sum += value;
            if value < 0.0 {
                negative.push(term.clone());
            }
            idf.insert(term.clone(), value);
        }
        if !doc_freqs.is_empty() {
            let floor = EPSILON * (idf_sum / doc_freqs.len() as f64);
            for term in negative {
                idf.insert(term, floor);
            }
        }

        Self { term_freqs, doc_lens, avg_doc_len, idf }
    }

    fn score(&self, index: usize, query_tokens: &[String]) -> f64 {
        let freqs = &self.term_freqs[index];
        let dl = self.doc_lens[index] as f64;
        let norm = K1 * (1.0 - B + B * dl / self.avg_doc_len.max(f64::MIN_POSITIVE));

        query_tokens
            .iter()
            .filter_map(|token| {
                let tf = *freqs.get(token)? as f64;
                let idf = *self.idf.get(token)?;
                Some(idf * (tf * (K1 + 1.0)) / (tf + norm))
            })
            .sum()
    }
}

struct Inner {
    entries: Vec<CorpusEntry>,
    stats: Option<Bm25Stats>,
}

/// In-memory BM25 index with an optional persisted corpus snapshot.
///
/// Reads take a short read lock and may observe a slightly stale index
/// while an ingestion is in flight; they never observe a half-appended
/// corpus. The whole append + rebuild + persist sequence runs under one
/// exclusive transaction so two ingestions cannot interleave.
pub struct LexicalIndex {
    snapshot_path: Option<PathBuf>,
    inner: RwLock<Inner>,
    /// Serializes corpus mutations end to end, including the snapshot
    /// write, without blocking concurrent readers for the whole span.
    mutation_lock: Mutex<()>,
}

impl LexicalIndex {
    /// Create an empty index persisted to `snapshot_path`.
    pub fn new(snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_path: Some(snapshot_path.into()),
            inner: RwLock::new(Inner { entries: Vec::new(), stats: None }),
            mutation_lock: Mutex::new(()),
        }
    }

    /// Create an index with no durable snapshot (tests, ephemeral use).
    pub fn ephemeral() -> Self {
        Self {
            snapshot_path: None,
            inner: RwLock::new(Inner { entries: Vec::new(), stats: None }),
            mutation_lock: Mutex::new(()),
        }
    }

    /// Load the corpus snapshot from disk and rebuild the term index.
    ///
    /// A missing snapshot is not an error: the index starts empty and
    /// lexical search is degraded until the first ingestion.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Persistence`] if the snapshot exists but
    /// cannot be read or parsed.
    pub async fn load(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let _guard = self.mutation_lock.lock().await;

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no corpus snapshot found, lexical search degraded until first ingestion");
                return Ok(());
            }
            Err(e) => {
                return Err(RagError::Persistence(format!(
                    "failed to read corpus snapshot '{}': {e}",
                    path.display()
                )));
            }
        };

        let entries: Vec<CorpusEntry> = serde_json::from_slice(&bytes).map_err(|e| {
            RagError::Persistence(format!(
                "corpus snapshot '{}' is not valid JSON: {e}",
                path.display()
            ))
        })?;

        let count = entries.len();
        let mut inner = self.inner.write().await;
        inner.stats = if entries.is_empty() { None } else { Some(Bm25Stats::build(&entries)) };
        inner.entries = entries;
        drop(inner);

        info!(count, path = %path.display(), "loaded corpus snapshot");
        Ok(())
    }

    /// Append entries, rebuild the term index, and persist the snapshot.
    ///
    /// Runs as one exclusive transaction with respect to other mutations.
    /// The in-memory index is updated even when the snapshot write fails;
    /// in that case the failure is logged and returned so the caller can
    /// decide whether to surface it, but serving continues from memory.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Persistence`] if the snapshot write fails.
    pub async fn append(&self, new_entries: Vec<CorpusEntry>) -> Result<()> {
        let _guard = self.mutation_lock.lock().await;

        let snapshot = {
            let mut inner = self.inner.write().await;
            inner.entries.extend(new_entries);
            inner.stats = Some(Bm25Stats::build(&inner.entries));
            inner.entries.clone()
        };

        self.persist(&snapshot).await
    }

    /// Search the corpus, returning up to `limit` results with positive
    /// BM25 scores, ordered by descending score (ties keep insertion
    /// order). An empty corpus or query yields empty results, not an
    /// error, so semantic-only operation keeps working before the first
    /// ingestion.
    pub async fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let inner = self.inner.read().await;
        let Some(stats) = &inner.stats else {
            return Vec::new();
        };

        let mut scored: Vec<(f64, &CorpusEntry)> = inner
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (stats.score(i, &query_tokens), entry))
            .filter(|(score, _)| *score > 0.0)
            .collect();

        // Stable sort keeps insertion order for equal scores.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(score, entry)| SearchResult {
                id: entry.id.clone(),
                score: score as f32,
                text: entry.text.clone(),
                source: entry.source.clone(),
            })
            .collect()
    }

    /// Number of corpus entries currently indexed.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Returns `true` if no entries have been ingested.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Write the snapshot atomically: serialize to a sibling temp file,
    /// then rename over the target so a crash mid-write never leaves a
    /// truncated snapshot for the next startup.
    async fn persist(&self, entries: &[CorpusEntry]) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let json = serde_json::to_vec(entries)
            .map_err(|e| RagError::Persistence(format!("failed to serialize corpus: {e}")))?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        if let Err(e) = tokio::fs::write(&tmp, &json).await {
            error!(path = %tmp.display(), error = %e, "failed to write corpus snapshot");
            return Err(RagError::Persistence(format!(
                "failed to write corpus snapshot '{}': {e}",
                tmp.display()
            )));
        }
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            error!(path = %path.display(), error = %e, "failed to replace corpus snapshot");
            return Err(RagError::Persistence(format!(
                "failed to replace corpus snapshot '{}': {e}",
                path.display()
            )));
        }

        Ok(())
    }
}
