//! Data types for chunks, corpus entries, and search results.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bounded contiguous slice of a document's text, the unit of indexing
/// and retrieval.
///
/// Chunk IDs are derived deterministically from `(source, chunk_index)`
/// via [`chunk_id`], so re-ingesting the same source overwrites existing
/// vectors instead of duplicating them (upsert-by-id semantics).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Deterministic identifier, see [`chunk_id`].
    pub id: String,
    /// The text content of the chunk, including its overlap prefix.
    /// Non-empty and at most `chunk_size` bytes.
    pub text: String,
    /// The source identifier (filename) of the parent document.
    pub source: String,
    /// Zero-based, dense position of this chunk within its source.
    pub chunk_index: usize,
    /// Byte offset of `text` within the original document.
    pub start_offset: usize,
    /// The vector embedding for this chunk's text. Empty until the
    /// ingestion pipeline attaches it.
    pub embedding: Vec<f32>,
}

/// The lexically-indexed projection of a [`Chunk`].
///
/// Held by the lexical index in insertion order and persisted as a flat
/// JSON snapshot. The embedding is deliberately absent — only the text
/// participates in BM25 scoring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorpusEntry {
    /// Chunk identifier, shared with the semantic index.
    pub id: String,
    /// The chunk text, tokenized at index-build time.
    pub text: String,
    /// The source identifier of the parent document.
    pub source: String,
    /// Zero-based position of the chunk within its source.
    pub chunk_index: usize,
}

impl CorpusEntry {
    /// Project a chunk down to its lexical representation.
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            id: chunk.id.clone(),
            text: chunk.text.clone(),
            source: chunk.source.clone(),
            chunk_index: chunk.chunk_index,
        }
    }
}

/// A retrieved chunk paired with a relevance score.
///
/// The score's meaning depends on its origin: raw cosine similarity from
/// the semantic path, raw BM25 score from the lexical path, or an RRF sum
/// after fusion. Scores from different paths must never be compared
/// directly — only ranks are compared during fusion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The chunk identifier.
    pub id: String,
    /// Relevance score; higher is more relevant within one list.
    pub score: f32,
    /// The chunk text.
    pub text: String,
    /// The source identifier of the parent document.
    pub source: String,
}

/// Derive the deterministic chunk id for `(source, chunk_index)`.
///
/// UUIDv5 over the OID namespace keeps the id stable across runs while
/// making collisions between distinct sources practically impossible.
pub fn chunk_id(source: &str, chunk_index: usize) -> String {
    Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("{source}:{chunk_index}").as_bytes(),
    )
    .to_string()
}
