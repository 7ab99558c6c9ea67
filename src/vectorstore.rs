//! Vector store trait: the semantic index collaborator contract.

use async_trait::async_trait;

use crate::document::{Chunk, SearchResult};
use crate::error::Result;

/// A storage backend for vector embeddings with similarity search.
///
/// Implementations manage named collections of [`Chunk`]s and support
/// batch upserting, deleting, and nearest-neighbor search. Scores are in
/// similarity space (higher = more similar); the engine treats them as
/// raw cosine similarities when applying its precision threshold.
///
/// Collections are created lazily with a fixed dimension and a cosine
/// metric; creating an existing collection is a no-op.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a named collection. No-op if it already exists.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Upsert chunks into a collection in one batch.
    ///
    /// Chunks must have embeddings attached. An existing chunk with the
    /// same id is overwritten, which is what makes re-ingestion of a
    /// source replace rather than duplicate its vectors.
    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()>;

    /// Delete chunks by their IDs from a collection.
    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()>;

    /// Search for the `top_k` most similar chunks to the given embedding.
    ///
    /// Returns results ordered by descending similarity score.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;
}
