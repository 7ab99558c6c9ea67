//! Ingestion and hybrid retrieval orchestrator.
//!
//! [`RagPipeline`] coordinates the write path (chunk → embed → dual-index
//! write → persist) and the read path (semantic + lexical search fused
//! via Reciprocal Rank Fusion) by composing an [`EmbeddingProvider`],
//! a [`VectorStore`], a [`Chunker`], and a [`LexicalIndex`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ragfuse::{RagPipeline, RagConfig, RecursiveChunker, InMemoryVectorStore, LexicalIndex};
//!
//! let config = RagConfig::default();
//! let pipeline = RagPipeline::builder()
//!     .config(config.clone())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .chunker(Arc::new(RecursiveChunker::from_config(&config)))
//!     .lexical_index(Arc::new(LexicalIndex::new("bm25_corpus.json")))
//!     .collection("docs")
//!     .build()?;
//!
//! pipeline.init().await?;
//! let stored = pipeline.ingest(&text, "hr_policy.md").await?;
//! let hits = pipeline.hybrid_search("parental leave").await?;
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::cache::CachedEmbeddingProvider;
use crate::chunking::Chunker;
use crate::config::RagConfig;
use crate::document::{chunk_id, Chunk, CorpusEntry, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::fusion::reciprocal_rank_fusion;
use crate::keyword::LexicalIndex;
use crate::vectorstore::VectorStore;

/// The retrieval and ingestion engine.
///
/// Holds all process-wide index state as explicitly constructed,
/// explicitly passed components rather than ambient globals, so tests
/// can build isolated instances per case. Construct one via
/// [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: CachedEmbeddingProvider,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    lexical_index: Arc<LexicalIndex>,
    collection: String,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the lexical index.
    pub fn lexical_index(&self) -> &Arc<LexicalIndex> {
        &self.lexical_index
    }

    /// Initialize index state: create the vector collection lazily (with
    /// the provider's dimension) and load the corpus snapshot from disk.
    ///
    /// Called once at startup, before the first ingest or query.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStore`] if collection creation fails, or
    /// [`RagError::Persistence`] if an existing snapshot cannot be read.
    pub async fn init(&self) -> Result<()> {
        let dimensions = self.embedding_provider.dimensions();
        self.vector_store.create_collection(&self.collection, dimensions).await?;
        self.lexical_index.load().await?;
        info!(collection = %self.collection, dimensions, "pipeline initialized");
        Ok(())
    }

    /// Ingest a document: chunk → embed → dual-index write → persist.
    ///
    /// Chunk ids are derived deterministically from `(source, index)`, so
    /// re-ingesting the same source overwrites its vectors instead of
    /// duplicating them. All chunks are upserted to the vector store in
    /// one batch, appended to the lexical corpus in one transaction, and
    /// the corpus snapshot is persisted before returning.
    ///
    /// Returns the number of chunks stored.
    ///
    /// A failed snapshot write is logged but does not fail the ingest:
    /// both in-memory indexes are already updated and serving continues
    /// until the next successful persist.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] for blank text, or propagates
    /// embedding/vector-store failures.
    pub async fn ingest(&self, text: &str, source: &str) -> Result<usize> {
        if text.trim().is_empty() {
            return Err(RagError::InvalidInput("document text must not be empty".to_string()));
        }

        let spans = self.chunker.chunk(text);
        info!(source, chunk_count = spans.len(), "chunked document");

        let mut chunks = Vec::with_capacity(spans.len());
        for (index, span) in spans.into_iter().enumerate() {
            let embedding = self.embedding_provider.embed(&span.text).await.map_err(|e| {
                error!(source, chunk_index = index, error = %e, "embedding failed during ingestion");
                e
            })?;
            chunks.push(Chunk {
                id: chunk_id(source, index),
                text: span.text,
                source: source.to_string(),
                chunk_index: index,
                start_offset: span.start_offset,
                embedding,
            });
        }

        self.vector_store.upsert(&self.collection, &chunks).await.map_err(|e| {
            error!(source, error = %e, "vector upsert failed during ingestion");
            e
        })?;

        let entries: Vec<CorpusEntry> = chunks.iter().map(CorpusEntry::from_chunk).collect();
        if let Err(e) = self.lexical_index.append(entries).await {
            // Serving continues from memory; durability is at risk until
            // the next successful persist.
            warn!(source, error = %e, "corpus snapshot persist failed, continuing from memory");
        }

        info!(source, chunk_count = chunks.len(), "ingested document");
        Ok(chunks.len())
    }

    /// Hybrid search: query both indexes, fuse rankings, return the top
    /// `top_k` results.
    ///
    /// Each index is asked for `2 * top_k` candidates. The similarity
    /// threshold is a precision gate, not a ranking input: a semantic
    /// hit below it is excluded from the output entirely, even when the
    /// same chunk is also a lexical top hit. An empty result set is a
    /// valid outcome (no relevant documents), distinct from a failure.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] for a blank query, or
    /// propagates embedding/vector-store failures.
    pub async fn hybrid_search(&self, query: &str) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(RagError::InvalidInput("query must not be empty".to_string()));
        }

        let top_k = self.config.top_k;
        let breadth = top_k * 2;

        let (semantic, rejected) = self.semantic_search(query, breadth).await?;
        let mut lexical = self.lexical_index.search(query, breadth).await;
        lexical.retain(|result| !rejected.contains(&result.id));

        let fused = match (semantic.is_empty(), lexical.is_empty()) {
            (true, true) => Vec::new(),
            (false, true) => semantic.into_iter().take(top_k).collect(),
            (true, false) => lexical.into_iter().take(top_k).collect(),
            (false, false) => {
                let mut fused = reciprocal_rank_fusion(&semantic, &lexical, self.config.rrf_k);
                fused.truncate(top_k);
                fused
            }
        };

        info!(result_count = fused.len(), "hybrid search completed");
        Ok(fused)
    }

    /// Semantic path: embed the query, search the vector store, and gate
    /// on the similarity threshold.
    ///
    /// Returns the surviving hits plus the ids of hits that were gated
    /// out, so the caller can keep them out of the lexical list as well.
    async fn semantic_search(
        &self,
        query: &str,
        breadth: usize,
    ) -> Result<(Vec<SearchResult>, HashSet<String>)> {
        let query_embedding = self.embedding_provider.embed(query).await.map_err(|e| {
            error!(error = %e, "query embedding failed");
            e
        })?;

        let results = self
            .vector_store
            .search(&self.collection, &query_embedding, breadth)
            .await
            .map_err(|e| {
                error!(collection = %self.collection, error = %e, "vector search failed");
                e
            })?;

        let threshold = self.config.similarity_threshold;
        let mut kept = Vec::new();
        let mut rejected = HashSet::new();
        for result in results {
            if result.score >= threshold {
                kept.push(result);
            } else {
                rejected.insert(result.id.clone());
            }
        }
        Ok((kept, rejected))
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// All fields except `collection` are required; the collection name
/// defaults to `"documents"`. The embedding provider is wrapped in a
/// process-lifetime cache automatically.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
    lexical_index: Option<Arc<LexicalIndex>>,
    collection: Option<String>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider. It will be wrapped in an embedding
    /// cache keyed by normalized text.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the lexical index.
    pub fn lexical_index(mut self, index: Arc<LexicalIndex>) -> Self {
        self.lexical_index = Some(index);
        self
    }

    /// Set the vector collection name (defaults to `"documents"`).
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are
    /// set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if any required field is missing.
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::Config("config is required".to_string()))?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::Config("vector_store is required".to_string()))?;
        let chunker =
            self.chunker.ok_or_else(|| RagError::Config("chunker is required".to_string()))?;
        let lexical_index = self
            .lexical_index
            .ok_or_else(|| RagError::Config("lexical_index is required".to_string()))?;

        Ok(RagPipeline {
            config,
            embedding_provider: CachedEmbeddingProvider::new(embedding_provider),
            vector_store,
            chunker,
            lexical_index,
            collection: self.collection.unwrap_or_else(|| "documents".to_string()),
        })
    }
}
