//! # ragfuse
//!
//! Retrieval and ingestion engine for retrieval-augmented generation.
//!
//! Documents are split into overlapping, size-bounded chunks and indexed
//! two ways: semantically (vector embeddings in a [`VectorStore`]) and
//! lexically (an in-process BM25 [`LexicalIndex`] rebuilt from a
//! persisted corpus snapshot). Queries run against both indexes and the
//! two rankings are merged with Reciprocal Rank Fusion, which compares
//! ranks rather than scores and therefore needs no normalization between
//! cosine similarity and BM25. Conversation context is bounded by a
//! sliding window over complete user → assistant pairs.
//!
//! ## Modules
//!
//! - [`pipeline`] — ingestion and hybrid retrieval orchestrator
//! - [`chunking`] — recursive paragraph/sentence/word/character splitter
//! - [`embedding`] / [`cache`] — embedding provider trait and memoization
//! - [`vectorstore`] / [`inmemory`] — semantic index contract and the
//!   in-memory reference implementation
//! - [`keyword`] — BM25 lexical index with snapshot persistence
//! - [`fusion`] — Reciprocal Rank Fusion
//! - [`memory`] — session message logs and window extraction
//! - [`config`] / [`error`] — engine configuration and error taxonomy
//!
//! Backends live behind cargo features: `gemini` (embeddings over the
//! Generative Language API), `qdrant` (vector store over gRPC), and
//! `sqlite` (durable session store).
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ragfuse::{
//!     InMemoryVectorStore, LexicalIndex, RagConfig, RagPipeline, RecursiveChunker,
//! };
//!
//! let config = RagConfig::default();
//! let pipeline = RagPipeline::builder()
//!     .config(config.clone())
//!     .embedding_provider(Arc::new(embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .chunker(Arc::new(RecursiveChunker::from_config(&config)))
//!     .lexical_index(Arc::new(LexicalIndex::new("bm25_corpus.json")))
//!     .build()?;
//!
//! pipeline.init().await?;
//! pipeline.ingest(&document_text, "hr_policy.md").await?;
//! let hits = pipeline.hybrid_search("how much parental leave?").await?;
//! ```

pub mod cache;
pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod fusion;
pub mod inmemory;
pub mod keyword;
pub mod memory;
pub mod pipeline;
pub mod vectorstore;

#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "qdrant")]
pub mod qdrant;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use cache::CachedEmbeddingProvider;
pub use chunking::{ChunkSpan, Chunker, RecursiveChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{chunk_id, Chunk, CorpusEntry, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use fusion::reciprocal_rank_fusion;
pub use inmemory::InMemoryVectorStore;
pub use keyword::LexicalIndex;
pub use memory::{
    recent_pairs, InMemorySessionStore, Message, Role, Session, SessionStore, SessionSummary,
};
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use vectorstore::VectorStore;

#[cfg(feature = "gemini")]
pub use gemini::GeminiEmbeddingProvider;
#[cfg(feature = "qdrant")]
pub use qdrant::QdrantVectorStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSessionStore;
