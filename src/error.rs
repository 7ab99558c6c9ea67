//! Error types for the `ragfuse` crate.

use thiserror::Error;

/// Errors that can occur in retrieval and ingestion operations.
///
/// Recoverable local conditions (an empty corpus, a query with no hits)
/// are represented as empty result sets, not errors. Only invalid input,
/// external-service failures, and persistence problems surface here.
#[derive(Debug, Error)]
pub enum RagError {
    /// The caller supplied empty or blank text where content is required.
    ///
    /// Raised before any external call is made.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The embedding provider call failed.
    ///
    /// Never cached and never retried at this layer; the caller decides
    /// whether to retry, degrade to lexical-only search, or report.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector index backend returned an error.
    #[error("Vector store error ({backend}): {message}")]
    VectorStore {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// Reading or writing the lexical corpus snapshot failed.
    ///
    /// A failed snapshot write does not abort ingestion — the in-memory
    /// index keeps serving — but it is a durability risk until the next
    /// successful persist.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The session/message store backend returned an error.
    #[error("Session store error: {0}")]
    Session(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RagError>;
