//! Configuration for the retrieval and ingestion engine.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Configuration parameters for ingestion, retrieval, and memory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in bytes.
    pub chunk_size: usize,
    /// Number of overlapping bytes shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of fused results returned by hybrid search. Each index is
    /// queried for `2 * top_k` candidates to give fusion enough breadth.
    pub top_k: usize,
    /// Minimum cosine similarity for semantic hits. Results below this
    /// are dropped before fusion (a precision gate, not a ranking input).
    pub similarity_threshold: f32,
    /// Number of most-recent user/assistant message pairs forwarded as
    /// conversational context.
    pub memory_window: usize,
    /// Reciprocal Rank Fusion smoothing constant. Larger values compress
    /// the influence of rank differences between the two lists.
    pub rrf_k: f32,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1200,
            chunk_overlap: 150,
            top_k: 2,
            similarity_threshold: 0.55,
            memory_window: 3,
            rrf_k: 60.0,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in bytes.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in bytes.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of fused results returned by hybrid search.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity threshold for semantic hits.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    /// Set the number of recent message pairs kept in the memory window.
    pub fn memory_window(mut self, pairs: usize) -> Self {
        self.config.memory_window = pairs;
        self
    }

    /// Set the RRF smoothing constant.
    pub fn rrf_k(mut self, k: f32) -> Self {
        self.config.rrf_k = k;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0` or `memory_window == 0`
    /// - `similarity_threshold` is not finite
    /// - `rrf_k <= 0`
    pub fn build(self) -> Result<RagConfig> {
        if self.config.chunk_overlap >= self.config.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.config.chunk_overlap, self.config.chunk_size
            )));
        }
        if self.config.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }
        if self.config.memory_window == 0 {
            return Err(RagError::Config(
                "memory_window must be greater than zero".to_string(),
            ));
        }
        if !self.config.similarity_threshold.is_finite() {
            return Err(RagError::Config(
                "similarity_threshold must be a finite number".to_string(),
            ));
        }
        if self.config.rrf_k <= 0.0 {
            return Err(RagError::Config("rrf_k must be positive".to_string()));
        }
        Ok(self.config)
    }
}
