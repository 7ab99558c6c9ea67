//! Process-lifetime embedding cache.
//!
//! Embedding calls dominate ingestion latency and cost, and identical
//! chunk texts recur across re-ingests and repeated queries. The cache
//! memoizes text → vector lookups keyed by whitespace-normalized text so
//! the external provider is only called once per unique input.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;

/// An [`EmbeddingProvider`] decorator that caches by normalized text.
///
/// Normalization collapses newlines to spaces and trims leading/trailing
/// whitespace; two inputs with the same normalized form share a cached
/// vector. The cache is unbounded and lives for the process — acceptable
/// while the set of unique chunk texts stays small relative to memory.
///
/// Provider failures propagate to the caller and are never cached, so a
/// transient outage does not poison later lookups. Concurrent inserts of
/// the same key are benign: last write wins and the values are equal.
pub struct CachedEmbeddingProvider {
    inner: Arc<dyn EmbeddingProvider>,
    cache: RwLock<HashMap<String, Vec<f32>>>,
}

impl CachedEmbeddingProvider {
    /// Wrap a provider with an empty cache.
    pub fn new(inner: Arc<dyn EmbeddingProvider>) -> Self {
        Self { inner, cache: RwLock::new(HashMap::new()) }
    }

    /// Number of distinct normalized texts currently cached.
    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Returns `true` if nothing has been cached yet.
    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }
}

/// Collapse newlines to spaces and trim surrounding whitespace.
fn normalize(text: &str) -> String {
    text.replace('\n', " ").trim().to_string()
}

#[async_trait]
impl EmbeddingProvider for CachedEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = normalize(text);

        if let Some(vector) = self.cache.read().await.get(&key) {
            debug!(text_len = text.len(), "embedding cache hit");
            return Ok(vector.clone());
        }

        let vector = self.inner.embed(&key).await?;
        self.cache.write().await.insert(key, vector.clone());
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::RagError;

    /// Counts provider calls; fails on demand.
    struct CountingProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingProvider {
        fn new(fail: bool) -> Self {
            Self { calls: AtomicUsize::new(0), fail }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RagError::Embedding {
                    provider: "counting".into(),
                    message: "forced failure".into(),
                });
            }
            Ok(vec![text.len() as f32, 1.0])
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    #[tokio::test]
    async fn second_lookup_is_a_cache_hit() {
        let inner = Arc::new(CountingProvider::new(false));
        let cached = CachedEmbeddingProvider::new(inner.clone());

        let first = cached.embed("hello world").await.unwrap();
        let second = cached.embed("hello world").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn normalized_variants_share_one_entry() {
        let inner = Arc::new(CountingProvider::new(false));
        let cached = CachedEmbeddingProvider::new(inner.clone());

        cached.embed("hello\nworld").await.unwrap();
        cached.embed("  hello world  ").await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.len().await, 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let inner = Arc::new(CountingProvider::new(true));
        let cached = CachedEmbeddingProvider::new(inner.clone());

        assert!(cached.embed("boom").await.is_err());
        assert!(cached.embed("boom").await.is_err());

        // Both calls reached the provider; nothing was cached.
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert!(cached.is_empty().await);
    }
}
