//! End-to-end tests for the ingest → dual-index → hybrid search flow,
//! using a deterministic token-hash embedder in place of a real provider.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ragfuse::{
    chunk_id, EmbeddingProvider, InMemoryVectorStore, LexicalIndex, RagConfig, RagError,
    RagPipeline, RecursiveChunker, Result,
};

const DIM: usize = 64;

/// Deterministic bag-of-words embedder: each token contributes to one
/// dimension picked by an FNV-1a hash. Cosine similarity then tracks
/// token overlap, which makes semantic behavior predictable in tests.
/// Specific texts can be overridden with fixed vectors.
struct TokenHashEmbedder {
    overrides: HashMap<String, Vec<f32>>,
    calls: AtomicUsize,
}

impl TokenHashEmbedder {
    fn new() -> Self {
        Self { overrides: HashMap::new(), calls: AtomicUsize::new(0) }
    }

    fn with_override(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.overrides.insert(text.to_string(), vector);
        self
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector_for(text: &str) -> Vec<f32> {
        let mut v = vec![0f32; DIM];
        for token in text.to_lowercase().split_whitespace() {
            let mut h: u64 = 0xcbf29ce484222325;
            for byte in token.bytes() {
                h ^= u64::from(byte);
                h = h.wrapping_mul(0x100000001b3);
            }
            v[(h % DIM as u64) as usize] += 1.0;
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for TokenHashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(vector) = self.overrides.get(text) {
            return Ok(vector.clone());
        }
        Ok(Self::vector_for(text))
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

fn test_config(top_k: usize, threshold: f32) -> RagConfig {
    RagConfig::builder()
        .chunk_size(400)
        .chunk_overlap(40)
        .top_k(top_k)
        .similarity_threshold(threshold)
        .build()
        .unwrap()
}

async fn build_pipeline(embedder: Arc<TokenHashEmbedder>, config: RagConfig) -> RagPipeline {
    let pipeline = RagPipeline::builder()
        .config(config.clone())
        .embedding_provider(embedder)
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .chunker(Arc::new(RecursiveChunker::from_config(&config)))
        .lexical_index(Arc::new(LexicalIndex::ephemeral()))
        .collection("docs")
        .build()
        .unwrap();
    pipeline.init().await.unwrap();
    pipeline
}

#[tokio::test]
async fn ingest_rejects_blank_text() {
    let pipeline = build_pipeline(Arc::new(TokenHashEmbedder::new()), test_config(2, 0.5)).await;
    let err = pipeline.ingest("   \n  ", "blank.md").await;
    assert!(matches!(err, Err(RagError::InvalidInput(_))));
}

#[tokio::test]
async fn hybrid_search_rejects_blank_query() {
    let pipeline = build_pipeline(Arc::new(TokenHashEmbedder::new()), test_config(2, 0.5)).await;
    let err = pipeline.hybrid_search("  ").await;
    assert!(matches!(err, Err(RagError::InvalidInput(_))));
}

#[tokio::test]
async fn matching_document_found_via_both_paths_is_deduplicated() {
    let pipeline = build_pipeline(Arc::new(TokenHashEmbedder::new()), test_config(2, 0.5)).await;
    pipeline.ingest("alpha beta gamma delta", "a.md").await.unwrap();
    pipeline.ingest("epsilon zeta eta theta", "b.md").await.unwrap();
    pipeline.ingest("unrelated filler content words", "fill.md").await.unwrap();

    let results = pipeline.hybrid_search("alpha beta gamma").await.unwrap();

    assert!(!results.is_empty());
    assert_eq!(results[0].id, chunk_id("a.md", 0));
    let matching = results.iter().filter(|r| r.id == chunk_id("a.md", 0)).count();
    assert_eq!(matching, 1, "both-path hit must appear once");
}

#[tokio::test]
async fn no_relevant_documents_is_empty_not_error() {
    let pipeline = build_pipeline(Arc::new(TokenHashEmbedder::new()), test_config(2, 0.5)).await;
    pipeline.ingest("alpha beta gamma delta", "a.md").await.unwrap();

    let results = pipeline.hybrid_search("unrelated nonsense words").await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn empty_semantic_list_short_circuits_to_lexical_results() {
    // The query embeds to the zero vector, so the semantic path finds
    // nothing (and rejects nothing); lexical results pass through as-is.
    let embedder =
        Arc::new(TokenHashEmbedder::new().with_override("alpha", vec![0.0; DIM]));
    let pipeline = build_pipeline(embedder, test_config(2, 0.5)).await;
    pipeline.ingest("alpha beta gamma delta", "a.md").await.unwrap();
    pipeline.ingest("alpha mentioned here too", "b.md").await.unwrap();
    pipeline.ingest("unrelated filler content words", "fill.md").await.unwrap();

    let results = pipeline.hybrid_search("alpha").await.unwrap();
    let expected = pipeline.lexical_index().search("alpha", 2).await;

    assert!(!results.is_empty());
    let got: Vec<(&str, f32)> = results.iter().map(|r| (r.id.as_str(), r.score)).collect();
    let want: Vec<(&str, f32)> = expected.iter().map(|r| (r.id.as_str(), r.score)).collect();
    assert_eq!(got, want, "lexical list must pass through unmodified");
}

#[tokio::test]
async fn empty_lexical_list_short_circuits_to_semantic_results() {
    // The query shares no tokens with the corpus (no lexical hits) but
    // is overridden to embed exactly like document a.md.
    let embedder = Arc::new(
        TokenHashEmbedder::new().with_override(
            "paraphrased question",
            TokenHashEmbedder::vector_for("alpha beta gamma delta"),
        ),
    );
    let pipeline = build_pipeline(embedder, test_config(2, 0.5)).await;
    pipeline.ingest("alpha beta gamma delta", "a.md").await.unwrap();

    let results = pipeline.hybrid_search("paraphrased question").await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, chunk_id("a.md", 0));
    assert!((results[0].score - 1.0).abs() < 1e-5, "raw cosine score passes through");
}

#[tokio::test]
async fn sub_threshold_semantic_hit_is_excluded_even_when_lexically_top() {
    // c.md shares the token "alpha" with the query, but it is buried in
    // unrelated tokens so its cosine similarity falls below 0.5. It must
    // not surface through the lexical path either.
    let pipeline = build_pipeline(Arc::new(TokenHashEmbedder::new()), test_config(3, 0.5)).await;
    pipeline.ingest("alpha beta gamma delta", "a.md").await.unwrap();
    pipeline
        .ingest(
            "alpha x1 x2 x3 x4 x5 x6 x7 x8 x9 x10 x11 x12 x13 x14 x15",
            "c.md",
        )
        .await
        .unwrap();
    // Padding documents keep the corpus large enough that "alpha" has a
    // positive IDF, so c.md really is a lexical hit.
    pipeline.ingest("plain padding text one", "f1.md").await.unwrap();
    pipeline.ingest("more plain padding two", "f2.md").await.unwrap();
    pipeline.ingest("extra padding filler three", "f3.md").await.unwrap();

    let results = pipeline.hybrid_search("alpha beta").await.unwrap();

    assert!(results.iter().any(|r| r.id == chunk_id("a.md", 0)));
    assert!(
        !results.iter().any(|r| r.id == chunk_id("c.md", 0)),
        "threshold-gated chunk leaked into fused output"
    );
}

#[tokio::test]
async fn reingesting_a_source_overwrites_instead_of_duplicating() {
    let pipeline = build_pipeline(Arc::new(TokenHashEmbedder::new()), test_config(2, 0.5)).await;
    pipeline.ingest("alpha beta gamma delta", "a.md").await.unwrap();
    pipeline.ingest("alpha beta gamma epsilon", "a.md").await.unwrap();

    let results = pipeline.hybrid_search("alpha beta gamma").await.unwrap();

    assert_eq!(results.iter().filter(|r| r.id == chunk_id("a.md", 0)).count(), 1);
    assert!(results[0].text.contains("epsilon"), "semantic index must serve the new text");
}

#[tokio::test]
async fn embedding_cache_spares_repeat_provider_calls() {
    let embedder = Arc::new(TokenHashEmbedder::new());
    let pipeline = build_pipeline(embedder.clone(), test_config(2, 0.5)).await;

    pipeline.ingest("alpha beta gamma delta", "a.md").await.unwrap();
    assert_eq!(embedder.call_count(), 1);

    // Same chunk text again: served from the cache.
    pipeline.ingest("alpha beta gamma delta", "a.md").await.unwrap();
    assert_eq!(embedder.call_count(), 1);

    pipeline.hybrid_search("alpha beta").await.unwrap();
    pipeline.hybrid_search("alpha beta").await.unwrap();
    assert_eq!(embedder.call_count(), 2, "query embedded once, then cached");
}

#[tokio::test]
async fn snapshot_persist_failure_does_not_fail_ingest() {
    // The snapshot path points into a directory that does not exist, so
    // every persist fails; ingestion must still succeed and lexical
    // search must keep serving from memory.
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("missing").join("bm25_corpus.json");
    let config = test_config(2, 0.5);
    let embedder = Arc::new(TokenHashEmbedder::new().with_override("gamma", vec![0.0; DIM]));

    let pipeline = RagPipeline::builder()
        .config(config.clone())
        .embedding_provider(embedder)
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .chunker(Arc::new(RecursiveChunker::from_config(&config)))
        .lexical_index(Arc::new(LexicalIndex::new(&snapshot)))
        .build()
        .unwrap();
    pipeline.init().await.unwrap();

    assert_eq!(pipeline.ingest("alpha beta gamma delta", "a.md").await.unwrap(), 1);
    assert_eq!(pipeline.ingest("epsilon zeta eta theta", "b.md").await.unwrap(), 1);
    assert_eq!(pipeline.ingest("iota kappa lambda mu", "c.md").await.unwrap(), 1);
    assert_eq!(pipeline.lexical_index().len().await, 3);

    let results = pipeline.hybrid_search("gamma").await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, chunk_id("a.md", 0));
}

#[tokio::test]
async fn lexical_corpus_survives_a_pipeline_restart() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("bm25_corpus.json");
    let config = test_config(2, 0.5);
    // Queries embed to zero so only the lexical path serves results.
    let make_embedder =
        || Arc::new(TokenHashEmbedder::new().with_override("gamma", vec![0.0; DIM]));

    {
        let pipeline = RagPipeline::builder()
            .config(config.clone())
            .embedding_provider(make_embedder())
            .vector_store(Arc::new(InMemoryVectorStore::new()))
            .chunker(Arc::new(RecursiveChunker::from_config(&config)))
            .lexical_index(Arc::new(LexicalIndex::new(&snapshot)))
            .build()
            .unwrap();
        pipeline.init().await.unwrap();
        pipeline.ingest("alpha beta gamma delta", "a.md").await.unwrap();
        pipeline.ingest("epsilon zeta eta theta", "b.md").await.unwrap();
        pipeline.ingest("iota kappa lambda mu", "c.md").await.unwrap();
    }

    let pipeline = RagPipeline::builder()
        .config(config.clone())
        .embedding_provider(make_embedder())
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .chunker(Arc::new(RecursiveChunker::from_config(&config)))
        .lexical_index(Arc::new(LexicalIndex::new(&snapshot)))
        .build()
        .unwrap();
    pipeline.init().await.unwrap();

    let results = pipeline.hybrid_search("gamma").await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, chunk_id("a.md", 0));
}
