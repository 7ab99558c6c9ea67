//! Reciprocal Rank Fusion of the semantic and lexical result lists.
//!
//! RRF merges two ranked lists using only rank positions, so the raw
//! scores — cosine similarity on one side, BM25 on the other — never
//! need to be normalized onto a common scale. Each item contributes
//! `1 / (k + rank)` per list it appears in; items found by both paths
//! accumulate both contributions and appear once in the output.

use std::collections::HashMap;

use crate::document::SearchResult;

struct Candidate {
    result: SearchResult,
    fused_score: f64,
    semantic_rank: Option<usize>,
    lexical_rank: Option<usize>,
}

/// Fuse two internally rank-ordered lists into one, best first.
///
/// `rrf_k` is the smoothing constant (60 by default); larger values
/// compress the influence of rank differences. Rank 1 is the most
/// relevant item within its own list.
///
/// Ties on the fused score are broken deterministically: the item with
/// the better semantic rank wins (any semantic rank beats none), then
/// the better lexical rank, then the lexicographically smaller id.
pub fn reciprocal_rank_fusion(
    semantic: &[SearchResult],
    lexical: &[SearchResult],
    rrf_k: f32,
) -> Vec<SearchResult> {
    let k = rrf_k as f64;
    let mut by_id: HashMap<&str, Candidate> = HashMap::new();

    for (rank, result) in semantic.iter().enumerate() {
        let rank = rank + 1;
        by_id.insert(
            result.id.as_str(),
            Candidate {
                result: result.clone(),
                fused_score: 1.0 / (k + rank as f64),
                semantic_rank: Some(rank),
                lexical_rank: None,
            },
        );
    }

    for (rank, result) in lexical.iter().enumerate() {
        let rank = rank + 1;
        let contribution = 1.0 / (k + rank as f64);
        by_id
            .entry(result.id.as_str())
            .and_modify(|candidate| {
                candidate.fused_score += contribution;
                candidate.lexical_rank = Some(rank);
            })
            .or_insert_with(|| Candidate {
                result: result.clone(),
                fused_score: contribution,
                semantic_rank: None,
                lexical_rank: Some(rank),
            });
    }

    let mut candidates: Vec<Candidate> = by_id.into_values().collect();
    candidates.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| rank_key(a.semantic_rank).cmp(&rank_key(b.semantic_rank)))
            .then_with(|| rank_key(a.lexical_rank).cmp(&rank_key(b.lexical_rank)))
            .then_with(|| a.result.id.cmp(&b.result.id))
    });

    candidates
        .into_iter()
        .map(|candidate| SearchResult { score: candidate.fused_score as f32, ..candidate.result })
        .collect()
}

/// Absent ranks sort after any present rank.
fn rank_key(rank: Option<usize>) -> usize {
    rank.unwrap_or(usize::MAX)
}
