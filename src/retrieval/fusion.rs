//! Result fusion strategies
//!
//! Implements Reciprocal Rank Fusion (RRF) for combining rankings from
//! strategies whose score scales are not comparable.

use crate::types::{rank_order, MovieId, StrategyKind};
use std::collections::HashMap;

/// Reciprocal Rank Fusion (RRF) parameters
#[derive(Debug, Clone)]
pub struct RrfConfig {
    /// K parameter for RRF (default: 60)
    pub k: usize,
}

impl Default for RrfConfig {
    fn default() -> Self {
        Self { k: 60 }
    }
}

/// A ranked result from a single strategy
#[derive(Debug, Clone)]
pub struct RankedResult {
    pub movie_id: MovieId,
    /// 1-indexed rank
    pub rank: usize,
    pub original_score: f32,
    pub method: StrategyKind,
}

/// Fused result after combining multiple ranking sources
#[derive(Debug, Clone)]
pub struct FusedResult {
    pub movie_id: MovieId,
    pub rrf_score: f32,
    pub contributing_methods: Vec<StrategyKind>,
    pub rank_per_method: HashMap<StrategyKind, usize>,
}

/// Compute Reciprocal Rank Fusion score for multiple ranking lists
///
/// RRF score = Σ 1/(k + rank_r(d)) for all rankers r
///
/// A movie absent from a list contributes nothing for that list.
pub fn reciprocal_rank_fusion(
    ranked_lists: &[Vec<RankedResult>],
    config: &RrfConfig,
) -> Vec<FusedResult> {
    let mut movie_scores: HashMap<MovieId, FusedResult> = HashMap::new();

    for results in ranked_lists {
        for result in results {
            let rrf_contribution = 1.0 / (config.k as f32 + result.rank as f32);

            movie_scores
                .entry(result.movie_id)
                .and_modify(|fused| {
                    fused.rrf_score += rrf_contribution;
                    if !fused.contributing_methods.contains(&result.method) {
                        fused.contributing_methods.push(result.method);
                    }
                    fused.rank_per_method.insert(result.method, result.rank);
                })
                .or_insert_with(|| FusedResult {
                    movie_id: result.movie_id,
                    rrf_score: rrf_contribution,
                    contributing_methods: vec![result.method],
                    rank_per_method: HashMap::from([(result.method, result.rank)]),
                });
        }
    }

    let mut results: Vec<FusedResult> = movie_scores.into_values().collect();
    results.sort_by(|a, b| rank_order(a.rrf_score, a.movie_id, b.rrf_score, b.movie_id));
    results
}

/// Convert an ordered `(id, score)` list to 1-indexed ranks
pub fn to_ranked_results(results: &[(MovieId, f32)], method: StrategyKind) -> Vec<RankedResult> {
    results
        .iter()
        .enumerate()
        .map(|(rank, (movie_id, score))| RankedResult {
            movie_id: *movie_id,
            rank: rank + 1,
            original_score: *score,
            method,
        })
        .collect()
}

/// Best achievable fused score: first place in every one of `lists` rankings
pub fn max_rrf_score(lists: usize, config: &RrfConfig) -> f32 {
    lists as f32 / (config.k as f32 + 1.0)
}
