//! Hybrid retrieval combining keyword and semantic search

use std::sync::Arc;

use super::fusion::{max_rrf_score, reciprocal_rank_fusion, to_ranked_results, RrfConfig};
use super::keyword::KeywordSearch;
use super::semantic::SemanticSearch;
use super::SearchStrategy;
use crate::types::{finalize_candidates, ResultSet, ScoredCandidate, StrategyKind};
use tracing::debug;

/// Runs keyword and semantic concurrently and fuses their rankings with RRF.
///
/// Fused scores are divided by the best achievable RRF score (first place in
/// both lists) so they land in [0, 1]. If semantic is degraded the keyword
/// ranking alone is fused and the result is flagged degraded.
#[derive(Debug)]
pub struct HybridSearch {
    keyword: Arc<KeywordSearch>,
    semantic: Arc<SemanticSearch>,
    rrf: RrfConfig,
    candidate_multiplier: usize,
}

impl HybridSearch {
    pub fn new(
        keyword: Arc<KeywordSearch>,
        semantic: Arc<SemanticSearch>,
        rrf: RrfConfig,
        candidate_multiplier: usize,
    ) -> Self {
        Self {
            keyword,
            semantic,
            rrf,
            candidate_multiplier: candidate_multiplier.max(1),
        }
    }
}

impl SearchStrategy for HybridSearch {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Hybrid
    }

    fn search(&self, query: &str, limit: usize) -> ResultSet {
        let fetch = limit.saturating_mul(self.candidate_multiplier);

        let (keyword_hits, semantic_hits) = rayon::join(
            || self.keyword.ranked(query, fetch),
            || self.semantic.ranked(query, fetch),
        );

        let degraded = semantic_hits.is_none();
        let mut ranked_lists = vec![to_ranked_results(&keyword_hits, StrategyKind::Keyword)];
        if let Some(hits) = &semantic_hits {
            ranked_lists.push(to_ranked_results(hits, StrategyKind::Semantic));
        }

        let fused = reciprocal_rank_fusion(&ranked_lists, &self.rrf);
        let ceiling = max_rrf_score(2, &self.rrf);

        let mut candidates: Vec<ScoredCandidate> = fused
            .into_iter()
            .map(|f| ScoredCandidate::new(f.movie_id, (f.rrf_score / ceiling).min(1.0), StrategyKind::Hybrid))
            .collect();
        finalize_candidates(&mut candidates, limit);

        debug!(
            "Hybrid search: keyword={} semantic={:?} fused={}",
            keyword_hits.len(),
            semantic_hits.as_ref().map(Vec::len),
            candidates.len()
        );

        ResultSet {
            degraded,
            ..ResultSet::new(StrategyKind::Hybrid, query, candidates)
        }
    }
}
