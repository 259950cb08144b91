//! Embedding-similarity strategy

use std::sync::Arc;

use super::SearchStrategy;
use crate::embedding::{cosine_similarity, EmbeddingBackend, EmbeddingStore};
use crate::types::{finalize_candidates, MovieId, ResultSet, ScoredCandidate, StrategyKind};
use tracing::{debug, warn};

/// Cosine similarity between the query and precomputed movie vectors,
/// mapped to [0, 1] via `(cos + 1) / 2`.
///
/// Only movies with positive similarity are returned. A missing store or a
/// failed query embedding yields an empty, degraded result.
#[derive(Debug)]
pub struct SemanticSearch {
    backend: Arc<dyn EmbeddingBackend>,
    store: Option<Arc<EmbeddingStore>>,
}

impl SemanticSearch {
    pub fn new(backend: Arc<dyn EmbeddingBackend>, store: Option<Arc<EmbeddingStore>>) -> Self {
        Self { backend, store }
    }

    pub fn is_available(&self) -> bool {
        self.store.is_some()
    }

    /// Ranked `(id, score)` or `None` when the provider is unavailable
    pub fn ranked(&self, query: &str, limit: usize) -> Option<Vec<(MovieId, f32)>> {
        let store = self.store.as_ref()?;

        let query_vector = match self.backend.embed(query) {
            Ok(v) => v,
            Err(e) => {
                warn!("Query embedding failed, semantic search degraded: {}", e);
                return None;
            }
        };
        if query_vector.len() != store.dimensions() {
            warn!(
                "Query embedding has {} dims, store has {}",
                query_vector.len(),
                store.dimensions()
            );
            return None;
        }

        let mut candidates: Vec<ScoredCandidate> = store
            .iter()
            .filter_map(|(id, doc)| {
                let cos = cosine_similarity(&query_vector, doc);
                (cos > 0.0).then(|| ScoredCandidate::new(*id, (cos + 1.0) / 2.0, StrategyKind::Semantic))
            })
            .collect();
        finalize_candidates(&mut candidates, limit);

        debug!("Semantic search: {} results", candidates.len());
        Some(candidates.into_iter().map(|c| (c.movie_id, c.score)).collect())
    }
}

impl SearchStrategy for SemanticSearch {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Semantic
    }

    fn search(&self, query: &str, limit: usize) -> ResultSet {
        match self.ranked(query, limit) {
            Some(hits) => ResultSet::new(
                StrategyKind::Semantic,
                query,
                hits.into_iter()
                    .map(|(id, score)| ScoredCandidate::new(id, score, StrategyKind::Semantic))
                    .collect(),
            ),
            None => ResultSet::degraded(StrategyKind::Semantic, query),
        }
    }
}
