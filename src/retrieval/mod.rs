//! Retrieval strategies
//!
//! Six strategies behind one contract:
//! - Keyword (BM25) and Semantic (embedding cosine)
//! - Hybrid, fusing both with Reciprocal Rank Fusion
//! - Pattern (regex or literal phrase)
//! - Genre and Actor filters
//!
//! [`StrategyRegistry`] owns one instance of each and is the only entry point
//! the agent uses.

mod actor;
mod bm25;
mod fusion;
mod genre;
mod hybrid;
mod keyword;
mod pattern;
mod reranker;
mod semantic;

pub use actor::*;
pub use bm25::*;
pub use fusion::*;
pub use genre::*;
pub use hybrid::*;
pub use keyword::*;
pub use pattern::*;
pub use reranker::*;
pub use semantic::*;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::config::RetrievalConfig;
use crate::corpus::MovieCorpus;
use crate::embedding::{EmbeddingBackend, EmbeddingStore};
use crate::types::{finalize_candidates, ResultSet, StrategyKind, ToolInfo};

/// A retrieval strategy: `(query, limit) -> ResultSet`.
///
/// Implementations never fail. Candidates come back sorted by descending
/// score (ties by ascending id) with at most `limit` entries and no duplicate
/// ids. A strategy whose provider is unreachable returns an empty, degraded
/// result set.
pub trait SearchStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn search(&self, query: &str, limit: usize) -> ResultSet;
}

/// One instance of every strategy over a shared corpus
#[derive(Debug)]
pub struct StrategyRegistry {
    keyword: Arc<KeywordSearch>,
    semantic: Arc<SemanticSearch>,
    hybrid: HybridSearch,
    pattern: PatternSearch,
    genre: GenreSearch,
    actor: ActorSearch,
    cast_lexicon: HashSet<String>,
}

impl StrategyRegistry {
    /// Build every strategy, embedding the corpus with `backend`.
    ///
    /// A failing embedding provider leaves semantic search degraded rather than
    /// failing the build.
    pub fn build(
        corpus: &MovieCorpus,
        backend: Arc<dyn EmbeddingBackend>,
        config: &RetrievalConfig,
    ) -> Self {
        let store = EmbeddingStore::try_build(corpus, backend.as_ref());
        Self::with_store(corpus, backend, store, config)
    }

    /// Build with a precomputed (or absent) embedding store
    pub fn with_store(
        corpus: &MovieCorpus,
        backend: Arc<dyn EmbeddingBackend>,
        store: Option<Arc<EmbeddingStore>>,
        config: &RetrievalConfig,
    ) -> Self {
        let started = Instant::now();
        let params = Bm25Params::from(config);

        let keyword = Arc::new(KeywordSearch::new(corpus, params));
        let semantic = Arc::new(SemanticSearch::new(backend, store));
        let hybrid = HybridSearch::new(
            Arc::clone(&keyword),
            Arc::clone(&semantic),
            RrfConfig { k: config.rrf_k },
            config.hybrid_candidate_multiplier,
        );
        let pattern = PatternSearch::new(corpus.clone(), config);
        let genre = GenreSearch::new(corpus.clone(), GenreSynonymTable::default(), config);
        let actor = ActorSearch::new(corpus.clone(), params, config);
        let cast_lexicon = actor.cast_lexicon();

        info!(
            "Strategies ready over {} movies in {:?} (semantic {})",
            corpus.len(),
            started.elapsed(),
            if semantic.is_available() { "available" } else { "degraded" }
        );

        Self {
            keyword,
            semantic,
            hybrid,
            pattern,
            genre,
            actor,
            cast_lexicon,
        }
    }

    pub fn strategy(&self, kind: StrategyKind) -> &dyn SearchStrategy {
        match kind {
            StrategyKind::Keyword => self.keyword.as_ref(),
            StrategyKind::Semantic => self.semantic.as_ref(),
            StrategyKind::Hybrid => &self.hybrid,
            StrategyKind::Pattern => &self.pattern,
            StrategyKind::Genre => &self.genre,
            StrategyKind::Actor => &self.actor,
        }
    }

    /// Run one strategy. Blank queries and a zero limit yield an empty set.
    pub fn search(&self, kind: StrategyKind, query: &str, limit: usize) -> ResultSet {
        if query.trim().is_empty() || limit == 0 {
            return ResultSet::empty(kind, query);
        }

        let started = Instant::now();
        let mut result = self.strategy(kind).search(query, limit);
        finalize_candidates(&mut result.candidates, limit);

        info!(
            strategy = kind.name(),
            hits = result.len(),
            degraded = result.degraded,
            "Strategy {} for {:?} took {:?}",
            kind,
            query,
            started.elapsed()
        );
        result
    }

    /// Tool catalog handed to decision policies
    pub fn catalog(&self) -> Vec<ToolInfo> {
        StrategyKind::ALL.into_iter().map(ToolInfo::from).collect()
    }

    pub fn genre_table(&self) -> &GenreSynonymTable {
        self.genre.table()
    }

    /// Normalized cast-name tokens across the corpus
    pub fn cast_lexicon(&self) -> &HashSet<String> {
        &self.cast_lexicon
    }

    pub fn semantic_available(&self) -> bool {
        self.semantic.is_available()
    }
}
