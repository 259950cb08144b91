//! BM25 keyword strategy over title, description and genres

use super::bm25::{Bm25Params, InvertedIndex};
use super::SearchStrategy;
use crate::corpus::MovieCorpus;
use crate::types::{MovieId, ResultSet, ScoredCandidate, StrategyKind};
use tracing::debug;

pub struct KeywordSearch {
    index: InvertedIndex,
}

impl KeywordSearch {
    pub fn new(corpus: &MovieCorpus, params: Bm25Params) -> Self {
        let texts: Vec<(MovieId, String)> = corpus
            .iter()
            .map(|record| (record.id, record.searchable_text()))
            .collect();
        let index = InvertedIndex::build(texts.iter().map(|(id, t)| (*id, t.as_str())), params);
        debug!(
            "Keyword index built: {} docs, avg length {:.1}",
            index.doc_count(),
            index.avg_doc_len()
        );
        Self { index }
    }

    /// Ranked `(id, score)` with scores divided by the best score
    pub fn ranked(&self, query: &str, limit: usize) -> Vec<(MovieId, f32)> {
        let mut hits = self.index.search(query, limit);
        if let Some(best) = hits.first().map(|(_, s)| *s) {
            for (_, score) in hits.iter_mut() {
                *score /= best;
            }
        }
        hits
    }
}

impl SearchStrategy for KeywordSearch {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Keyword
    }

    fn search(&self, query: &str, limit: usize) -> ResultSet {
        let candidates = self
            .ranked(query, limit)
            .into_iter()
            .map(|(id, score)| ScoredCandidate::new(id, score, StrategyKind::Keyword))
            .collect();
        ResultSet::new(StrategyKind::Keyword, query, candidates)
    }
}

impl std::fmt::Debug for KeywordSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordSearch")
            .field("docs", &self.index.doc_count())
            .finish()
    }
}
