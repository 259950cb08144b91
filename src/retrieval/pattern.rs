//! Regular-expression / literal phrase matching

use regex::{Regex, RegexBuilder};

use super::SearchStrategy;
use crate::config::RetrievalConfig;
use crate::corpus::MovieCorpus;
use crate::types::{finalize_candidates, ResultSet, ScoredCandidate, StrategyKind};
use tracing::debug;

const REGEX_SIZE_LIMIT: usize = 1 << 20;

enum Matcher {
    Regex(Regex),
    /// Lowercased needle used when the query is not a valid regex
    Literal(String),
}

impl Matcher {
    fn compile(query: &str) -> Self {
        match RegexBuilder::new(query)
            .case_insensitive(true)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
        {
            Ok(re) => Matcher::Regex(re),
            Err(e) => {
                debug!("Pattern {:?} is not a valid regex ({}), matching literally", query, e);
                Matcher::Literal(query.to_lowercase())
            }
        }
    }

    fn is_match(&self, text: &str) -> bool {
        match self {
            Matcher::Regex(re) => re.is_match(text),
            Matcher::Literal(needle) => text.to_lowercase().contains(needle.as_str()),
        }
    }
}

/// Title matches score `title_score`, description-only matches `description_score`
#[derive(Debug, Clone)]
pub struct PatternSearch {
    corpus: MovieCorpus,
    title_score: f32,
    description_score: f32,
}

impl PatternSearch {
    pub fn new(corpus: MovieCorpus, config: &RetrievalConfig) -> Self {
        Self {
            corpus,
            title_score: config.pattern_title_score,
            description_score: config.pattern_description_score,
        }
    }
}

impl SearchStrategy for PatternSearch {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Pattern
    }

    fn search(&self, query: &str, limit: usize) -> ResultSet {
        let pattern = query.trim();
        if pattern.is_empty() {
            return ResultSet::empty(StrategyKind::Pattern, query);
        }

        let matcher = Matcher::compile(pattern);
        let mut candidates: Vec<ScoredCandidate> = self
            .corpus
            .iter()
            .filter_map(|record| {
                let score = if matcher.is_match(&record.title) {
                    self.title_score
                } else if matcher.is_match(&record.description) {
                    self.description_score
                } else {
                    return None;
                };
                Some(ScoredCandidate::new(record.id, score, StrategyKind::Pattern))
            })
            .collect();
        finalize_candidates(&mut candidates, limit);

        ResultSet::new(StrategyKind::Pattern, query, candidates)
    }
}
