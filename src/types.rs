//! Core types for the marquee search system

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use crate::error::SearchError;

/// Unique, stable identifier for a movie
pub type MovieId = u64;

/// Embedding vector type
pub type Embedding = Vec<f32>;

// ============================================================================
// Corpus Types
// ============================================================================

/// An immutable movie record from the corpus snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieRecord {
    pub id: MovieId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Ordered cast list, billing order preserved
    #[serde(default)]
    pub cast: Vec<String>,
    #[serde(default, alias = "genres")]
    pub genre: BTreeSet<String>,
}

impl MovieRecord {
    pub fn new(id: MovieId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: String::new(),
            cast: Vec::new(),
            genre: BTreeSet::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_cast<I, S>(mut self, cast: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cast = cast.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_genres<I, S>(mut self, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.genre = genres.into_iter().map(Into::into).collect();
        self
    }

    /// Text used for lexical indexing: title, description and genres
    pub fn searchable_text(&self) -> String {
        let mut text = String::with_capacity(self.title.len() + self.description.len() + 32);
        text.push_str(&self.title);
        text.push(' ');
        text.push_str(&self.description);
        for genre in &self.genre {
            text.push(' ');
            text.push_str(genre);
        }
        text
    }
}

// ============================================================================
// Strategy Metadata
// ============================================================================

/// Family tag used by the merge engine to pick a fusion mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyFamily {
    /// High-recall strategies whose results are unioned
    BroadRecall,
    /// Precision strategies whose results are intersected
    Filter,
}

/// The fixed set of retrieval strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    #[serde(rename = "keyword_search")]
    Keyword,
    #[serde(rename = "semantic_search")]
    Semantic,
    #[serde(rename = "hybrid_search")]
    Hybrid,
    #[serde(rename = "pattern_search")]
    Pattern,
    #[serde(rename = "genre_search")]
    Genre,
    #[serde(rename = "actor_search")]
    Actor,
}

impl StrategyKind {
    /// Every strategy, in catalog order
    pub const ALL: [StrategyKind; 6] = [
        StrategyKind::Keyword,
        StrategyKind::Semantic,
        StrategyKind::Hybrid,
        StrategyKind::Pattern,
        StrategyKind::Genre,
        StrategyKind::Actor,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Keyword => "keyword_search",
            Self::Semantic => "semantic_search",
            Self::Hybrid => "hybrid_search",
            Self::Pattern => "pattern_search",
            Self::Genre => "genre_search",
            Self::Actor => "actor_search",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Keyword => {
                "Finds movies by exact keyword matching using BM25 over title, description and genres. \
                 Best for specific terms, titles, or phrases that appear in descriptions."
            }
            Self::Semantic => {
                "Finds movies by embedding similarity. Best for conceptual queries and themes \
                 where exact keywords might not match."
            }
            Self::Hybrid => {
                "Combines keyword and semantic search using Reciprocal Rank Fusion. \
                 Best for balanced queries that benefit from both approaches."
            }
            Self::Pattern => {
                "Matches a case-insensitive regular expression or literal phrase against titles \
                 and descriptions. Best for exact phrases such as 'bear attack'."
            }
            Self::Genre => {
                "Filters movies by genre (horror, thriller, comedy, sci-fi, ...). Understands \
                 synonyms such as 'suspense' -> thriller or 'science fiction' -> sci-fi."
            }
            Self::Actor => {
                "Finds movies featuring a named actor, tolerant of honorifics, last-name-only \
                 queries and small misspellings."
            }
        }
    }

    /// Family assignment table. New strategies must be added here explicitly.
    pub fn family(self) -> StrategyFamily {
        match self {
            Self::Keyword | Self::Semantic | Self::Hybrid | Self::Pattern => {
                StrategyFamily::BroadRecall
            }
            Self::Genre | Self::Actor => StrategyFamily::Filter,
        }
    }

    /// Parse a catalog name (as emitted by `name`)
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static catalog entry handed to decision policies
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub family: StrategyFamily,
}

impl From<StrategyKind> for ToolInfo {
    fn from(kind: StrategyKind) -> Self {
        Self {
            name: kind.name(),
            description: kind.description(),
            family: kind.family(),
        }
    }
}

// ============================================================================
// Retrieval Results
// ============================================================================

/// A single strategy-local scored hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub movie_id: MovieId,
    pub score: f32,
    pub source: StrategyKind,
}

impl ScoredCandidate {
    pub fn new(movie_id: MovieId, score: f32, source: StrategyKind) -> Self {
        Self {
            movie_id,
            score,
            source,
        }
    }
}

/// Descending score, ties broken by ascending movie id
pub fn rank_order(a_score: f32, a_id: MovieId, b_score: f32, b_id: MovieId) -> Ordering {
    b_score.total_cmp(&a_score).then_with(|| a_id.cmp(&b_id))
}

/// Sort candidates into the canonical order and truncate to `limit`
pub fn finalize_candidates(candidates: &mut Vec<ScoredCandidate>, limit: usize) {
    candidates.sort_by(|a, b| rank_order(a.score, a.movie_id, b.score, b.movie_id));
    candidates.truncate(limit);
}

/// Output of one strategy invocation
#[derive(Debug, Clone, Serialize)]
pub struct ResultSet {
    pub strategy: StrategyKind,
    pub query: String,
    pub candidates: Vec<ScoredCandidate>,
    /// Set when the strategy could not reach a required provider
    pub degraded: bool,
}

impl ResultSet {
    pub fn new(strategy: StrategyKind, query: impl Into<String>, candidates: Vec<ScoredCandidate>) -> Self {
        Self {
            strategy,
            query: query.into(),
            candidates,
            degraded: false,
        }
    }

    pub fn empty(strategy: StrategyKind, query: impl Into<String>) -> Self {
        Self::new(strategy, query, Vec::new())
    }

    pub fn degraded(strategy: StrategyKind, query: impl Into<String>) -> Self {
        Self {
            degraded: true,
            ..Self::empty(strategy, query)
        }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn movie_ids(&self) -> Vec<MovieId> {
        self.candidates.iter().map(|c| c.movie_id).collect()
    }

    pub fn score_of(&self, movie_id: MovieId) -> Option<f32> {
        self.candidates
            .iter()
            .find(|c| c.movie_id == movie_id)
            .map(|c| c.score)
    }
}

// ============================================================================
// Request / Response Types
// ============================================================================

/// Search request accepted by the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub max_iterations: usize,
    pub max_results_per_tool: usize,
    pub result_limit: usize,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_iterations: 5,
            max_results_per_tool: 10,
            result_limit: 5,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_max_results_per_tool(mut self, max_results_per_tool: usize) -> Self {
        self.max_results_per_tool = max_results_per_tool;
        self
    }

    pub fn with_result_limit(mut self, result_limit: usize) -> Self {
        self.result_limit = result_limit;
        self
    }

    /// Reject requests that cannot start a run
    pub fn validate(&self) -> Result<(), SearchError> {
        let mut problems = Vec::new();
        if self.query.trim().is_empty() {
            problems.push("query must not be empty".to_string());
        }
        if self.max_iterations == 0 {
            problems.push("max_iterations must be positive".to_string());
        }
        if self.max_results_per_tool == 0 {
            problems.push("max_results_per_tool must be positive".to_string());
        }
        if self.result_limit == 0 {
            problems.push("result_limit must be positive".to_string());
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(SearchError::InvalidRequest(problems.join("; ")))
        }
    }
}

/// One ranked movie in the final answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub movie_id: MovieId,
    pub title: String,
    pub score: f32,
    pub contributing_strategies: Vec<StrategyKind>,
}
