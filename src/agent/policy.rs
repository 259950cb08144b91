//! Decision policies: choose the next `(strategy, query)` pair or stop

use std::collections::HashSet;
use std::fmt::Debug;

use crate::agent::history::RunHistory;
use crate::merge::CandidatePool;
use crate::retrieval::{parse_actor_names, GenreSynonymTable, StrategyRegistry, MIN_NAME_TOKEN_CHARS};
use crate::types::{StrategyKind, ToolInfo};
use crate::util::normalize_text;

/// Everything a policy may look at when deciding
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    pub query: &'a str,
    pub history: &'a RunHistory,
    pub pool: &'a CandidatePool,
    pub catalog: &'a [ToolInfo],
    pub result_limit: usize,
}

/// A policy's answer for one step.
///
/// `tool` carries the catalog name as the policy produced it; the loop
/// resolves and validates it.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub continue_search: bool,
    pub tool: Option<String>,
    pub query: Option<String>,
    pub rationale: String,
}

impl Decision {
    pub fn stop(rationale: impl Into<String>) -> Self {
        Self {
            continue_search: false,
            tool: None,
            query: None,
            rationale: rationale.into(),
        }
    }

    pub fn run(strategy: StrategyKind, query: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            continue_search: true,
            tool: Some(strategy.name().to_string()),
            query: Some(query.into()),
            rationale: rationale.into(),
        }
    }
}

pub trait DecisionPolicy: Send + Sync + Debug {
    fn decide(&self, ctx: &DecisionContext<'_>) -> Decision;

    fn name(&self) -> &str;
}

const ACTOR_CUES: &[&str] = &["with", "starring", "featuring"];

const NAME_STOPWORDS: &[&str] = &[
    "a", "an", "the", "of", "about", "movie", "movies", "film", "films", "some", "that", "for",
    "in", "by", "from", "to", "me", "my", "i", "show", "find",
];

const MAX_NAME_TOKENS: usize = 6;

#[derive(Debug, Clone)]
struct PlanStep {
    strategy: StrategyKind,
    query: String,
    rationale: String,
}

/// Rule-based policy.
///
/// Targeted strategies come first (quoted phrase, actor mention, genre term),
/// then broad recall. Concept queries with no targeted step get the full broad
/// sequence: hybrid, semantic, keyword.
#[derive(Debug, Clone)]
pub struct HeuristicPolicy {
    genres: GenreSynonymTable,
    cast_lexicon: HashSet<String>,
}

impl HeuristicPolicy {
    pub fn new(genres: GenreSynonymTable, cast_lexicon: HashSet<String>) -> Self {
        Self {
            genres,
            cast_lexicon,
        }
    }

    pub fn from_registry(registry: &StrategyRegistry) -> Self {
        Self::new(registry.genre_table().clone(), registry.cast_lexicon().clone())
    }

    fn is_name_boundary(&self, token: &str) -> bool {
        ACTOR_CUES.contains(&token)
            || NAME_STOPWORDS.contains(&token)
            || self.genres.resolve(token).is_some()
    }

    fn is_known_cast_token(&self, token: &str) -> bool {
        token.chars().count() >= MIN_NAME_TOKEN_CHARS && self.cast_lexicon.contains(token)
    }

    /// Actor name mentioned in the query, if any
    fn actor_mention(&self, query: &str) -> Option<String> {
        let normalized = normalize_text(query);
        let tokens: Vec<&str> = normalized.split_whitespace().collect();

        // "... with/starring/featuring <name>"
        if let Some(cue) = tokens.iter().position(|t| ACTOR_CUES.contains(t)) {
            let name: Vec<&str> = tokens[cue + 1..]
                .iter()
                .copied()
                .take_while(|t| !self.is_name_boundary(t))
                .take(MAX_NAME_TOKENS)
                .collect();
            if name.iter().any(|t| self.is_known_cast_token(t)) {
                let name = name.join(" ");
                if !parse_actor_names(&name).is_empty() {
                    return Some(name);
                }
            }
        }

        // Longest run of known cast-name tokens
        let mut best: Vec<&str> = Vec::new();
        let mut run: Vec<&str> = Vec::new();
        for token in tokens {
            if self.is_known_cast_token(token) && !self.is_name_boundary(token) {
                run.push(token);
                if run.len() > best.len() {
                    best = run.clone();
                }
            } else {
                run.clear();
            }
        }
        let name = best.join(" ");
        (!parse_actor_names(&name).is_empty()).then_some(name)
    }

    fn plan(&self, query: &str) -> Vec<PlanStep> {
        let mut steps = Vec::new();

        if let Some(phrase) = quoted_phrase(query) {
            steps.push(PlanStep {
                strategy: StrategyKind::Pattern,
                query: phrase.to_string(),
                rationale: format!("Quoted phrase \"{}\" calls for exact matching", phrase),
            });
        }

        if let Some(name) = self.actor_mention(query) {
            steps.push(PlanStep {
                strategy: StrategyKind::Actor,
                query: name.clone(),
                rationale: format!("Query mentions actor \"{}\"", name),
            });
        }

        if let Some(genre) = self.genres.resolve(query) {
            steps.push(PlanStep {
                strategy: StrategyKind::Genre,
                query: genre.to_string(),
                rationale: format!("Query names genre \"{}\"", genre),
            });
        }

        let targeted = !steps.is_empty();
        steps.push(PlanStep {
            strategy: StrategyKind::Hybrid,
            query: query.to_string(),
            rationale: "Broad recall over keywords and meaning".to_string(),
        });
        if !targeted {
            steps.push(PlanStep {
                strategy: StrategyKind::Semantic,
                query: query.to_string(),
                rationale: "Concept query, widen with semantic recall".to_string(),
            });
            steps.push(PlanStep {
                strategy: StrategyKind::Keyword,
                query: query.to_string(),
                rationale: "Concept query, widen with exact terms".to_string(),
            });
        }

        steps
    }
}

impl DecisionPolicy for HeuristicPolicy {
    fn decide(&self, ctx: &DecisionContext<'_>) -> Decision {
        let filters_done =
            ctx.history.has_run(StrategyKind::Actor) && ctx.history.has_run(StrategyKind::Genre);
        if filters_done && ctx.pool.len() >= ctx.result_limit {
            return Decision::stop("Actor and genre filters applied with enough candidates");
        }

        self.plan(ctx.query)
            .into_iter()
            .find(|step| !ctx.history.has_tried(step.strategy, &step.query))
            .map(|step| Decision::run(step.strategy, step.query, step.rationale))
            .unwrap_or_else(|| Decision::stop("Search plan exhausted"))
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

/// First phrase enclosed in straight or curly double quotes
fn quoted_phrase(query: &str) -> Option<&str> {
    let open = query.find(['"', '\u{201c}'])?;
    let open_len = query[open..].chars().next()?.len_utf8();
    let rest = &query[open + open_len..];
    let close = rest.find(['"', '\u{201d}'])?;
    let phrase = rest[..close].trim();
    (!phrase.is_empty()).then_some(phrase)
}
