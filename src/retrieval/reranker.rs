//! Terminal reordering of the merged candidate pool
//!
//! Two implementations share one contract:
//! - [`ScoreReranker`] sorts by aggregated score (descending, ties by id)
//! - [`LlmReranker`] asks a chat-completions service for relevance and adopts
//!   its order, falling back to the score order on any failure

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::llm::{extract_json_object, CompletionService};
use crate::types::{rank_order, MovieId};
use crate::util::truncate_str;

/// Compact view of a pooled movie handed to a reranker
#[derive(Debug, Clone, PartialEq)]
pub struct RerankCandidate {
    pub movie_id: MovieId,
    pub title: String,
    pub description: String,
    /// Aggregated pool score
    pub score: f32,
}

pub trait Reranker: Send + Sync + Debug {
    /// Reorder candidates for `query`. Never fails; implementations fall back
    /// to score order internally.
    fn rerank(&self, query: &str, candidates: Vec<RerankCandidate>) -> Vec<RerankCandidate>;

    fn name(&self) -> &str;
}

fn sort_by_score(candidates: &mut [RerankCandidate]) {
    candidates.sort_by(|a, b| rank_order(a.score, a.movie_id, b.score, b.movie_id));
}

/// Deterministic reranker
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreReranker;

impl Reranker for ScoreReranker {
    fn rerank(&self, _query: &str, mut candidates: Vec<RerankCandidate>) -> Vec<RerankCandidate> {
        sort_by_score(&mut candidates);
        candidates
    }

    fn name(&self) -> &str {
        "score"
    }
}

#[derive(Serialize)]
struct PromptItem<'a> {
    index: usize,
    title: &'a str,
    description: String,
    score: f32,
}

const DESCRIPTION_EXCERPT: usize = 300;
/// Lists this short are returned in score order without a remote call
const MIN_REMOTE_CANDIDATES: usize = 3;

/// Remote reranker over a chat-completions service
#[derive(Debug)]
pub struct LlmReranker {
    service: Arc<dyn CompletionService>,
    max_candidates: usize,
}

impl LlmReranker {
    pub fn new(service: Arc<dyn CompletionService>, max_candidates: usize) -> Self {
        Self {
            service,
            max_candidates: max_candidates.max(1),
        }
    }

    fn build_prompt(query: &str, head: &[RerankCandidate]) -> String {
        let items: Vec<PromptItem<'_>> = head
            .iter()
            .enumerate()
            .map(|(index, c)| PromptItem {
                index,
                title: &c.title,
                description: truncate_str(&c.description, DESCRIPTION_EXCERPT),
                score: c.score,
            })
            .collect();
        let listing = serde_json::to_string_pretty(&items).unwrap_or_else(|_| "[]".to_string());

        format!(
            "You are re-ranking movie search results.\n\n\
             User query: \"{query}\"\n\n\
             Below are candidate movies with their current scores.\n\
             Re-rank them by how well they match the user's intent.\n\
             Respond ONLY with JSON:\n\
             {{\n  \"ranking\": [{{\"index\": int, \"relevance\": float between 0 and 1}}]\n}}\n\n\
             Candidates:\n{listing}\n"
        )
    }

    /// Relevance per head index, or `None` when the reply is unusable
    fn parse_ranking(reply: &str, head_len: usize) -> Option<HashMap<usize, f32>> {
        let value = extract_json_object(reply)?;
        let ranking = value.get("ranking")?.as_array()?;

        let mut relevance: HashMap<usize, f32> = HashMap::new();
        for entry in ranking {
            let Some(index) = entry.get("index").and_then(|i| i.as_u64()) else {
                continue;
            };
            let Some(score) = entry.get("relevance").and_then(|r| r.as_f64()) else {
                continue;
            };
            let index = index as usize;
            if index < head_len && score.is_finite() {
                relevance.entry(index).or_insert((score as f32).clamp(0.0, 1.0));
            }
        }

        // At least half of the submitted candidates must be ranked
        if (relevance.len() as f32) < 0.5 * head_len as f32 {
            debug!(
                "Rerank reply covered {} of {} candidates",
                relevance.len(),
                head_len
            );
            return None;
        }
        Some(relevance)
    }
}

impl Reranker for LlmReranker {
    fn rerank(&self, query: &str, mut candidates: Vec<RerankCandidate>) -> Vec<RerankCandidate> {
        sort_by_score(&mut candidates);
        if candidates.len() < MIN_REMOTE_CANDIDATES {
            return candidates;
        }

        let split = self.max_candidates.min(candidates.len());
        let tail = candidates.split_off(split);
        let head = candidates;

        let prompt = Self::build_prompt(query, &head);
        let relevance = match self.service.complete(&prompt) {
            Ok(reply) => Self::parse_ranking(&reply, head.len()),
            Err(e) => {
                warn!("Rerank call failed, keeping score order: {}", e);
                None
            }
        };

        let Some(relevance) = relevance else {
            warn!("Rerank reply unusable, keeping score order");
            let mut all = head;
            all.extend(tail);
            return all;
        };

        let mut indexed: Vec<(usize, RerankCandidate)> = head.into_iter().enumerate().collect();
        indexed.sort_by(|(ia, _), (ib, _)| {
            let ra = relevance.get(ia).copied().unwrap_or(-1.0);
            let rb = relevance.get(ib).copied().unwrap_or(-1.0);
            rb.total_cmp(&ra).then_with(|| ia.cmp(ib))
        });

        let mut reordered: Vec<RerankCandidate> = indexed.into_iter().map(|(_, c)| c).collect();
        reordered.extend(tail);
        reordered
    }

    fn name(&self) -> &str {
        "llm"
    }
}
