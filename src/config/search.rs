//! Agent loop and merge configuration

use serde::{Deserialize, Serialize};

use crate::merge::{IntersectionMode, MergeMode};
use crate::types::{SearchRequest, StrategyKind};

/// Which decision policy drives the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    Heuristic,
    Llm,
}

/// Which reranker orders the final pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RerankerKind {
    Score,
    Llm,
}

/// Agent loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Hard cap on decide/execute/merge cycles per run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Limit passed to every strategy invocation
    #[serde(default = "default_max_results_per_tool")]
    pub max_results_per_tool: usize,
    /// Number of hits returned to the caller
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,
    /// Wall-clock budget for one run
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,
    #[serde(default = "default_policy")]
    pub policy: PolicyKind,
    #[serde(default = "default_reranker")]
    pub reranker: RerankerKind,
    /// Payload cap for the remote reranker
    #[serde(default = "default_rerank_max_candidates")]
    pub rerank_max_candidates: usize,
}

fn default_max_iterations() -> usize {
    5
}

fn default_max_results_per_tool() -> usize {
    10
}

fn default_result_limit() -> usize {
    5
}

fn default_run_timeout_secs() -> u64 {
    60
}

fn default_policy() -> PolicyKind {
    PolicyKind::Heuristic
}

fn default_reranker() -> RerankerKind {
    RerankerKind::Score
}

fn default_rerank_max_candidates() -> usize {
    20
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_results_per_tool: default_max_results_per_tool(),
            result_limit: default_result_limit(),
            run_timeout_secs: default_run_timeout_secs(),
            policy: default_policy(),
            reranker: default_reranker(),
            rerank_max_candidates: default_rerank_max_candidates(),
        }
    }
}

impl AgentConfig {
    /// Build a request carrying this config's limits
    pub fn request(&self, query: impl Into<String>) -> SearchRequest {
        SearchRequest::new(query)
            .with_max_iterations(self.max_iterations)
            .with_max_results_per_tool(self.max_results_per_tool)
            .with_result_limit(self.result_limit)
    }
}

/// Merge engine weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    #[serde(default = "default_merge_mode")]
    pub mode: MergeMode,
    /// Membership rule applied by intersections
    #[serde(default = "default_intersection_mode")]
    pub intersection_mode: IntersectionMode,
    /// Sets a movie must appear in under the loose rule
    #[serde(default = "default_min_intersection_matches")]
    pub min_intersection_matches: usize,
    /// Added to an intersection score for each set beyond the first
    #[serde(default = "default_completeness_bonus")]
    pub completeness_bonus: f32,
    /// Intersection weight for filter-family scores
    #[serde(default = "default_filter_weight")]
    pub filter_weight: f32,
    /// Intersection weight for broad-recall scores
    #[serde(default = "default_broad_weight")]
    pub broad_weight: f32,
    /// Extra multiplier for actor hits in the fallback union
    #[serde(default = "default_actor_boost")]
    pub actor_boost: f32,
    /// Extra multiplier for genre hits in the fallback union
    #[serde(default = "default_genre_boost")]
    pub genre_boost: f32,
}

fn default_merge_mode() -> MergeMode {
    MergeMode::Auto
}

fn default_intersection_mode() -> IntersectionMode {
    IntersectionMode::Auto
}

fn default_min_intersection_matches() -> usize {
    2
}

fn default_completeness_bonus() -> f32 {
    0.1
}

fn default_filter_weight() -> f32 {
    2.0
}

fn default_broad_weight() -> f32 {
    1.0
}

fn default_actor_boost() -> f32 {
    1.5
}

fn default_genre_boost() -> f32 {
    1.0
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            mode: default_merge_mode(),
            intersection_mode: default_intersection_mode(),
            min_intersection_matches: default_min_intersection_matches(),
            completeness_bonus: default_completeness_bonus(),
            filter_weight: default_filter_weight(),
            broad_weight: default_broad_weight(),
            actor_boost: default_actor_boost(),
            genre_boost: default_genre_boost(),
        }
    }
}

impl MergeConfig {
    /// Fallback-union multiplier for a strategy
    pub fn boost(&self, kind: StrategyKind) -> f32 {
        match kind {
            StrategyKind::Actor => self.actor_boost,
            StrategyKind::Genre => self.genre_boost,
            _ => 1.0,
        }
    }
}
