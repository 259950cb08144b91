//! Retrieval strategy configuration

use serde::{Deserialize, Serialize};

/// Scoring constants shared by the six strategies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// BM25 term-frequency saturation
    #[serde(default = "default_bm25_k1")]
    pub bm25_k1: f32,
    /// BM25 length normalization
    #[serde(default = "default_bm25_b")]
    pub bm25_b: f32,
    /// RRF k parameter
    #[serde(default = "default_rrf_k")]
    pub rrf_k: usize,
    /// Hybrid fetches `limit * multiplier` from each sub-search before fusing
    #[serde(default = "default_hybrid_candidate_multiplier")]
    pub hybrid_candidate_multiplier: usize,
    #[serde(default = "default_title_match_score")]
    pub pattern_title_score: f32,
    #[serde(default = "default_description_match_score")]
    pub pattern_description_score: f32,
    #[serde(default = "default_genre_metadata_score")]
    pub genre_metadata_score: f32,
    #[serde(default = "default_genre_text_score")]
    pub genre_text_score: f32,
    #[serde(default = "default_actor_full_name_score")]
    pub actor_full_name_score: f32,
    #[serde(default = "default_actor_last_name_score")]
    pub actor_last_name_score: f32,
    /// Actor matches below this strength are discarded
    #[serde(default = "default_actor_min_confidence")]
    pub actor_min_confidence: f32,
    /// Cast recall fetches `limit * multiplier` candidates before re-ranking
    #[serde(default = "default_actor_recall_multiplier")]
    pub actor_recall_multiplier: usize,
}

fn default_bm25_k1() -> f32 {
    1.5
}

fn default_bm25_b() -> f32 {
    0.75
}

fn default_rrf_k() -> usize {
    60
}

fn default_hybrid_candidate_multiplier() -> usize {
    2
}

fn default_title_match_score() -> f32 {
    1.0
}

fn default_description_match_score() -> f32 {
    0.6
}

fn default_genre_metadata_score() -> f32 {
    1.0
}

fn default_genre_text_score() -> f32 {
    0.5
}

fn default_actor_full_name_score() -> f32 {
    1.0
}

fn default_actor_last_name_score() -> f32 {
    0.8
}

fn default_actor_min_confidence() -> f32 {
    0.5
}

fn default_actor_recall_multiplier() -> usize {
    3
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            bm25_k1: default_bm25_k1(),
            bm25_b: default_bm25_b(),
            rrf_k: default_rrf_k(),
            hybrid_candidate_multiplier: default_hybrid_candidate_multiplier(),
            pattern_title_score: default_title_match_score(),
            pattern_description_score: default_description_match_score(),
            genre_metadata_score: default_genre_metadata_score(),
            genre_text_score: default_genre_text_score(),
            actor_full_name_score: default_actor_full_name_score(),
            actor_last_name_score: default_actor_last_name_score(),
            actor_min_confidence: default_actor_min_confidence(),
            actor_recall_multiplier: default_actor_recall_multiplier(),
        }
    }
}
