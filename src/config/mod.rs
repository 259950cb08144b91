//! Configuration for marquee

mod embedding;
mod llm;
mod logging;
mod retrieval;
mod search;

pub use embedding::BackendConfig;
pub use llm::LlmConfig;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use retrieval::RetrievalConfig;
pub use search::{AgentConfig, MergeConfig, PolicyKind, RerankerKind};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Location of the movie snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    #[serde(default = "default_corpus_path")]
    pub path: PathBuf,
}

fn default_corpus_path() -> PathBuf {
    PathBuf::from("data/movies.json")
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            path: default_corpus_path(),
        }
    }
}

/// Main configuration; every section is optional in the TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub corpus: CorpusConfig,
    /// Embedding provider
    #[serde(default)]
    pub embedding: BackendConfig,
    /// Agent loop limits and pluggable stages
    #[serde(default)]
    pub agent: AgentConfig,
    /// Strategy scoring constants
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Merge engine weights
    #[serde(default)]
    pub merge: MergeConfig,
    /// Chat-completions service
    #[serde(default)]
    pub llm: LlmConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("Invalid config file '{}'", path.display()))?;
        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration fields.
    ///
    /// Collects all validation errors and reports them together.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        // Agent validation
        if self.agent.max_iterations == 0 {
            errors.push("max_iterations must be positive".to_string());
        }
        if self.agent.max_results_per_tool == 0 {
            errors.push("max_results_per_tool must be positive".to_string());
        }
        if self.agent.result_limit == 0 {
            errors.push("result_limit must be positive".to_string());
        }
        if self.agent.run_timeout_secs == 0 {
            errors.push("run_timeout_secs must be positive".to_string());
        }
        if self.agent.rerank_max_candidates == 0 {
            errors.push("rerank_max_candidates must be positive".to_string());
        }

        // Embedding validation
        let dimensions = self.embedding.dimensions();
        if dimensions == 0 {
            errors.push("embedding dimensions must be positive".to_string());
        }
        if dimensions > 4096 {
            errors.push("embedding dimensions must be <= 4096".to_string());
        }

        // Retrieval validation
        let r = &self.retrieval;
        if r.bm25_k1 < 0.0 {
            errors.push("bm25_k1 must not be negative".to_string());
        }
        if !(0.0..=1.0).contains(&r.bm25_b) {
            errors.push("bm25_b must be between 0.0 and 1.0".to_string());
        }
        if r.rrf_k == 0 {
            errors.push("rrf_k must be positive".to_string());
        }
        if r.hybrid_candidate_multiplier == 0 {
            errors.push("hybrid_candidate_multiplier must be positive".to_string());
        }
        if r.actor_recall_multiplier == 0 {
            errors.push("actor_recall_multiplier must be positive".to_string());
        }
        for (name, value) in [
            ("pattern_title_score", r.pattern_title_score),
            ("pattern_description_score", r.pattern_description_score),
            ("genre_metadata_score", r.genre_metadata_score),
            ("genre_text_score", r.genre_text_score),
            ("actor_full_name_score", r.actor_full_name_score),
            ("actor_last_name_score", r.actor_last_name_score),
            ("actor_min_confidence", r.actor_min_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(format!("{} must be between 0.0 and 1.0", name));
            }
        }

        // Merge validation
        let m = &self.merge;
        for (name, value) in [
            ("filter_weight", m.filter_weight),
            ("broad_weight", m.broad_weight),
            ("actor_boost", m.actor_boost),
            ("genre_boost", m.genre_boost),
        ] {
            if value.is_nan() || value <= 0.0 {
                errors.push(format!("{} must be positive", name));
            }
        }
        if m.min_intersection_matches == 0 {
            errors.push("min_intersection_matches must be positive".to_string());
        }
        if m.completeness_bonus.is_nan() || m.completeness_bonus < 0.0 {
            errors.push("completeness_bonus must not be negative".to_string());
        }

        // LLM validation
        if self.llm.endpoint.trim().is_empty() {
            errors.push("llm endpoint must not be empty".to_string());
        }
        if self.llm.timeout_secs == 0 {
            errors.push("llm timeout_secs must be positive".to_string());
        }

        if self.corpus.path.as_os_str().is_empty() {
            errors.push("corpus path must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}
