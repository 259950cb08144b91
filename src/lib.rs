//! Marquee: agentic multi-strategy movie search
//!
//! Answers natural-language movie queries by iteratively choosing among six
//! retrieval strategies and fusing their results:
//! - Keyword (BM25), Semantic (embeddings) and Hybrid (RRF) recall
//! - Pattern, Genre and Actor filters
//! - Family-aware union/intersection merging into a run-scoped pool
//! - Pluggable decision policy and reranker (heuristic or chat-completions)
//! - Golden-set evaluation with precision@k, recall@k and an optional judge

pub mod agent;
pub mod answer;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod evaluation;
pub mod llm;
pub mod merge;
pub mod retrieval;
pub mod types;
pub mod util;

pub use agent::{SearchAgent, SearchOutcome, StopReason};
pub use config::Config;
pub use corpus::MovieCorpus;
pub use error::{CorpusError, GoldenSetError, LlmError, SearchError};
pub use types::*;
