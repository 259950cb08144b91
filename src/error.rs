//! Error types surfaced by the library
//!
//! Only corpus and request errors are fatal. Provider and service failures are
//! recovered inside the component that hit them.

use std::path::PathBuf;

use crate::types::MovieId;

/// Errors raised while loading or validating the movie corpus
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("Failed to read corpus '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse corpus snapshot: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Corpus is empty")]
    Empty,

    #[error("Duplicate movie id {0} in corpus")]
    DuplicateId(MovieId),
}

/// Errors raised while loading a golden evaluation set
#[derive(Debug, thiserror::Error)]
pub enum GoldenSetError {
    #[error("Failed to read golden set '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse golden set: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Golden set has no test cases")]
    Empty,

    #[error("Test case '{0}' lists no relevant movies")]
    NoRelevantDocs(String),
}

/// Errors raised before a search run starts
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Invalid search request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Corpus(#[from] CorpusError),
}

/// Errors from the chat-completion boundary (decision, rerank, answer services)
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}
