//! Embedding providers and the precomputed document store
//!
//! Supports OpenAI-compatible HTTP APIs for embedding generation:
//! - OpenAI, Azure OpenAI
//! - vLLM, Ollama, LM Studio
//! - text-embeddings-inference
//!
//! plus a deterministic hashing backend for offline use.
//!
//! # Example Configuration
//!
//! ## OpenAI API
//! ```toml
//! [embedding]
//! backend = "http"
//! endpoint = "https://api.openai.com/v1/embeddings"
//! model = "text-embedding-3-small"
//! dimensions = 1536
//! ```
//!
//! ## Local LM Studio / vLLM
//! ```toml
//! [embedding]
//! backend = "http"
//! endpoint = "http://localhost:1234/v1/embeddings"
//! model = "nomic-embed-text-v1.5"
//! dimensions = 768
//! ```

pub mod backend;
mod store;

pub use backend::{
    create_backend, normalize_embedding, EmbeddingBackend, EmbeddingError, EmbeddingResult,
    HashingBackend, HttpBackend, HttpConfig,
};
pub use store::{cosine_similarity, EmbeddingStore};
