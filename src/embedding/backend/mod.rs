//! Pluggable embedding backend system
//!
//! - **HTTP backend**: OpenAI-compatible APIs (OpenAI, Azure, LM Studio, vLLM, etc.)
//! - **Hashing backend**: deterministic offline feature hashing, no network
//!
//! # Example Configuration
//!
//! ```toml
//! # OpenAI
//! [embedding]
//! backend = "http"
//! endpoint = "https://api.openai.com/v1/embeddings"
//! model = "text-embedding-3-small"
//! dimensions = 1536
//! # api_key from OPENAI_API_KEY env var
//!
//! # Offline
//! [embedding]
//! backend = "hashing"
//! dimensions = 256
//! ```

mod factory;
mod hashing;
mod http;
mod traits;

pub use factory::create_backend;
pub use hashing::HashingBackend;
pub use http::{HttpBackend, HttpConfig};
pub use traits::{EmbeddingBackend, EmbeddingError, EmbeddingResult};

use crate::types::Embedding;

/// L2-normalize an embedding; the zero vector is returned unchanged
pub fn normalize_embedding(embedding: &[f32]) -> Embedding {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        embedding.iter().map(|x| x / norm).collect()
    } else {
        embedding.to_vec()
    }
}
