//! Precomputed per-movie embeddings

use std::sync::Arc;

use tracing::{info, warn};

use super::backend::{EmbeddingBackend, EmbeddingError, EmbeddingResult};
use crate::corpus::MovieCorpus;
use crate::types::{Embedding, MovieId, MovieRecord};

/// Document vectors built once per process, read-only afterwards
#[derive(Debug)]
pub struct EmbeddingStore {
    vectors: Vec<(MovieId, Embedding)>,
    dimensions: usize,
}

impl EmbeddingStore {
    /// Text embedded for a movie: "title. description. genres"
    pub fn document_text(record: &MovieRecord) -> String {
        let genres: Vec<&str> = record.genre.iter().map(String::as_str).collect();
        format!("{}. {}. {}", record.title, record.description, genres.join(", "))
    }

    /// Embed every movie in the corpus with the given backend
    pub fn build(corpus: &MovieCorpus, backend: &dyn EmbeddingBackend) -> EmbeddingResult<Self> {
        let texts: Vec<String> = corpus.iter().map(Self::document_text).collect();
        let embeddings = backend.embed_batch(&texts)?;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::EmbeddingFailed(format!(
                "Expected {} document vectors, received {}",
                texts.len(),
                embeddings.len()
            )));
        }

        let dimensions = backend.dimensions();
        let vectors: Vec<(MovieId, Embedding)> = corpus
            .iter()
            .map(|record| record.id)
            .zip(embeddings)
            .collect();

        if let Some((id, v)) = vectors.iter().find(|(_, v)| v.len() != dimensions) {
            warn!("Movie {} embedded with {} dimensions", id, v.len());
            return Err(EmbeddingError::DimensionMismatch {
                expected: dimensions,
                actual: v.len(),
            });
        }

        info!(
            "Embedded {} movies with {} backend ({} dims)",
            vectors.len(),
            backend.name(),
            dimensions
        );

        Ok(Self {
            vectors,
            dimensions,
        })
    }

    /// Build the store, logging and returning `None` when the provider fails
    pub fn try_build(corpus: &MovieCorpus, backend: &dyn EmbeddingBackend) -> Option<Arc<Self>> {
        match Self::build(corpus, backend) {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                warn!("Semantic search degraded, document embedding failed: {}", e);
                None
            }
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn get(&self, id: MovieId) -> Option<&Embedding> {
        self.vectors.iter().find(|(mid, _)| *mid == id).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(MovieId, Embedding)> {
        self.vectors.iter()
    }
}

/// Cosine similarity in [-1, 1]; zero vectors compare as 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
    } else {
        0.0
    }
}
