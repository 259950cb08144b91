//! Deterministic feature-hashing embedder
//!
//! Each token is hashed with xxh3 into one of `dimensions` buckets, with the
//! top hash bit choosing the sign. Adjacent token pairs are hashed as well so
//! word order contributes a little signal. The result is L2-normalized.

use super::normalize_embedding;
use super::traits::{EmbeddingBackend, EmbeddingError, EmbeddingResult};
use crate::types::Embedding;
use crate::util::tokenize;
use xxhash_rust::xxh3::xxh3_64;

const BIGRAM_WEIGHT: f32 = 0.5;

/// Offline embedding backend used for tests and air-gapped runs
#[derive(Debug, Clone)]
pub struct HashingBackend {
    dimensions: usize,
}

impl HashingBackend {
    pub fn new(dimensions: usize) -> EmbeddingResult<Self> {
        if dimensions == 0 {
            return Err(EmbeddingError::Config(
                "hashing backend needs at least one dimension".to_string(),
            ));
        }
        Ok(Self { dimensions })
    }

    fn accumulate(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = xxh3_64(feature.as_bytes());
        let bucket = (hash % self.dimensions as u64) as usize;
        let sign = if hash >> 63 == 1 { -1.0 } else { 1.0 };
        vector[bucket] += sign * weight;
    }
}

impl EmbeddingBackend for HashingBackend {
    fn embed(&self, text: &str) -> EmbeddingResult<Embedding> {
        let tokens = tokenize(text);
        let mut vector = vec![0.0f32; self.dimensions];

        for token in &tokens {
            self.accumulate(&mut vector, token, 1.0);
        }
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            self.accumulate(&mut vector, &bigram, BIGRAM_WEIGHT);
        }

        Ok(normalize_embedding(&vector))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hashing"
    }
}
