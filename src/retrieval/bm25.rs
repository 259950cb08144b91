//! In-memory BM25 inverted index
//!
//! Built once from `(id, text)` pairs and never updated. Used by the keyword
//! strategy over title/description/genres and by the actor strategy over cast.

use std::collections::{BTreeSet, HashMap};

use crate::config::RetrievalConfig;
use crate::types::{rank_order, MovieId};
use crate::util::tokenize;

/// BM25 free parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term-frequency saturation
    pub k1: f32,
    /// Length normalization strength
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

impl From<&RetrievalConfig> for Bm25Params {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            k1: config.bm25_k1,
            b: config.bm25_b,
        }
    }
}

/// Posting: document and term frequency within it
#[derive(Debug, Clone, Copy)]
struct Posting {
    doc: MovieId,
    tf: u32,
}

/// Token -> posting list index with per-document lengths
#[derive(Debug, Clone)]
pub struct InvertedIndex {
    postings: HashMap<String, Vec<Posting>>,
    doc_lengths: HashMap<MovieId, u32>,
    avg_doc_len: f32,
    params: Bm25Params,
}

impl InvertedIndex {
    pub fn build<'a, I>(documents: I, params: Bm25Params) -> Self
    where
        I: IntoIterator<Item = (MovieId, &'a str)>,
    {
        let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
        let mut doc_lengths = HashMap::new();
        let mut total_len: u64 = 0;

        for (doc, text) in documents {
            let tokens = tokenize(text);
            total_len += tokens.len() as u64;
            doc_lengths.insert(doc, tokens.len() as u32);

            let mut counts: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *counts.entry(token).or_default() += 1;
            }
            for (term, tf) in counts {
                postings.entry(term).or_default().push(Posting { doc, tf });
            }
        }

        let avg_doc_len = if doc_lengths.is_empty() {
            0.0
        } else {
            total_len as f32 / doc_lengths.len() as f32
        };

        Self {
            postings,
            doc_lengths,
            avg_doc_len,
            params,
        }
    }

    pub fn doc_count(&self) -> usize {
        self.doc_lengths.len()
    }

    pub fn avg_doc_len(&self) -> f32 {
        self.avg_doc_len
    }

    /// Number of documents containing `term`
    pub fn doc_freq(&self, term: &str) -> usize {
        self.postings.get(term).map_or(0, Vec::len)
    }

    /// Smoothed IDF, always positive: ln((N - df + 0.5) / (df + 0.5) + 1)
    pub fn idf(&self, term: &str) -> f32 {
        let n = self.doc_count() as f32;
        let df = self.doc_freq(term) as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Raw BM25 score for every document matching at least one query term
    pub fn score_all(&self, query: &str) -> HashMap<MovieId, f32> {
        let terms: BTreeSet<String> = tokenize(query).into_iter().collect();
        let Bm25Params { k1, b } = self.params;
        let mut scores: HashMap<MovieId, f32> = HashMap::new();

        for term in &terms {
            let Some(list) = self.postings.get(term) else {
                continue;
            };
            let idf = self.idf(term);

            for posting in list {
                let doc_len = self.doc_lengths.get(&posting.doc).copied().unwrap_or(0) as f32;
                let length_ratio = if self.avg_doc_len > 0.0 {
                    doc_len / self.avg_doc_len
                } else {
                    1.0
                };
                let tf = posting.tf as f32;
                let term_score = idf * (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * length_ratio));
                *scores.entry(posting.doc).or_default() += term_score;
            }
        }

        scores
    }

    /// Top `limit` documents by raw BM25 score
    pub fn search(&self, query: &str, limit: usize) -> Vec<(MovieId, f32)> {
        let mut hits: Vec<(MovieId, f32)> = self
            .score_all(query)
            .into_iter()
            .filter(|(_, score)| *score > 0.0)
            .collect();
        hits.sort_by(|a, b| rank_order(a.1, a.0, b.1, b.0));
        hits.truncate(limit);
        hits
    }
}
