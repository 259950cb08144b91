//! Immutable movie corpus shared by every strategy
//!
//! Loaded once per process from a JSON snapshot and never mutated afterwards.
//! Cloning a [`MovieCorpus`] is cheap: the records live behind an `Arc`.

use crate::error::CorpusError;
use crate::types::{MovieId, MovieRecord};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Accepted snapshot layouts
#[derive(Deserialize)]
#[serde(untagged)]
enum Snapshot {
    Wrapped { movies: Vec<MovieRecord> },
    Bare(Vec<MovieRecord>),
}

struct CorpusInner {
    records: Vec<MovieRecord>,
    by_id: HashMap<MovieId, usize>,
}

/// Read-only movie corpus
#[derive(Clone)]
pub struct MovieCorpus {
    inner: Arc<CorpusInner>,
}

impl MovieCorpus {
    /// Build a corpus from records, rejecting empty input and duplicate ids
    pub fn from_records(records: Vec<MovieRecord>) -> Result<Self, CorpusError> {
        if records.is_empty() {
            return Err(CorpusError::Empty);
        }

        let mut by_id = HashMap::with_capacity(records.len());
        for (position, record) in records.iter().enumerate() {
            if by_id.insert(record.id, position).is_some() {
                return Err(CorpusError::DuplicateId(record.id));
            }
        }

        Ok(Self {
            inner: Arc::new(CorpusInner { records, by_id }),
        })
    }

    /// Parse a snapshot: either `[...]` or `{ "movies": [...] }`
    pub fn from_json(json: &str) -> Result<Self, CorpusError> {
        let records = match serde_json::from_str::<Snapshot>(json)? {
            Snapshot::Wrapped { movies } => movies,
            Snapshot::Bare(movies) => movies,
        };
        Self::from_records(records)
    }

    /// Load a snapshot file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CorpusError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let corpus = Self::from_json(&content)?;
        info!("Loaded {} movies from {}", corpus.len(), path.display());
        Ok(corpus)
    }

    pub fn len(&self) -> usize {
        self.inner.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.records.is_empty()
    }

    pub fn get(&self, id: MovieId) -> Option<&MovieRecord> {
        self.inner
            .by_id
            .get(&id)
            .map(|&position| &self.inner.records[position])
    }

    pub fn records(&self) -> &[MovieRecord] {
        &self.inner.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &MovieRecord> {
        self.inner.records.iter()
    }
}

impl std::fmt::Debug for MovieCorpus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MovieCorpus")
            .field("movies", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parses_wrapped_and_bare_snapshots() {
        let wrapped = r#"{"movies": [{"id": 1, "title": "Paddington", "genres": ["Comedy"]}]}"#;
        let bare = r#"[{"id": 2, "title": "The Revenant", "cast": ["Leonardo DiCaprio"]}]"#;

        let corpus = MovieCorpus::from_json(wrapped).unwrap();
        assert_eq!(corpus.len(), 1);
        assert!(corpus.get(1).unwrap().genre.contains("Comedy"));

        let corpus = MovieCorpus::from_json(bare).unwrap();
        let revenant = corpus.get(2).unwrap();
        assert_eq!(revenant.cast, vec!["Leonardo DiCaprio"]);
        assert!(revenant.description.is_empty());
    }

    #[test]
    fn test_rejects_empty_corpus() {
        assert!(matches!(MovieCorpus::from_json("[]"), Err(CorpusError::Empty)));
        assert!(matches!(
            MovieCorpus::from_json(r#"{"movies": []}"#),
            Err(CorpusError::Empty)
        ));
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let records = vec![MovieRecord::new(7, "A"), MovieRecord::new(7, "B")];
        assert!(matches!(
            MovieCorpus::from_records(records),
            Err(CorpusError::DuplicateId(7))
        ));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = MovieCorpus::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, CorpusError::Io { .. }));
    }

    #[test]
    fn test_load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"id": 3, "title": "Heat"}}]"#).unwrap();
        let corpus = MovieCorpus::load(file.path()).unwrap();
        assert_eq!(corpus.get(3).unwrap().title, "Heat");
        assert!(corpus.get(4).is_none());
    }
}
