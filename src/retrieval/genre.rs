//! Taxonomy-aware genre filter

use std::collections::BTreeSet;

use super::SearchStrategy;
use crate::config::RetrievalConfig;
use crate::corpus::MovieCorpus;
use crate::types::{finalize_candidates, ResultSet, ScoredCandidate, StrategyKind};
use crate::util::{contains_phrase, normalize_text};

/// Canonical genre followed by the phrases that imply it
const GENRE_SYNONYMS: &[(&str, &[&str])] = &[
    ("horror", &["horror", "scary", "terrifying", "frightening"]),
    ("adventure", &["adventure", "expedition", "journey"]),
    ("drama", &["drama", "dramatic", "melodrama"]),
    ("comedy", &["comedy", "funny", "hilarious", "humor"]),
    ("thriller", &["thriller", "suspense", "tense", "edge of your seat"]),
    ("action", &["action", "fighting", "combat", "martial arts"]),
    ("romance", &["romance", "romantic", "love story", "love"]),
    ("fantasy", &["fantasy", "magical", "wizard", "sorcery"]),
    (
        "sci-fi",
        &["sci-fi", "science fiction", "sci fi", "futuristic", "space", "space opera"],
    ),
    ("animation", &["animation", "animated", "cartoon"]),
    ("family", &["family", "kids", "family-friendly"]),
    ("mystery", &["mystery", "whodunit", "detective story"]),
];

/// Many-to-one mapping from synonym phrase to canonical genre.
///
/// Entries are kept longest-phrase-first so "space opera" wins over "space".
#[derive(Debug, Clone)]
pub struct GenreSynonymTable {
    /// (normalized phrase, canonical genre)
    entries: Vec<(String, &'static str)>,
}

impl Default for GenreSynonymTable {
    fn default() -> Self {
        Self::from_pairs(GENRE_SYNONYMS)
    }
}

impl GenreSynonymTable {
    pub fn from_pairs(pairs: &[(&'static str, &[&str])]) -> Self {
        let mut entries: Vec<(String, &'static str)> = Vec::new();
        for (canonical, synonyms) in pairs {
            for phrase in std::iter::once(canonical).chain(synonyms.iter()) {
                let normalized = normalize_text(phrase);
                if !normalized.is_empty() && !entries.iter().any(|(p, _)| *p == normalized) {
                    entries.push((normalized, *canonical));
                }
            }
        }
        entries.sort_by(|a, b| {
            b.0.chars()
                .count()
                .cmp(&a.0.chars().count())
                .then_with(|| a.0.cmp(&b.0))
        });
        Self { entries }
    }

    /// Canonical genre names
    pub fn canonical_genres(&self) -> BTreeSet<&'static str> {
        self.entries.iter().map(|(_, c)| *c).collect()
    }

    /// Resolve free text to one canonical genre, longest matching phrase first
    pub fn resolve(&self, text: &str) -> Option<&'static str> {
        let normalized = normalize_text(text);
        self.entries
            .iter()
            .find(|(phrase, _)| contains_phrase(&normalized, phrase))
            .map(|(_, canonical)| *canonical)
    }

    /// Every canonical genre mentioned anywhere in `text`
    pub fn resolve_all(&self, text: &str) -> BTreeSet<&'static str> {
        let normalized = normalize_text(text);
        self.entries
            .iter()
            .filter(|(phrase, _)| contains_phrase(&normalized, phrase))
            .map(|(_, canonical)| *canonical)
            .collect()
    }

    /// Normalized phrases that imply `canonical`
    pub fn phrases_for<'a>(&'a self, canonical: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(_, c)| *c == canonical)
            .map(|(p, _)| p.as_str())
    }
}

/// Metadata matches score `metadata_score`, description-only matches `text_score`
#[derive(Debug, Clone)]
pub struct GenreSearch {
    corpus: MovieCorpus,
    table: GenreSynonymTable,
    metadata_score: f32,
    text_score: f32,
}

impl GenreSearch {
    pub fn new(corpus: MovieCorpus, table: GenreSynonymTable, config: &RetrievalConfig) -> Self {
        Self {
            corpus,
            table,
            metadata_score: config.genre_metadata_score,
            text_score: config.genre_text_score,
        }
    }

    pub fn table(&self) -> &GenreSynonymTable {
        &self.table
    }
}

impl SearchStrategy for GenreSearch {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Genre
    }

    fn search(&self, query: &str, limit: usize) -> ResultSet {
        let Some(canonical) = self.table.resolve(query) else {
            return ResultSet::empty(StrategyKind::Genre, query);
        };
        let phrases: Vec<&str> = self.table.phrases_for(canonical).collect();

        let mut candidates: Vec<ScoredCandidate> = self
            .corpus
            .iter()
            .filter_map(|record| {
                let metadata_match = record
                    .genre
                    .iter()
                    .any(|label| self.table.resolve_all(label).contains(canonical));
                let score = if metadata_match {
                    self.metadata_score
                } else {
                    let description = normalize_text(&record.description);
                    if phrases.iter().any(|p| contains_phrase(&description, p)) {
                        self.text_score
                    } else {
                        return None;
                    }
                };
                Some(ScoredCandidate::new(record.id, score, StrategyKind::Genre))
            })
            .collect();
        finalize_candidates(&mut candidates, limit);

        ResultSet::new(StrategyKind::Genre, query, candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MovieRecord;

    #[test]
    fn test_synonyms_resolve_to_canonical() {
        let table = GenreSynonymTable::default();
        assert_eq!(table.resolve("suspense"), Some("thriller"));
        assert_eq!(table.resolve("Science Fiction films"), Some("sci-fi"));
        assert_eq!(table.resolve("a hilarious romp"), Some("comedy"));
        assert_eq!(table.resolve("documentary"), None);
        assert_eq!(table.resolve(""), None);
    }

    #[test]
    fn test_longest_phrase_wins() {
        let table = GenreSynonymTable::default();
        assert_eq!(table.resolve("an edge of your seat love affair"), Some("thriller"));
        assert_eq!(table.resolve("space opera"), Some("sci-fi"));
    }

    #[test]
    fn test_canonical_names_resolve_to_themselves() {
        let table = GenreSynonymTable::default();
        for canonical in table.canonical_genres() {
            assert_eq!(table.resolve(canonical), Some(canonical), "{}", canonical);
        }
    }

    fn search() -> GenreSearch {
        let corpus = MovieCorpus::from_records(vec![
            MovieRecord::new(1, "Paddington")
                .with_description("A bear finds a family in London")
                .with_genres(["Comedy", "Family"]),
            MovieRecord::new(2, "The Revenant")
                .with_description("A frontiersman on a brutal journey")
                .with_genres(["Adventure", "Thriller"]),
            MovieRecord::new(3, "Arrival")
                .with_description("Linguist meets visitors from space")
                .with_genres(["Science Fiction"]),
        ])
        .unwrap();
        GenreSearch::new(corpus, GenreSynonymTable::default(), &RetrievalConfig::default())
    }

    #[test]
    fn test_metadata_match_scores_full() {
        let result = search().search("suspense", 10);
        assert_eq!(result.movie_ids(), vec![2]);
        assert_eq!(result.score_of(2), Some(1.0));
    }

    #[test]
    fn test_metadata_labels_are_canonicalized() {
        let result = search().search("sci-fi", 10);
        assert_eq!(result.score_of(3), Some(1.0));
    }

    #[test]
    fn test_synonym_queries_and_description_fallback() {
        let result = search().search("kids", 10);
        assert_eq!(result.movie_ids(), vec![1]);

        let result = search().search("adventure", 10);
        assert_eq!(result.score_of(2), Some(1.0));

        let corpus = MovieCorpus::from_records(vec![
            MovieRecord::new(5, "Untitled").with_description("A terrifying night in the woods"),
        ])
        .unwrap();
        let search = GenreSearch::new(corpus, GenreSynonymTable::default(), &RetrievalConfig::default());
        let result = search.search("horror", 10);
        assert_eq!(result.score_of(5), Some(0.5));
    }

    #[test]
    fn test_unknown_genre_is_empty() {
        assert!(search().search("documentary", 10).is_empty());
    }
}
