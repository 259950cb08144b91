//! Cast-name search: BM25 recall over cast lists, then name-match re-ranking

use std::collections::HashSet;

use super::bm25::{Bm25Params, InvertedIndex};
use super::SearchStrategy;
use crate::config::RetrievalConfig;
use crate::corpus::MovieCorpus;
use crate::types::{finalize_candidates, MovieId, MovieRecord, ResultSet, ScoredCandidate, StrategyKind};
use crate::util::normalize_text;
use tracing::debug;

const HONORIFICS: &[&str] = &["mr", "mrs", "ms", "dr", "sir", "dame", "jr", "sr", "prof", "miss"];

const FILLER_WORDS: &[&str] = &[
    "movie", "movies", "film", "films", "with", "starring", "featuring", "actor", "actors", "about",
    "by", "in",
];

const NAME_SEPARATORS: &[&str] = &["and", "or"];

/// Shortest single-token name accepted as an actor mention ("Law", "Ice")
pub const MIN_NAME_TOKEN_CHARS: usize = 3;

/// Lowercase, strip punctuation and drop honorifics ("Dr.", "Sir", "Jr.")
pub fn normalize_name(name: &str) -> String {
    normalize_text(name)
        .split_whitespace()
        .filter(|token| !HONORIFICS.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Character-level edit distance
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (m, n) = (a.len(), b.len());

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// Normalized Levenshtein similarity in [0, 1]; symmetric
pub fn name_similarity(a: &str, b: &str) -> f32 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f32 / longest as f32
}

/// Extract candidate names from a free-text actor query.
///
/// Filler words are dropped, and the remainder is split on `,`, `&`, `and`,
/// `or`. Single-token names shorter than [`MIN_NAME_TOKEN_CHARS`] are ignored.
pub fn parse_actor_names(query: &str) -> Vec<String> {
    let spaced = query.replace([',', '&'], " , ");
    let mut names = Vec::new();
    let mut current: Vec<String> = Vec::new();

    let flush = |current: &mut Vec<String>, names: &mut Vec<String>| {
        let name = normalize_name(&current.join(" "));
        current.clear();
        let token_count = name.split_whitespace().count();
        if token_count >= 2 || (token_count == 1 && name.chars().count() >= MIN_NAME_TOKEN_CHARS) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    };

    for word in spaced.split_whitespace() {
        let bare = normalize_text(word);
        if word == "," || NAME_SEPARATORS.contains(&bare.as_str()) {
            flush(&mut current, &mut names);
        } else if !FILLER_WORDS.contains(&bare.as_str()) {
            current.push(word.to_string());
        }
    }
    flush(&mut current, &mut names);

    names
}

/// Match-strength thresholds
#[derive(Debug, Clone, Copy)]
pub struct ActorScoring {
    pub full_name: f32,
    pub last_name: f32,
    pub min_confidence: f32,
}

impl From<&RetrievalConfig> for ActorScoring {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            full_name: config.actor_full_name_score,
            last_name: config.actor_last_name_score,
            min_confidence: config.actor_min_confidence,
        }
    }
}

impl ActorScoring {
    /// Strength of a normalized query name against a normalized cast name
    pub fn strength(&self, query: &str, cast: &str) -> f32 {
        if query.is_empty() || cast.is_empty() {
            return 0.0;
        }
        if query == cast {
            return self.full_name;
        }

        let query_tokens: Vec<&str> = query.split_whitespace().collect();
        let cast_last = cast.split_whitespace().last().unwrap_or(cast);

        if query_tokens.len() == 1 {
            if query == cast_last {
                return self.last_name;
            }
            // Misspelled last name: scaled so it never beats an exact last-name hit
            let partial = name_similarity(query, cast_last) * self.last_name;
            return partial.max(name_similarity(query, cast));
        }

        name_similarity(query, cast).min(self.full_name)
    }
}

/// Actor strategy
#[derive(Debug)]
pub struct ActorSearch {
    corpus: MovieCorpus,
    cast_index: InvertedIndex,
    scoring: ActorScoring,
    recall_multiplier: usize,
}

impl ActorSearch {
    pub fn new(corpus: MovieCorpus, params: Bm25Params, config: &RetrievalConfig) -> Self {
        let cast_texts: Vec<(MovieId, String)> = corpus
            .iter()
            .map(|record| (record.id, record.cast.join(" ")))
            .collect();
        let cast_index =
            InvertedIndex::build(cast_texts.iter().map(|(id, t)| (*id, t.as_str())), params);

        Self {
            corpus,
            cast_index,
            scoring: ActorScoring::from(config),
            recall_multiplier: config.actor_recall_multiplier.max(1),
        }
    }

    /// Every normalized cast-name token in the corpus, used to spot actor mentions
    pub fn cast_lexicon(&self) -> HashSet<String> {
        self.corpus
            .iter()
            .flat_map(|record| record.cast.iter())
            .flat_map(|name| {
                normalize_name(name)
                    .split_whitespace()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn best_strength(&self, names: &[String], record: &MovieRecord) -> f32 {
        record
            .cast
            .iter()
            .map(|member| normalize_name(member))
            .flat_map(|member| {
                names
                    .iter()
                    .map(|name| self.scoring.strength(name, &member))
                    .collect::<Vec<_>>()
            })
            .fold(0.0, f32::max)
    }
}

impl SearchStrategy for ActorSearch {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Actor
    }

    fn search(&self, query: &str, limit: usize) -> ResultSet {
        let names = parse_actor_names(query);
        if names.is_empty() {
            return ResultSet::empty(StrategyKind::Actor, query);
        }

        let recall_query = names.join(" ");
        let recalled: Vec<MovieId> = self
            .cast_index
            .search(&recall_query, limit.saturating_mul(self.recall_multiplier))
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        let pool: Vec<&MovieRecord> = if recalled.is_empty() {
            debug!("No cast recall for {:?}, scanning all cast lists", names);
            self.corpus.iter().collect()
        } else {
            recalled.iter().filter_map(|id| self.corpus.get(*id)).collect()
        };

        let mut candidates: Vec<ScoredCandidate> = pool
            .into_iter()
            .filter_map(|record| {
                let strength = self.best_strength(&names, record);
                (strength >= self.scoring.min_confidence)
                    .then(|| ScoredCandidate::new(record.id, strength, StrategyKind::Actor))
            })
            .collect();
        finalize_candidates(&mut candidates, limit);

        ResultSet::new(StrategyKind::Actor, query, candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search() -> ActorSearch {
        let corpus = MovieCorpus::from_records(vec![
            MovieRecord::new(1, "Paddington").with_cast(["Ben Whishaw", "Hugh Bonneville"]),
            MovieRecord::new(2, "The Revenant").with_cast(["Leonardo DiCaprio", "Tom Hardy"]),
            MovieRecord::new(3, "Inception").with_cast(["Leonardo DiCaprio", "Elliot Page"]),
            MovieRecord::new(4, "Cast Away").with_cast(["Tom Hanks"]),
            MovieRecord::new(5, "Sherlock Holmes").with_cast(["Robert Downey Jr.", "Jude Law"]),
        ])
        .unwrap();
        let config = RetrievalConfig::default();
        ActorSearch::new(corpus, Bm25Params::from(&config), &config)
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Dr. Leonardo DiCaprio, Jr."), "leonardo dicaprio");
        assert_eq!(normalize_name("Sir  Ian McKellen"), "ian mckellen");
        let once = normalize_name("Mrs. O'Brien");
        assert_eq!(normalize_name(&once), once);
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn test_name_similarity_is_symmetric() {
        assert_eq!(name_similarity("dicaprio", "dicapro"), name_similarity("dicapro", "dicaprio"));
        assert_eq!(name_similarity("", ""), 1.0);
        assert_eq!(name_similarity("abc", ""), 0.0);
    }

    #[test]
    fn test_parse_actor_names() {
        assert_eq!(parse_actor_names("movies with Tom Hanks"), vec!["tom hanks"]);
        assert_eq!(
            parse_actor_names("Tom Hanks and Meg Ryan, Leonardo DiCaprio"),
            vec!["tom hanks", "meg ryan", "leonardo dicaprio"]
        );
        assert_eq!(parse_actor_names("films starring Dr. Pitt & Tom Hardy"), vec!["pitt", "tom hardy"]);
        assert!(parse_actor_names("movies with al").is_empty());
        assert!(parse_actor_names("").is_empty());
    }

    #[test]
    fn test_full_name_exact_match() {
        let result = search().search("leonardo dicaprio", 10);
        assert_eq!(result.movie_ids(), vec![2, 3]);
        assert_eq!(result.score_of(2), Some(1.0));
        assert!(result.score_of(1).is_none());
    }

    #[test]
    fn test_last_name_only_match() {
        let result = search().search("DiCaprio", 10);
        assert_eq!(result.score_of(2), Some(0.8));
        assert_eq!(result.score_of(3), Some(0.8));
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_misspelled_name_reaches_fuzzy_stage() {
        let result = search().search("Leonardo DiCapro", 10);
        let score = result.score_of(2).unwrap();
        assert!(score >= 0.5 && score < 1.0);
        assert!(result.score_of(4).is_none());
    }

    #[test]
    fn test_limit_and_empty_queries() {
        assert_eq!(search().search("leonardo dicaprio", 1).movie_ids(), vec![2]);
        assert!(search().search("movies with", 10).is_empty());
        assert!(search().search("zzzz qqqq", 10).is_empty());
    }

    #[test]
    fn test_three_letter_surname() {
        assert_eq!(parse_actor_names("movies with Law"), vec!["law"]);
        let result = search().search("Law", 10);
        assert_eq!(result.score_of(5), Some(0.8));
        assert!(result.score_of(1).is_none());
    }

    #[test]
    fn test_cast_lexicon() {
        let lexicon = search().cast_lexicon();
        assert!(lexicon.contains("dicaprio"));
        assert!(lexicon.contains("whishaw"));
    }
}
