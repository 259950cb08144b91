//! Property tests for retrieval, fusion and loop invariants

use marquee::{
    agent::{Decision, DecisionContext, DecisionPolicy, SearchAgent, StopReason},
    config::{MergeConfig, RetrievalConfig},
    corpus::MovieCorpus,
    embedding::HashingBackend,
    merge::{CandidatePool, MergeEngine},
    retrieval::{
        name_similarity, normalize_name, reciprocal_rank_fusion, to_ranked_results, Bm25Params,
        GenreSynonymTable, InvertedIndex, RrfConfig, ScoreReranker, StrategyRegistry,
    },
    types::{MovieId, MovieRecord, ResultSet, ScoredCandidate, SearchRequest, StrategyFamily, StrategyKind},
};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn corpus() -> MovieCorpus {
    MovieCorpus::from_records(vec![
        MovieRecord::new(1, "Paddington")
            .with_description("A young bear from Peru finds a family in London")
            .with_cast(["Ben Whishaw"])
            .with_genres(["Comedy", "Family"]),
        MovieRecord::new(2, "The Revenant")
            .with_description("A frontiersman survives a bear attack in the wilderness")
            .with_cast(["Leonardo DiCaprio", "Tom Hardy"])
            .with_genres(["Adventure", "Thriller"]),
        MovieRecord::new(3, "Cast Away")
            .with_description("A courier is stranded on an island")
            .with_cast(["Tom Hanks"])
            .with_genres(["Adventure", "Drama"]),
        MovieRecord::new(4, "Alien")
            .with_description("A terrifying creature stalks the crew of a space freighter")
            .with_cast(["Sigourney Weaver"])
            .with_genres(["Horror", "Science Fiction"]),
    ])
    .unwrap()
}

fn registry() -> StrategyRegistry {
    StrategyRegistry::build(
        &corpus(),
        Arc::new(HashingBackend::new(64).unwrap()),
        &RetrievalConfig::default(),
    )
}

fn result_set(kind: StrategyKind, ids: &[MovieId], score: f32) -> ResultSet {
    ResultSet::new(
        kind,
        "q",
        ids.iter()
            .map(|id| ScoredCandidate::new(*id, score, kind))
            .collect(),
    )
}

/// Keeps asking for a new keyword query
#[derive(Debug, Default)]
struct Endless(Mutex<usize>);

impl DecisionPolicy for Endless {
    fn decide(&self, _ctx: &DecisionContext<'_>) -> Decision {
        let mut n = self.0.lock().unwrap();
        *n += 1;
        Decision::run(StrategyKind::Keyword, format!("bear {}", n), "more")
    }

    fn name(&self) -> &str {
        "endless"
    }
}

proptest! {
    #[test]
    fn strategies_respect_limit_and_order(query in "[a-zA-Z .\"|()*]{0,30}", limit in 0usize..6) {
        let registry = registry();
        for kind in StrategyKind::ALL {
            let result = registry.search(kind, &query, limit);
            prop_assert!(result.len() <= limit);
            let ids: HashSet<MovieId> = result.movie_ids().into_iter().collect();
            prop_assert_eq!(ids.len(), result.len());
            for pair in result.candidates.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
                if pair[0].score == pair[1].score {
                    prop_assert!(pair[0].movie_id < pair[1].movie_id);
                }
            }
            for candidate in &result.candidates {
                prop_assert!(
                    (0.0..=1.0).contains(&candidate.score),
                    "{} scored {} for {:?}", kind, candidate.score, query
                );
            }
        }
    }

    #[test]
    fn bm25_more_occurrences_never_score_lower(m in 0usize..5, extra in 1usize..5) {
        let n = m + extra;
        let length = n + 3;
        let doc = |count: usize| {
            let mut tokens = vec!["bear"; count];
            tokens.extend(std::iter::repeat("filler").take(length - count));
            tokens.join(" ")
        };
        let more = doc(n);
        let fewer = doc(m);
        let other = "unrelated words only here".to_string();
        let index = InvertedIndex::build(
            [(1, more.as_str()), (2, fewer.as_str()), (3, other.as_str())],
            Bm25Params::default(),
        );
        let scores = index.score_all("bear");
        let more_score = scores.get(&1).copied().unwrap_or(0.0);
        let fewer_score = scores.get(&2).copied().unwrap_or(0.0);
        prop_assert!(more_score >= fewer_score);
    }

    #[test]
    fn rrf_agreed_leader_ranks_first(
        a in proptest::collection::hash_set(0u64..30, 0..10),
        b in proptest::collection::hash_set(0u64..30, 0..10),
    ) {
        let leader: MovieId = 100;
        let mut first: Vec<(MovieId, f32)> = vec![(leader, 1.0)];
        first.extend(a.into_iter().map(|id| (id, 0.5)));
        let mut second: Vec<(MovieId, f32)> = vec![(leader, 1.0)];
        second.extend(b.into_iter().map(|id| (id, 0.5)));

        let fused = reciprocal_rank_fusion(
            &[
                to_ranked_results(&first, StrategyKind::Keyword),
                to_ranked_results(&second, StrategyKind::Semantic),
            ],
            &RrfConfig::default(),
        );
        prop_assert_eq!(fused[0].movie_id, leader);
    }

    #[test]
    fn disjoint_intersection_falls_back(
        actor in proptest::collection::btree_set(0u64..50, 0..6),
        genre in proptest::collection::btree_set(50u64..100, 0..6),
    ) {
        let actor: Vec<MovieId> = actor.into_iter().collect();
        let genre: Vec<MovieId> = genre.into_iter().collect();
        let actor_set = result_set(StrategyKind::Actor, &actor, 0.8);
        let genre_set = result_set(StrategyKind::Genre, &genre, 1.0);

        let engine = MergeEngine::new(MergeConfig::default());
        let mut pool = CandidatePool::new();
        engine.merge(&mut pool, &actor_set);
        engine.merge(&mut pool, &genre_set);

        prop_assert_eq!(pool.len(), actor.len() + genre.len());
        if !actor.is_empty() && !genre.is_empty() {
            // Filter hits always rank above broad-only hits in the fallback
            let ranked = pool.ranked();
            prop_assert!(ranked.iter().all(|e| e.found_by.iter().any(|k| k.family() == StrategyFamily::Filter)));
        }
    }

    #[test]
    fn broad_steps_never_evict_filtered_movies(
        actor in proptest::collection::btree_set(0u64..20, 1..8),
        genre in proptest::collection::btree_set(0u64..20, 1..8),
        broad in proptest::collection::vec(proptest::collection::btree_set(0u64..20, 0..8), 1..4),
    ) {
        let actor: Vec<MovieId> = actor.into_iter().collect();
        let genre: Vec<MovieId> = genre.into_iter().collect();
        let engine = MergeEngine::new(MergeConfig::default());
        let mut pool = CandidatePool::new();
        engine.merge(&mut pool, &result_set(StrategyKind::Actor, &actor, 0.8));
        engine.merge(&mut pool, &result_set(StrategyKind::Genre, &genre, 1.0));
        let filtered: Vec<MovieId> = pool.ranked().iter().map(|e| e.movie_id).collect();

        for (i, ids) in broad.into_iter().enumerate() {
            let ids: Vec<MovieId> = ids.into_iter().collect();
            let kind = [StrategyKind::Keyword, StrategyKind::Hybrid, StrategyKind::Semantic][i % 3];
            engine.merge(&mut pool, &result_set(kind, &ids, 0.9));
        }

        let mut after: Vec<MovieId> = pool.ranked().iter().map(|e| e.movie_id).collect();
        after.sort_unstable();
        let mut before = filtered;
        before.sort_unstable();
        prop_assert_eq!(after, before);
    }

    #[test]
    fn fallback_ranks_filter_hits_first(
        keyword in proptest::collection::btree_map(0u64..20, 0.0f32..=1.0, 1..8),
        genre in proptest::collection::btree_map(20u64..40, 0.5f32..=1.0, 1..8),
    ) {
        let keyword_set = ResultSet::new(
            StrategyKind::Keyword,
            "q",
            keyword.iter().map(|(id, s)| ScoredCandidate::new(*id, *s, StrategyKind::Keyword)).collect(),
        );
        let genre_set = ResultSet::new(
            StrategyKind::Genre,
            "q",
            genre.iter().map(|(id, s)| ScoredCandidate::new(*id, *s, StrategyKind::Genre)).collect(),
        );
        let engine = MergeEngine::new(MergeConfig::default());
        let mut pool = CandidatePool::new();
        engine.merge(&mut pool, &keyword_set);
        engine.merge(&mut pool, &genre_set);

        let ranked: Vec<MovieId> = pool.ranked().iter().map(|e| e.movie_id).collect();
        let (head, tail) = ranked.split_at(genre.len());
        prop_assert!(head.iter().all(|id| genre.contains_key(id)));
        prop_assert!(tail.iter().all(|id| keyword.contains_key(id)));
    }

    #[test]
    fn genre_resolution_is_idempotent(text in "[a-z -]{0,30}") {
        let table = GenreSynonymTable::default();
        if let Some(canonical) = table.resolve(&text) {
            prop_assert_eq!(table.resolve(canonical), Some(canonical));
        }
    }

    #[test]
    fn name_normalization_is_idempotent(name in "[A-Za-z .,'-]{0,40}") {
        let once = normalize_name(&name);
        prop_assert_eq!(normalize_name(&once), once.clone());
    }

    #[test]
    fn name_similarity_is_symmetric(a in "[a-z ]{0,15}", b in "[a-z ]{0,15}") {
        let ab = name_similarity(&a, &b);
        prop_assert_eq!(ab, name_similarity(&b, &a));
        prop_assert!((0.0..=1.0).contains(&ab));
    }

    #[test]
    fn loop_terminates_within_iteration_limit(max_iterations in 1usize..8) {
        let corpus = corpus();
        let registry = Arc::new(registry());
        let agent = SearchAgent::new(
            corpus,
            registry,
            Arc::new(Endless::default()),
            Arc::new(ScoreReranker),
            MergeEngine::new(MergeConfig::default()),
            Duration::from_secs(60),
        );
        let outcome = agent
            .search(&SearchRequest::new("bear").with_max_iterations(max_iterations))
            .unwrap();

        prop_assert_eq!(outcome.iterations, max_iterations);
        prop_assert_eq!(outcome.stop_reason, StopReason::IterationLimit);
        let pairs: HashSet<(StrategyKind, String)> = outcome
            .history
            .iter()
            .map(|e| (e.strategy, e.query.clone()))
            .collect();
        prop_assert_eq!(pairs.len(), outcome.history.len());
    }
}
