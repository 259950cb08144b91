//! The iterate-decide-execute-merge loop

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use super::history::{HistoryEntry, RunHistory};
use super::llm_policy::LlmPolicy;
use super::policy::{DecisionContext, DecisionPolicy, HeuristicPolicy};
use crate::config::{Config, PolicyKind, RerankerKind};
use crate::corpus::MovieCorpus;
use crate::error::SearchError;
use crate::llm::CompletionService;
use crate::merge::{CandidatePool, MergeEngine};
use crate::retrieval::{LlmReranker, RerankCandidate, Reranker, ScoreReranker, StrategyRegistry};
use crate::types::{SearchHit, SearchRequest, StrategyKind, ToolInfo};

/// Loop states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Deciding,
    Executing,
    Merging,
    Stopped(StopReason),
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    PolicyStop,
    IterationLimit,
    RepeatedPair,
    UnknownStrategy,
    DeadlineExceeded,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PolicyStop => "policy_stop",
            Self::IterationLimit => "iteration_limit",
            Self::RepeatedPair => "repeated_pair",
            Self::UnknownStrategy => "unknown_strategy",
            Self::DeadlineExceeded => "deadline_exceeded",
        };
        f.write_str(s)
    }
}

/// Result of one search run
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub run_id: Uuid,
    pub query: String,
    pub iterations: usize,
    pub stop_reason: StopReason,
    pub history: Vec<HistoryEntry>,
    pub results: Vec<SearchHit>,
    /// Ranked pool size before truncation to the result limit
    pub total_candidates: usize,
    /// Some strategy could not reach its provider during the run
    pub degraded: bool,
}

struct Transitions {
    state: RunState,
}

impl Transitions {
    fn to(&mut self, next: RunState) {
        debug!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// Drives one isolated run per request over shared, read-only strategies
#[derive(Debug)]
pub struct SearchAgent {
    corpus: MovieCorpus,
    registry: Arc<StrategyRegistry>,
    policy: Arc<dyn DecisionPolicy>,
    reranker: Arc<dyn Reranker>,
    merger: MergeEngine,
    run_timeout: Duration,
}

impl SearchAgent {
    pub fn new(
        corpus: MovieCorpus,
        registry: Arc<StrategyRegistry>,
        policy: Arc<dyn DecisionPolicy>,
        reranker: Arc<dyn Reranker>,
        merger: MergeEngine,
        run_timeout: Duration,
    ) -> Self {
        Self {
            corpus,
            registry,
            policy,
            reranker,
            merger,
            run_timeout,
        }
    }

    /// Wire policy and reranker from configuration.
    ///
    /// Remote variants need `llm`; without it they fall back to the heuristic
    /// policy and the score reranker.
    pub fn from_config(
        config: &Config,
        corpus: MovieCorpus,
        registry: Arc<StrategyRegistry>,
        llm: Option<Arc<dyn CompletionService>>,
    ) -> Self {
        let policy: Arc<dyn DecisionPolicy> = match (config.agent.policy, &llm) {
            (PolicyKind::Llm, Some(service)) => {
                Arc::new(LlmPolicy::new(Arc::clone(service), corpus.clone()))
            }
            (PolicyKind::Llm, None) => {
                warn!("LLM policy requested without a completion service, using heuristic");
                Arc::new(HeuristicPolicy::from_registry(&registry))
            }
            (PolicyKind::Heuristic, _) => Arc::new(HeuristicPolicy::from_registry(&registry)),
        };

        let reranker: Arc<dyn Reranker> = match (config.agent.reranker, &llm) {
            (RerankerKind::Llm, Some(service)) => Arc::new(LlmReranker::new(
                Arc::clone(service),
                config.agent.rerank_max_candidates,
            )),
            (RerankerKind::Llm, None) => {
                warn!("LLM reranker requested without a completion service, using score order");
                Arc::new(ScoreReranker)
            }
            (RerankerKind::Score, _) => Arc::new(ScoreReranker),
        };

        Self::new(
            corpus,
            registry,
            policy,
            reranker,
            MergeEngine::new(config.merge.clone()),
            Duration::from_secs(config.agent.run_timeout_secs),
        )
    }

    pub fn catalog(&self) -> Vec<ToolInfo> {
        self.registry.catalog()
    }

    /// Run the loop to completion.
    ///
    /// Only an invalid request is an error; every provider failure inside the
    /// run degrades the outcome instead.
    pub fn search(&self, request: &SearchRequest) -> Result<SearchOutcome, SearchError> {
        request.validate()?;

        let run_id = Uuid::new_v4();
        let span = info_span!("search", %run_id, query = %request.query);
        let _guard = span.enter();

        let started = Instant::now();
        let deadline = started + self.run_timeout;
        let catalog = self.registry.catalog();

        let mut history = RunHistory::new();
        let mut pool = CandidatePool::new();
        let mut degraded = false;
        let mut run = Transitions {
            state: RunState::Running,
        };

        let stop_reason = loop {
            if history.len() >= request.max_iterations {
                break StopReason::IterationLimit;
            }
            if Instant::now() >= deadline {
                break StopReason::DeadlineExceeded;
            }

            run.to(RunState::Deciding);
            let decision = self.policy.decide(&DecisionContext {
                query: &request.query,
                history: &history,
                pool: &pool,
                catalog: &catalog,
                result_limit: request.result_limit,
            });
            debug!("Decision: {:?}", decision);

            if !decision.continue_search {
                break StopReason::PolicyStop;
            }
            let (Some(tool), Some(query)) = (decision.tool.as_deref(), decision.query.as_deref())
            else {
                break StopReason::PolicyStop;
            };
            let Some(kind) = StrategyKind::from_name(tool) else {
                warn!("Policy chose unknown strategy {:?}", tool);
                break StopReason::UnknownStrategy;
            };
            if history.has_tried(kind, query) {
                warn!("Policy repeated {}({:?})", kind, query);
                break StopReason::RepeatedPair;
            }
            if Instant::now() >= deadline {
                break StopReason::DeadlineExceeded;
            }

            run.to(RunState::Executing);
            let result = self
                .registry
                .search(kind, query, request.max_results_per_tool);
            if result.degraded {
                warn!("{} ran degraded", kind);
                degraded = true;
            }

            run.to(RunState::Merging);
            let outcome = self.merger.merge(&mut pool, &result);
            info!(
                iteration = history.len() + 1,
                strategy = kind.name(),
                hits = result.len(),
                fusion = ?outcome.fusion,
                pool = outcome.pool_size,
                "{}({:?}): {}",
                kind,
                query,
                decision.rationale
            );

            history.record(HistoryEntry {
                iteration: history.len() + 1,
                strategy: kind,
                query: query.to_string(),
                movie_ids: result.movie_ids(),
                degraded: result.degraded,
                fusion: outcome.fusion,
                rationale: decision.rationale.clone(),
            });
        };
        run.to(RunState::Stopped(stop_reason));

        let total_candidates = pool.len();
        let results = self.finalize(&request.query, &pool, request.result_limit);

        info!(
            iterations = history.len(),
            stop = %stop_reason,
            candidates = total_candidates,
            "Search finished in {:?}",
            started.elapsed()
        );

        Ok(SearchOutcome {
            run_id,
            query: request.query.clone(),
            iterations: history.len(),
            stop_reason,
            history: history.into_entries(),
            results,
            total_candidates,
            degraded,
        })
    }

    fn finalize(&self, query: &str, pool: &CandidatePool, limit: usize) -> Vec<SearchHit> {
        let candidates: Vec<RerankCandidate> = pool
            .ranked()
            .into_iter()
            .map(|entry| {
                let record = self.corpus.get(entry.movie_id);
                RerankCandidate {
                    movie_id: entry.movie_id,
                    title: record.map(|r| r.title.clone()).unwrap_or_default(),
                    description: record.map(|r| r.description.clone()).unwrap_or_default(),
                    score: entry.score,
                }
            })
            .collect();

        self.reranker
            .rerank(query, candidates)
            .into_iter()
            .take(limit)
            .map(|c| SearchHit {
                movie_id: c.movie_id,
                contributing_strategies: pool
                    .get(c.movie_id)
                    .map(|e| e.found_by.iter().copied().collect())
                    .unwrap_or_default(),
                title: c.title,
                score: c.score,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::policy::Decision;
    use crate::config::{MergeConfig, RetrievalConfig};
    use crate::merge::AppliedFusion;
    use crate::embedding::HashingBackend;
    use crate::types::MovieRecord;
    use std::sync::Mutex;

    fn corpus() -> MovieCorpus {
        MovieCorpus::from_records(vec![
            MovieRecord::new(1, "Paddington")
                .with_description("A young bear from Peru finds a family in London")
                .with_cast(["Ben Whishaw"])
                .with_genres(["Comedy", "Family"]),
            MovieRecord::new(2, "The Revenant")
                .with_description("A frontiersman fights for survival after a bear attack")
                .with_cast(["Leonardo DiCaprio"])
                .with_genres(["Adventure", "Thriller"]),
        ])
        .unwrap()
    }

    /// Replays a fixed list of decisions, then stops
    #[derive(Debug)]
    struct Scripted(Mutex<Vec<Decision>>);

    impl Scripted {
        fn new(mut decisions: Vec<Decision>) -> Arc<Self> {
            decisions.reverse();
            Arc::new(Self(Mutex::new(decisions)))
        }
    }

    impl DecisionPolicy for Scripted {
        fn decide(&self, _ctx: &DecisionContext<'_>) -> Decision {
            self.0
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Decision::stop("script done"))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    /// Always asks for a fresh keyword query
    #[derive(Debug, Default)]
    struct Endless(Mutex<usize>);

    impl DecisionPolicy for Endless {
        fn decide(&self, _ctx: &DecisionContext<'_>) -> Decision {
            let mut n = self.0.lock().unwrap();
            *n += 1;
            Decision::run(StrategyKind::Keyword, format!("bear {}", n), "again")
        }

        fn name(&self) -> &str {
            "endless"
        }
    }

    fn agent(policy: Arc<dyn DecisionPolicy>, timeout: Duration) -> SearchAgent {
        let corpus = corpus();
        let registry = Arc::new(StrategyRegistry::build(
            &corpus,
            Arc::new(HashingBackend::new(64).unwrap()),
            &RetrievalConfig::default(),
        ));
        SearchAgent::new(
            corpus,
            registry,
            policy,
            Arc::new(ScoreReranker),
            MergeEngine::new(MergeConfig::default()),
            timeout,
        )
    }

    fn ids(outcome: &SearchOutcome) -> Vec<u64> {
        outcome.results.iter().map(|h| h.movie_id).collect()
    }

    #[test]
    fn test_actor_genre_intersection() {
        let policy = Scripted::new(vec![
            Decision::run(StrategyKind::Actor, "dicaprio", ""),
            Decision::run(StrategyKind::Genre, "adventure", ""),
        ]);
        let outcome = agent(policy, Duration::from_secs(60))
            .search(&SearchRequest::new("dicaprio adventure"))
            .unwrap();
        assert_eq!(ids(&outcome), vec![2]);
        assert_eq!(outcome.stop_reason, StopReason::PolicyStop);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(
            outcome.results[0].contributing_strategies,
            vec![StrategyKind::Genre, StrategyKind::Actor]
        );
    }

    #[test]
    fn test_empty_intersection_falls_back() {
        let policy = Scripted::new(vec![
            Decision::run(StrategyKind::Actor, "dicaprio", ""),
            Decision::run(StrategyKind::Genre, "comedy", ""),
        ]);
        let outcome = agent(policy, Duration::from_secs(60))
            .search(&SearchRequest::new("dicaprio comedy"))
            .unwrap();
        assert_eq!(ids(&outcome), vec![2, 1]);
    }

    #[test]
    fn test_later_keyword_step_keeps_filtered_movie() {
        let policy = Scripted::new(vec![
            Decision::run(StrategyKind::Actor, "dicaprio", ""),
            Decision::run(StrategyKind::Genre, "adventure", ""),
            Decision::run(StrategyKind::Keyword, "young bear", ""),
        ]);
        let outcome = agent(policy, Duration::from_secs(60))
            .search(&SearchRequest::new("dicaprio adventure"))
            .unwrap();
        assert_eq!(ids(&outcome), vec![2]);
        assert_eq!(outcome.history[2].fusion, AppliedFusion::Refine);
    }

    #[test]
    fn test_empty_step_between_filters() {
        let policy = Scripted::new(vec![
            Decision::run(StrategyKind::Actor, "dicaprio", ""),
            Decision::run(StrategyKind::Pattern, "zzzz", ""),
            Decision::run(StrategyKind::Genre, "thriller", ""),
        ]);
        let outcome = agent(policy, Duration::from_secs(60))
            .search(&SearchRequest::new("dicaprio thriller"))
            .unwrap();
        let fusions: Vec<AppliedFusion> = outcome.history.iter().map(|e| e.fusion).collect();
        assert_eq!(
            fusions,
            vec![AppliedFusion::Seed, AppliedFusion::Skipped, AppliedFusion::Intersection]
        );
        assert_eq!(ids(&outcome), vec![2]);
    }

    #[test]
    fn test_iteration_limit_bounds_endless_policy() {
        let outcome = agent(Arc::new(Endless::default()), Duration::from_secs(60))
            .search(&SearchRequest::new("bear").with_max_iterations(3))
            .unwrap();
        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.stop_reason, StopReason::IterationLimit);
    }

    #[test]
    fn test_repeated_and_unknown_choices_stop() {
        let policy = Scripted::new(vec![
            Decision::run(StrategyKind::Keyword, "bear", ""),
            Decision::run(StrategyKind::Keyword, "Bear ", ""),
        ]);
        let outcome = agent(policy, Duration::from_secs(60))
            .search(&SearchRequest::new("bear"))
            .unwrap();
        assert_eq!(outcome.stop_reason, StopReason::RepeatedPair);
        assert_eq!(outcome.iterations, 1);
        assert!(!outcome.results.is_empty());

        let policy = Scripted::new(vec![Decision {
            continue_search: true,
            tool: Some("year_search".to_string()),
            query: Some("1999".to_string()),
            rationale: String::new(),
        }]);
        let outcome = agent(policy, Duration::from_secs(60))
            .search(&SearchRequest::new("bear"))
            .unwrap();
        assert_eq!(outcome.stop_reason, StopReason::UnknownStrategy);
        assert!(outcome.results.is_empty());
    }

    #[test]
    fn test_deadline_stops_before_work() {
        let outcome = agent(Arc::new(Endless::default()), Duration::ZERO)
            .search(&SearchRequest::new("bear"))
            .unwrap();
        assert_eq!(outcome.stop_reason, StopReason::DeadlineExceeded);
        assert_eq!(outcome.iterations, 0);
    }

    #[test]
    fn test_invalid_request_is_rejected() {
        let agent = agent(Arc::new(Endless::default()), Duration::from_secs(60));
        assert!(agent.search(&SearchRequest::new("  ")).is_err());
        assert!(agent
            .search(&SearchRequest::new("bear").with_result_limit(0))
            .is_err());
    }

    #[test]
    fn test_result_limit_truncates() {
        let outcome = agent(Arc::new(Endless::default()), Duration::from_secs(60))
            .search(&SearchRequest::new("bear").with_result_limit(1))
            .unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert!(outcome.total_candidates >= 1);
    }
}
