//! Retrieval quality against a golden set
//!
//! Each golden case pairs a query with the titles a good answer should
//! contain. The agent runs once per case with the result limit set to `k`;
//! precision@k, recall@k and F1 are computed over case-insensitive title
//! matches. An optional [`RelevanceJudge`] asks a completion service to grade
//! every returned movie on a 0-3 scale.
//!
//! ```json
//! { "test_cases": [ { "query": "movies about bears",
//!                     "relevant_docs": ["Paddington", "Grizzly Man"] } ] }
//! ```

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::agent::SearchAgent;
use crate::config::AgentConfig;
use crate::corpus::MovieCorpus;
use crate::error::{GoldenSetError, SearchError};
use crate::llm::CompletionService;
use crate::types::{MovieId, SearchHit};
use crate::util::truncate_str;

/// Highest grade the judge may give
pub const MAX_JUDGE_SCORE: u8 = 3;

const JUDGE_DESCRIPTION_EXCERPT: usize = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldenCase {
    pub query: String,
    /// Titles of the movies a good answer contains
    pub relevant_docs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldenSet {
    pub test_cases: Vec<GoldenCase>,
}

impl GoldenSet {
    pub fn from_json(json: &str) -> Result<Self, GoldenSetError> {
        let set: GoldenSet = serde_json::from_str(json)?;
        if set.test_cases.is_empty() {
            return Err(GoldenSetError::Empty);
        }
        if let Some(case) = set.test_cases.iter().find(|c| c.relevant_docs.is_empty()) {
            return Err(GoldenSetError::NoRelevantDocs(case.query.clone()));
        }
        Ok(set)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, GoldenSetError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| GoldenSetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let set = Self::from_json(&content)?;
        info!("Loaded {} golden cases from {}", set.test_cases.len(), path.display());
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.test_cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.test_cases.is_empty()
    }
}

/// Precision, recall and F1 at a cutoff
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RetrievalMetrics {
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
    pub relevant_retrieved: usize,
}

impl RetrievalMetrics {
    /// Score the first `k` retrieved titles against the relevant ones.
    ///
    /// Precision divides by the titles actually retrieved, so a short list is
    /// not penalized for the slots it left empty. Nothing retrieved scores 0.
    pub fn at_k(retrieved: &[String], relevant: &[String], k: usize) -> Self {
        let relevant: HashSet<String> = relevant.iter().map(|t| title_key(t)).collect();
        let considered = &retrieved[..retrieved.len().min(k)];

        let mut seen = HashSet::new();
        let relevant_retrieved = considered
            .iter()
            .map(|t| title_key(t))
            .filter(|key| relevant.contains(key) && seen.insert(key.clone()))
            .count();

        let precision = ratio(relevant_retrieved, considered.len());
        let recall = ratio(relevant_retrieved, relevant.len());
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            precision,
            recall,
            f1,
            relevant_retrieved,
        }
    }
}

fn title_key(title: &str) -> String {
    title.trim().to_lowercase()
}

fn ratio(numerator: usize, denominator: usize) -> f32 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f32 / denominator as f32
    }
}

/// Grades returned movies 0 (not relevant) to 3 (highly relevant)
#[derive(Debug)]
pub struct RelevanceJudge {
    service: Arc<dyn CompletionService>,
    corpus: MovieCorpus,
}

impl RelevanceJudge {
    pub fn new(service: Arc<dyn CompletionService>, corpus: MovieCorpus) -> Self {
        Self { service, corpus }
    }

    fn build_prompt(&self, query: &str, hits: &[SearchHit]) -> String {
        let mut listing = String::new();
        for hit in hits {
            let description = self
                .corpus
                .get(hit.movie_id)
                .map(|r| truncate_str(&r.description, JUDGE_DESCRIPTION_EXCERPT))
                .unwrap_or_default();
            let _ = writeln!(listing, "{} - {}", hit.title, description);
        }

        format!(
            "Rate how relevant each result is to this query on a 0-3 scale:\n\n\
             Query: \"{query}\"\n\n\
             Results:\n{listing}\n\
             Scale:\n\
             - 3: Highly relevant\n\
             - 2: Relevant\n\
             - 1: Marginally relevant\n\
             - 0: Not relevant\n\n\
             Do NOT give any numbers other than 0, 1, 2, or 3.\n\n\
             Return ONLY the scores in the same order you were given the results. \
             Return a valid JSON list, nothing else. For example:\n\n\
             [2, 0, 3, 2, 0, 1]"
        )
    }

    /// One grade per hit, or `None` when the service fails or the reply is unusable
    pub fn judge(&self, query: &str, hits: &[SearchHit]) -> Option<Vec<u8>> {
        if hits.is_empty() {
            return Some(Vec::new());
        }

        let prompt = self.build_prompt(query, hits);
        match self.service.complete(&prompt) {
            Ok(reply) => {
                let grades = parse_grades(&reply, hits.len());
                if grades.is_none() {
                    warn!("Judge reply unusable for '{}': {}", query, truncate_str(&reply, 120));
                }
                grades
            }
            Err(e) => {
                warn!("Judge call failed for '{}': {}", query, e);
                None
            }
        }
    }
}

/// Parse a JSON list of integer grades out of a model reply.
///
/// Grades above the scale are clamped. Extra grades are dropped; too few, a
/// negative or a non-integer entry rejects the reply.
pub fn parse_grades(reply: &str, expected: usize) -> Option<Vec<u8>> {
    let start = reply.find('[')?;
    let end = reply.rfind(']')?;
    if end < start {
        return None;
    }

    let values: Vec<serde_json::Value> = serde_json::from_str(&reply[start..=end]).ok()?;
    if values.len() < expected {
        debug!("Judge returned {} grades for {} results", values.len(), expected);
        return None;
    }

    values
        .iter()
        .take(expected)
        .map(|v| v.as_u64().map(|g| g.min(MAX_JUDGE_SCORE as u64) as u8))
        .collect()
}

/// Outcome of one golden case
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub query: String,
    pub retrieved: Vec<String>,
    pub retrieved_ids: Vec<MovieId>,
    /// Retrieved titles that appear in the golden list
    pub relevant: Vec<String>,
    pub metrics: RetrievalMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judge_scores: Option<Vec<u8>>,
}

impl CaseReport {
    pub fn mean_judge_score(&self) -> Option<f32> {
        let scores = self.judge_scores.as_ref()?;
        if scores.is_empty() {
            return None;
        }
        Some(scores.iter().map(|&s| s as f32).sum::<f32>() / scores.len() as f32)
    }
}

/// Per-case reports plus macro averages
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub k: usize,
    pub cases: Vec<CaseReport>,
    pub mean_precision: f32,
    pub mean_recall: f32,
    pub mean_f1: f32,
    /// Mean judge grade over the cases the judge could score
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_judge_score: Option<f32>,
}

impl EvaluationReport {
    fn summarize(k: usize, cases: Vec<CaseReport>) -> Self {
        let mean = |f: fn(&RetrievalMetrics) -> f32| {
            if cases.is_empty() {
                0.0
            } else {
                cases.iter().map(|c| f(&c.metrics)).sum::<f32>() / cases.len() as f32
            }
        };
        let mean_precision = mean(|m| m.precision);
        let mean_recall = mean(|m| m.recall);
        let mean_f1 = mean(|m| m.f1);

        let judged: Vec<f32> = cases.iter().filter_map(CaseReport::mean_judge_score).collect();
        let mean_judge_score =
            (!judged.is_empty()).then(|| judged.iter().sum::<f32>() / judged.len() as f32);

        Self {
            k,
            cases,
            mean_precision,
            mean_recall,
            mean_f1,
            mean_judge_score,
        }
    }
}

/// Runs every golden case through a [`SearchAgent`]
pub struct Evaluator<'a> {
    agent: &'a SearchAgent,
    limits: AgentConfig,
    k: usize,
    judge: Option<RelevanceJudge>,
}

impl<'a> Evaluator<'a> {
    pub fn new(agent: &'a SearchAgent, limits: AgentConfig, k: usize) -> Self {
        Self {
            agent,
            limits,
            k: k.max(1),
            judge: None,
        }
    }

    pub fn with_judge(mut self, judge: RelevanceJudge) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn evaluate_case(&self, case: &GoldenCase) -> Result<CaseReport, SearchError> {
        let request = self.limits.request(case.query.clone()).with_result_limit(self.k);
        let outcome = self.agent.search(&request)?;

        let retrieved: Vec<String> = outcome.results.iter().map(|h| h.title.clone()).collect();
        let retrieved_ids = outcome.results.iter().map(|h| h.movie_id).collect();
        let metrics = RetrievalMetrics::at_k(&retrieved, &case.relevant_docs, self.k);

        let golden: HashSet<String> = case.relevant_docs.iter().map(|t| title_key(t)).collect();
        let relevant = retrieved
            .iter()
            .filter(|t| golden.contains(&title_key(t)))
            .cloned()
            .collect();

        let judge_scores = self
            .judge
            .as_ref()
            .and_then(|judge| judge.judge(&case.query, &outcome.results));

        debug!(
            query = %case.query,
            precision = metrics.precision,
            recall = metrics.recall,
            "Evaluated golden case"
        );

        Ok(CaseReport {
            query: case.query.clone(),
            retrieved,
            retrieved_ids,
            relevant,
            metrics,
            judge_scores,
        })
    }

    pub fn evaluate(&self, golden: &GoldenSet) -> Result<EvaluationReport, SearchError> {
        let cases = golden
            .test_cases
            .iter()
            .map(|case| self.evaluate_case(case))
            .collect::<Result<Vec<_>, _>>()?;

        let report = EvaluationReport::summarize(self.k, cases);
        info!(
            k = report.k,
            cases = report.cases.len(),
            precision = report.mean_precision,
            recall = report.mean_recall,
            f1 = report.mean_f1,
            "Evaluation finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::types::StrategyKind;
    use crate::MovieRecord;
    use std::sync::Mutex;

    fn titles(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_metrics_partial_hit() {
        let m = RetrievalMetrics::at_k(
            &titles(&["Paddington", "Big", "Grizzly Man", "Alien"]),
            &titles(&["Paddington", "The Revenant", "Grizzly Man"]),
            5,
        );
        assert_eq!(m.relevant_retrieved, 2);
        assert!(approx(m.precision, 0.5));
        assert!(approx(m.recall, 2.0 / 3.0));
        assert!(approx(m.f1, 2.0 * 0.5 * (2.0 / 3.0) / (0.5 + 2.0 / 3.0)));
    }

    #[test]
    fn test_metrics_respect_cutoff() {
        let m = RetrievalMetrics::at_k(
            &titles(&["Big", "Alien", "Paddington"]),
            &titles(&["Paddington"]),
            2,
        );
        assert_eq!(m.relevant_retrieved, 0);
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.f1, 0.0);
    }

    #[test]
    fn test_metrics_ignore_case_and_duplicates() {
        let m = RetrievalMetrics::at_k(
            &titles(&["paddington ", "Paddington"]),
            &titles(&["Paddington"]),
            5,
        );
        assert_eq!(m.relevant_retrieved, 1);
        assert!(approx(m.precision, 0.5));
        assert!(approx(m.recall, 1.0));
    }

    #[test]
    fn test_metrics_nothing_retrieved() {
        let m = RetrievalMetrics::at_k(&[], &titles(&["Big"]), 5);
        assert_eq!(m, RetrievalMetrics::default());
    }

    #[test]
    fn test_golden_set_validation() {
        assert!(matches!(
            GoldenSet::from_json(r#"{"test_cases": []}"#),
            Err(GoldenSetError::Empty)
        ));
        assert!(matches!(
            GoldenSet::from_json(r#"{"test_cases": [{"query": "bears", "relevant_docs": []}]}"#),
            Err(GoldenSetError::NoRelevantDocs(q)) if q == "bears"
        ));
        assert!(matches!(
            GoldenSet::from_json("not json"),
            Err(GoldenSetError::Parse(_))
        ));

        let set = GoldenSet::from_json(
            r#"{"test_cases": [{"query": "bears", "relevant_docs": ["Paddington"]}]}"#,
        )
        .unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_parse_grades() {
        assert_eq!(parse_grades("[2, 0, 3]", 3), Some(vec![2, 0, 3]));
        assert_eq!(
            parse_grades("```json\n[1, 2]\n```", 2),
            Some(vec![1, 2])
        );
        assert_eq!(parse_grades("[7, 1]", 2), Some(vec![3, 1]));
        assert_eq!(parse_grades("[1, 2, 3]", 2), Some(vec![1, 2]));
        assert_eq!(parse_grades("[1]", 2), None);
        assert_eq!(parse_grades("[1, \"two\"]", 2), None);
        assert_eq!(parse_grades("[-1, 2]", 2), None);
        assert_eq!(parse_grades("no scores", 1), None);
    }

    #[derive(Debug)]
    struct Fixed {
        reply: Result<String, ()>,
        prompts: Mutex<Vec<String>>,
    }

    impl Fixed {
        fn new(reply: Result<&str, ()>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(str::to_string),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    impl CompletionService for Fixed {
        fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone().map_err(|_| LlmError::Timeout)
        }
    }

    fn corpus() -> MovieCorpus {
        MovieCorpus::from_records(vec![
            MovieRecord::new(1, "Paddington").with_description("A young bear in London"),
            MovieRecord::new(2, "Alien").with_description("A creature stalks a space freighter"),
        ])
        .unwrap()
    }

    fn hit(id: MovieId, title: &str) -> SearchHit {
        SearchHit {
            movie_id: id,
            title: title.to_string(),
            score: 1.0,
            contributing_strategies: vec![StrategyKind::Keyword],
        }
    }

    #[test]
    fn test_judge_prompt_lists_results_in_order() {
        let service = Fixed::new(Ok("[3, 0]"));
        let judge = RelevanceJudge::new(service.clone(), corpus());

        let grades = judge.judge("bears", &[hit(1, "Paddington"), hit(2, "Alien")]);
        assert_eq!(grades, Some(vec![3, 0]));

        let prompts = service.prompts.lock().unwrap();
        let prompt = &prompts[0];
        assert!(prompt.contains("Query: \"bears\""));
        let first = prompt.find("Paddington - A young bear in London").unwrap();
        let second = prompt.find("Alien - A creature stalks").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_judge_failure_is_not_fatal() {
        let judge = RelevanceJudge::new(Fixed::new(Err(())), corpus());
        assert_eq!(judge.judge("bears", &[hit(1, "Paddington")]), None);

        let service = Fixed::new(Ok("[1]"));
        let judge = RelevanceJudge::new(service.clone(), corpus());
        assert_eq!(judge.judge("bears", &[]), Some(Vec::new()));
        assert!(service.prompts.lock().unwrap().is_empty());
    }

    #[test]
    fn test_summary_averages_cases() {
        let case = |precision: f32, judge: Option<Vec<u8>>| CaseReport {
            query: "q".to_string(),
            retrieved: Vec::new(),
            retrieved_ids: Vec::new(),
            relevant: Vec::new(),
            metrics: RetrievalMetrics {
                precision,
                recall: 1.0,
                f1: 0.0,
                relevant_retrieved: 0,
            },
            judge_scores: judge,
        };

        let report = EvaluationReport::summarize(
            5,
            vec![case(1.0, Some(vec![3, 1])), case(0.5, None)],
        );
        assert!(approx(report.mean_precision, 0.75));
        assert!(approx(report.mean_recall, 1.0));
        assert_eq!(report.mean_judge_score, Some(2.0));
    }
}
