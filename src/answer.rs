//! Natural-language answers with `[n]` citations over a finished search

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::agent::SearchOutcome;
use crate::corpus::MovieCorpus;
use crate::error::LlmError;
use crate::llm::CompletionService;
use crate::types::MovieId;
use crate::util::truncate_str;

const DESCRIPTION_EXCERPT: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedAnswer {
    pub answer_text: String,
    /// Cited movies in the order the hits were presented
    pub citations: Vec<MovieId>,
}

#[derive(Debug)]
pub struct AnswerGenerator {
    service: Arc<dyn CompletionService>,
    corpus: MovieCorpus,
}

impl AnswerGenerator {
    pub fn new(service: Arc<dyn CompletionService>, corpus: MovieCorpus) -> Self {
        Self { service, corpus }
    }

    fn build_prompt(&self, outcome: &SearchOutcome) -> String {
        let mut strategy = String::new();
        for entry in &outcome.history {
            let _ = writeln!(
                strategy,
                "- {}: '{}' -> {} results",
                entry.strategy,
                entry.query,
                entry.movie_ids.len()
            );
        }

        let mut docs = String::new();
        for (n, hit) in outcome.results.iter().enumerate() {
            let found_by: Vec<&str> = hit.contributing_strategies.iter().map(|k| k.name()).collect();
            let description = self
                .corpus
                .get(hit.movie_id)
                .map(|r| truncate_str(&r.description, DESCRIPTION_EXCERPT))
                .unwrap_or_default();
            let _ = writeln!(
                docs,
                "[{}] {} (found by {})\n    Description: {}\n",
                n + 1,
                hit.title,
                found_by.join(", "),
                description
            );
        }

        format!(
            "Answer the user's question based on movies found through multiple search strategies.\n\n\
             User Query: {query}\n\n\
             Search Strategy Used:\n{strategy}\n\
             Found Movies:\n{docs}\n\
             Instructions:\n\
             - Provide a helpful answer that addresses the query\n\
             - Cite sources using [1], [2], etc. when referencing specific movies\n\
             - Mention how the search strategy helped find these results\n\
             - If the results don't fully answer the question, say so\n\n\
             Answer:",
            query = outcome.query,
        )
    }

    /// Ask the completion service for an answer. Service failures are returned
    /// to the caller; the search outcome itself is unaffected.
    pub fn generate(&self, outcome: &SearchOutcome) -> Result<GeneratedAnswer, LlmError> {
        let prompt = self.build_prompt(outcome);
        let answer_text = self.service.complete(&prompt)?;

        let cited = cited_indices(&answer_text);
        let mut citations: Vec<MovieId> = outcome
            .results
            .iter()
            .enumerate()
            .filter(|(i, _)| cited.contains(&(i + 1)))
            .map(|(_, hit)| hit.movie_id)
            .collect();
        if citations.is_empty() {
            debug!("Answer cites no result, attributing all hits");
            citations = outcome.results.iter().map(|hit| hit.movie_id).collect();
        }

        Ok(GeneratedAnswer {
            answer_text,
            citations,
        })
    }
}

/// 1-based indices of every `[n]` marker in `text`
fn cited_indices(text: &str) -> BTreeSet<usize> {
    let mut found = BTreeSet::new();
    let mut rest = text;
    while let Some(open) = rest.find('[') {
        rest = &rest[open + 1..];
        if let Some(close) = rest.find(']') {
            if let Ok(n) = rest[..close].trim().parse::<usize>() {
                found.insert(n);
            }
        }
    }
    found
}
