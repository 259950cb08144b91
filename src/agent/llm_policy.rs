//! Decision policy backed by a chat-completions service

use std::fmt::Write as _;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use super::policy::{Decision, DecisionContext, DecisionPolicy};
use crate::corpus::MovieCorpus;
use crate::llm::{extract_json_object, CompletionService};

const SAMPLE_TITLES: usize = 3;
const TOP_CANDIDATES: usize = 5;

/// Remote policy. Any failure to obtain a well-formed decision stops the run.
#[derive(Debug)]
pub struct LlmPolicy {
    service: Arc<dyn CompletionService>,
    corpus: MovieCorpus,
}

impl LlmPolicy {
    pub fn new(service: Arc<dyn CompletionService>, corpus: MovieCorpus) -> Self {
        Self { service, corpus }
    }

    fn title(&self, movie_id: u64) -> &str {
        self.corpus
            .get(movie_id)
            .map(|m| m.title.as_str())
            .unwrap_or("Unknown")
    }

    fn build_prompt(&self, ctx: &DecisionContext<'_>) -> String {
        let mut tools = String::new();
        for tool in ctx.catalog {
            let _ = writeln!(tools, "- {}: {}", tool.name, tool.description);
        }

        let mut history = String::new();
        if ctx.history.is_empty() {
            history.push_str("No searches performed yet.\n");
        } else {
            history.push_str("Previous searches:\n");
            for entry in ctx.history.entries() {
                let samples: Vec<&str> = entry
                    .movie_ids
                    .iter()
                    .take(SAMPLE_TITLES)
                    .map(|id| self.title(*id))
                    .collect();
                let _ = writeln!(
                    history,
                    "{}. {}(\"{}\") -> {} results{}",
                    entry.iteration,
                    entry.strategy,
                    entry.query,
                    entry.movie_ids.len(),
                    if samples.is_empty() {
                        String::new()
                    } else {
                        format!(" (e.g. {})", samples.join(", "))
                    }
                );
            }
        }

        let mut candidates = String::new();
        let top = ctx.pool.top(TOP_CANDIDATES);
        if top.is_empty() {
            candidates.push_str("No candidates yet.\n");
        } else {
            let _ = writeln!(candidates, "Current top candidates ({} total):", ctx.pool.len());
            for entry in top {
                let found_by: Vec<&str> = entry.found_by.iter().map(|k| k.name()).collect();
                let _ = writeln!(
                    candidates,
                    "- {} (score {:.3}, found by {})",
                    self.title(entry.movie_id),
                    entry.score,
                    found_by.join(", ")
                );
            }
        }

        let tried: Vec<serde_json::Value> = ctx
            .history
            .tried_pairs()
            .map(|(kind, query)| json!({"tool": kind.name(), "query": query}))
            .collect();
        let tried = serde_json::Value::Array(tried).to_string();

        format!(
            "You are a search agent that chooses the best search tool for a movie query.\n\n\
             Original user query: \"{query}\"\n\n\
             Available tools:\n{tools}\n\
             {history}\n\
             {candidates}\n\
             Already tried tool+query combinations (DO NOT repeat these):\n{tried}\n\n\
             Decide whether to continue searching and, if so, which tool to use next and\n\
             what query to pass to it.\n\n\
             Respond ONLY with valid JSON in this format:\n\
             {{\n  \"continue\": true/false,\n  \"tool\": \"tool_name\" or null,\n  \
             \"tool_query\": \"refined query\" or null,\n  \"reasoning\": \"brief explanation\"\n}}\n\n\
             Guidelines:\n\
             - Use actor_search first when actors are mentioned\n\
             - Use genre_search next to filter actor results; filters are intersected automatically\n\
             - Use semantic_search or hybrid_search for concept queries without specific actors\n\
             - Use pattern_search for exact phrases\n\
             - Stop after 2-3 complementary searches or when enough results are found\n",
            query = ctx.query,
        )
    }

    fn parse_decision(reply: &str) -> Decision {
        let Some(value) = extract_json_object(reply) else {
            return Decision::stop("Unparsable decision response");
        };

        let Some(continue_search) = value.get("continue").and_then(|c| c.as_bool()) else {
            return Decision::stop("Decision response missing 'continue'");
        };
        let rationale = value
            .get("reasoning")
            .and_then(|r| r.as_str())
            .unwrap_or_default()
            .to_string();
        if !continue_search {
            return Decision::stop(rationale);
        }

        let tool = value.get("tool").and_then(|t| t.as_str());
        let query = value
            .get("tool_query")
            .and_then(|q| q.as_str())
            .or_else(|| value.get("query").and_then(|q| q.as_str()));

        match (tool, query) {
            (Some(tool), Some(query)) if !tool.trim().is_empty() && !query.trim().is_empty() => Decision {
                continue_search: true,
                tool: Some(tool.trim().to_string()),
                query: Some(query.trim().to_string()),
                rationale,
            },
            _ => Decision::stop("Decision response missing tool or query"),
        }
    }
}

impl DecisionPolicy for LlmPolicy {
    fn decide(&self, ctx: &DecisionContext<'_>) -> Decision {
        let prompt = self.build_prompt(ctx);
        match self.service.complete(&prompt) {
            Ok(reply) => {
                debug!("Decision reply: {}", crate::util::truncate_str(&reply, 300));
                Self::parse_decision(&reply)
            }
            Err(e) => {
                warn!("Decision service failed, stopping: {}", e);
                Decision::stop(format!("Decision service failed: {}", e))
            }
        }
    }

    fn name(&self) -> &str {
        "llm"
    }
}
