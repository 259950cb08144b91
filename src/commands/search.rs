use anyhow::{Context, Result};
use marquee::{
    agent::{SearchAgent, SearchOutcome},
    answer::AnswerGenerator,
    config::{Config, PolicyKind, RerankerKind},
    corpus::MovieCorpus,
    embedding::create_backend,
    llm::{ChatCompletionsClient, CompletionService},
    retrieval::StrategyRegistry,
    util::truncate_str,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Per-invocation overrides of the `[agent]` limits
pub struct QueryOptions {
    pub query: String,
    pub max_iterations: Option<usize>,
    pub max_results: Option<usize>,
    pub limit: Option<usize>,
    pub json: bool,
}

pub(super) struct Session {
    pub(super) corpus: MovieCorpus,
    pub(super) agent: SearchAgent,
    pub(super) llm: Option<Arc<dyn CompletionService>>,
}

pub(super) fn open_session(config: &Config, want_llm: bool) -> Result<Session> {
    let corpus = MovieCorpus::load(&config.corpus.path)
        .with_context(|| format!("Failed to load corpus '{}'", config.corpus.path.display()))?;
    let backend =
        create_backend(&config.embedding).context("Failed to create embedding backend")?;
    let registry = Arc::new(StrategyRegistry::build(&corpus, backend, &config.retrieval));

    let needs_llm = want_llm
        || config.agent.policy == PolicyKind::Llm
        || config.agent.reranker == RerankerKind::Llm;
    let llm: Option<Arc<dyn CompletionService>> = if needs_llm {
        match ChatCompletionsClient::new(config.llm.clone()) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!("Completion service unavailable: {}", e);
                None
            }
        }
    } else {
        None
    };

    let agent = SearchAgent::from_config(config, corpus.clone(), registry, llm.clone());
    Ok(Session { corpus, agent, llm })
}

fn execute(session: &Session, config: &Config, options: &QueryOptions) -> Result<SearchOutcome> {
    let mut request = config.agent.request(options.query.clone());
    if let Some(n) = options.max_iterations {
        request = request.with_max_iterations(n);
    }
    if let Some(n) = options.max_results {
        request = request.with_max_results_per_tool(n);
    }
    if let Some(n) = options.limit {
        request = request.with_result_limit(n);
    }

    info!("Searching for: {}", options.query);
    let outcome = session.agent.search(&request)?;
    Ok(outcome)
}

fn print_outcome(session: &Session, outcome: &SearchOutcome) {
    println!(
        "\nSearch Results ({} of {} candidates, {} iterations, stopped: {}):\n",
        outcome.results.len(),
        outcome.total_candidates,
        outcome.iterations,
        outcome.stop_reason,
    );
    for entry in &outcome.history {
        println!(
            "  {}. {}(\"{}\") -> {} results",
            entry.iteration,
            entry.strategy,
            entry.query,
            entry.movie_ids.len()
        );
    }
    if outcome.degraded {
        println!("  (semantic search was unavailable for part of this run)");
    }
    println!();

    for (i, hit) in outcome.results.iter().enumerate() {
        println!("[{}] [Score: {:.4}] {}", i + 1, hit.score, hit.title);
        if let Some(record) = session.corpus.get(hit.movie_id) {
            if !record.cast.is_empty() {
                println!("   Cast: {}", record.cast.join(", "));
            }
            println!("   {}", truncate_str(&record.description, 200));
        }
        let methods: Vec<&str> = hit.contributing_strategies.iter().map(|k| k.name()).collect();
        println!("   Found by: {}", methods.join(", "));
        println!();
    }
}

pub fn run_search(config: &Config, options: QueryOptions) -> Result<()> {
    let session = open_session(config, false)?;
    let outcome = execute(&session, config, &options)?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&session, &outcome);
    }
    Ok(())
}

pub fn run_generate(config: &Config, options: QueryOptions) -> Result<()> {
    let session = open_session(config, true)?;
    let outcome = execute(&session, config, &options)?;

    let service = session
        .llm
        .clone()
        .context("Answer generation needs a configured [llm] service")?;
    let answer = AnswerGenerator::new(service, session.corpus.clone())
        .generate(&outcome)
        .context("Answer generation failed")?;

    if options.json {
        let response = serde_json::json!({
            "outcome": outcome,
            "answer": answer,
        });
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_outcome(&session, &outcome);
        println!("Answer:\n\n{}\n", answer.answer_text);
        let cited: Vec<String> = answer.citations.iter().map(|id| id.to_string()).collect();
        println!("Cited movie ids: {}", cited.join(", "));
    }
    Ok(())
}
