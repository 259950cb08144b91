use anyhow::{Context, Result};
use marquee::{
    config::Config,
    evaluation::{EvaluationReport, Evaluator, GoldenSet, RelevanceJudge, MAX_JUDGE_SCORE},
};
use std::path::PathBuf;
use tracing::info;

use super::search::open_session;

pub struct EvaluateOptions {
    pub golden: PathBuf,
    pub k: usize,
    pub judge: bool,
    pub json: bool,
}

fn print_report(report: &EvaluationReport) {
    println!("k={} Evaluation Results\n", report.k);

    for case in &report.cases {
        println!("- Query: {}", case.query);
        println!("\t- Precision@{}: {:.4}", report.k, case.metrics.precision);
        println!("\t- Recall@{}: {:.4}", report.k, case.metrics.recall);
        println!("\t- F1 Score: {:.4}", case.metrics.f1);
        println!("\t- Retrieved: {:?}", case.retrieved);
        println!("\t- Relevant: {:?}", case.relevant);
        if let Some(scores) = &case.judge_scores {
            for (i, (title, score)) in case.retrieved.iter().zip(scores).enumerate() {
                println!("\t  {}. {}: {}/{}", i + 1, title, score, MAX_JUDGE_SCORE);
            }
        }
        println!();
    }

    println!("Mean Precision@{}: {:.4}", report.k, report.mean_precision);
    println!("Mean Recall@{}: {:.4}", report.k, report.mean_recall);
    println!("Mean F1: {:.4}", report.mean_f1);
    if let Some(mean) = report.mean_judge_score {
        println!("Mean judge score: {:.2}/{}", mean, MAX_JUDGE_SCORE);
    }
}

pub fn run_evaluate(config: &Config, options: EvaluateOptions) -> Result<()> {
    let golden = GoldenSet::load(&options.golden)
        .with_context(|| format!("Failed to load golden set '{}'", options.golden.display()))?;

    let session = open_session(config, options.judge)?;
    let mut evaluator = Evaluator::new(&session.agent, config.agent.clone(), options.k);
    if options.judge {
        let service = session
            .llm
            .clone()
            .context("Judging needs a configured [llm] service")?;
        evaluator = evaluator.with_judge(RelevanceJudge::new(service, session.corpus.clone()));
    }

    info!("Evaluating {} golden cases at k={}", golden.len(), options.k);
    let report = evaluator.evaluate(&golden)?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}
