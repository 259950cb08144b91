//! Marquee: agentic multi-strategy movie search

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use marquee::config::{Config, LogFormat};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "marquee")]
#[command(about = "Agentic multi-strategy movie search")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "marquee.toml")]
    config: PathBuf,

    /// Movie snapshot (overrides [corpus] path)
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct QueryArgs {
    /// Natural-language query
    query: String,

    /// Maximum decide/execute/merge cycles
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Results requested from each strategy
    #[arg(long)]
    max_results: Option<usize>,

    /// Number of movies returned
    #[arg(short, long)]
    limit: Option<usize>,

    /// Print the full outcome as JSON
    #[arg(long)]
    json: bool,
}

impl From<QueryArgs> for commands::QueryOptions {
    fn from(args: QueryArgs) -> Self {
        Self {
            query: args.query,
            max_iterations: args.max_iterations,
            max_results: args.max_results,
            limit: args.limit,
            json: args.json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run an agentic search
    Search(QueryArgs),

    /// Search, then answer the query with citations
    Generate(QueryArgs),

    /// Score search quality against a golden set
    Evaluate {
        /// Golden set of queries and relevant titles
        #[arg(long, default_value = "data/golden_dataset.json")]
        golden: PathBuf,

        /// Cutoff for precision@k and recall@k
        #[arg(short = 'k', long = "limit", default_value_t = 5)]
        k: usize,

        /// Also grade each result 0-3 with the [llm] service
        #[arg(long)]
        judge: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the available search strategies
    Tools,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };
    if let Some(corpus) = cli.corpus {
        config.corpus.path = corpus;
    }

    init_logging(&config, cli.verbose)?;

    match cli.command {
        Commands::Search(args) => commands::run_search(&config, args.into()),
        Commands::Generate(args) => commands::run_generate(&config, args.into()),
        Commands::Evaluate {
            golden,
            k,
            judge,
            json,
        } => commands::run_evaluate(
            &config,
            commands::EvaluateOptions {
                golden,
                k,
                judge,
                json,
            },
        ),
        Commands::Tools => {
            commands::show_tools();
            Ok(())
        }
    }
}

/// `RUST_LOG` wins; otherwise the configured level raised by `-v`
fn init_logging(config: &Config, verbose: u8) -> Result<()> {
    let level = config.logging.level.raised(verbose);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to install logger: {}", e))
}
