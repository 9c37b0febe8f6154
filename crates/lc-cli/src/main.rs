use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    cache::{self, CacheArgs},
    gazetteer::{self, GazetteerArgs},
    run::{self, RunArgs},
    summarize::{self, SummarizeArgs},
    version::{self, VersionArgs},
};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "lc-replicate",
    about = "Resumable learning-curve replications for NER engines"
)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run (or resume) a replication experiment.
    Run(RunArgs),
    /// Extract a gazetteer from a CoNLL file.
    Gazetteer(GazetteerArgs),
    /// Inspect the result cache of an experiment directory.
    Cache(CacheArgs),
    /// Print per-fold mean and confidence interval of score tables.
    Summarize(SummarizeArgs),
    /// Print version information.
    Version(VersionArgs),
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.command {
        Command::Run(args) => run::run(&args),
        Command::Gazetteer(args) => gazetteer::run(&args),
        Command::Cache(args) => cache::run(&args),
        Command::Summarize(args) => summarize::run(&args),
        Command::Version(args) => version::run(&args),
    }
}
