//! Resumable learning-curve experiments over external NER engines.
//!
//! The driver plans increasing training prefixes, shuffles each replication
//! from its own RNG substream, and memoizes every engine score in a durable
//! cache keyed by fold content, so an interrupted run resumes where it died.
#![deny(missing_docs)]

mod cache;
mod config;
mod experiment;
mod folds;
mod key;
mod manifest;
mod persist;
mod replicate;
mod report;
mod retry;
mod stat;
mod tools;

pub use cache::{CacheFormat, Fetched, ResultCache};
pub use config::{BaselineConfig, ExperimentConfig, ModelConfig, OutputPaths};
pub use experiment::{run_experiment, run_experiment_with_engines, ExperimentReport};
pub use folds::FoldPlan;
pub use key::{fold_fingerprint, Engine, ExperimentKey};
pub use manifest::{
    manifest_path, open_manifest, read_manifest, results_hash, summary_path, write_summary,
    CellCounts, ExperimentManifest, RunSummary,
};
pub use persist::{atomic_write_bytes, atomic_write_json};
pub use replicate::{check_budgets, run_replications, Engines, ReplicationOutcome, Workspace};
pub use report::{read_score_table, write_score_table, ScoreMatrix, ScoreRow};
pub use retry::{run_with_retry, RetryPolicy};
pub use stat::{summarize_row, summarize_rows, t_critical_95, FoldSummary};
pub use tools::{
    baseline_f1, model_f1, shell_quote, stanford_gazette_path, BaselineTool, FoldFiles, ModelTool,
    ScoreTool, ShellInvoker, ShellOutput, ToolRun,
};
