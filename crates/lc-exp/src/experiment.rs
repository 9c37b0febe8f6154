use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lc_core::errors::LcError;
use lc_corpus::{read_conll, Corpus};
use tracing::info;

use crate::cache::ResultCache;
use crate::config::ExperimentConfig;
use crate::manifest::{open_manifest, write_summary, RunSummary};
use crate::replicate::{run_replications, Engines, ReplicationOutcome, Workspace};
use crate::report::{write_score_table, ScoreMatrix};
use crate::stat::summarize_rows;
use crate::tools::{BaselineTool, ModelTool, ShellInvoker};

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct ExperimentReport {
    /// Score matrices and cache accounting.
    pub outcome: ReplicationOutcome,
    /// Delta matrix, when requested.
    pub delta: Option<ScoreMatrix>,
    /// Score tables written, in model, baseline, delta order.
    pub outputs: Vec<PathBuf>,
    /// Statistics persisted to `summary.json`.
    pub summary: RunSummary,
    /// Location of `summary.json`.
    pub summary_path: PathBuf,
}

/// Loads both corpora and runs the experiment with the configured external tools.
pub fn run_experiment(
    config: &ExperimentConfig,
    train_path: &Path,
    valid_path: &Path,
    expt_dir: &Path,
) -> Result<ExperimentReport, LcError> {
    config.validate()?;
    let train = read_conll(train_path)?;
    let valid = read_conll(valid_path)?;
    info!(
        train = train.len(),
        valid = valid.len(),
        "loaded corpora"
    );

    let workspace = Workspace::create(expt_dir)?;
    let shell = ShellInvoker::new(config.timeout_secs.map(Duration::from_secs));
    let baseline = BaselineTool::new(
        config.baseline_tool.clone(),
        workspace.dir(),
        &config.other_label,
        shell.clone(),
    );
    let model = ModelTool::new(config.model.clone(), shell);
    let engines = Engines {
        baseline: Some(&baseline),
        model: &model,
    };
    run_experiment_with_engines(config, &train, &valid, expt_dir, &engines)
}

/// Runs the experiment over in-memory corpora with caller-supplied engines.
pub fn run_experiment_with_engines(
    config: &ExperimentConfig,
    train: &Corpus,
    valid: &Corpus,
    expt_dir: &Path,
    engines: &Engines<'_>,
) -> Result<ExperimentReport, LcError> {
    let plan = config.validate()?;
    let manifest = open_manifest(expt_dir, config, train, valid)?;
    let mut cache = ResultCache::open(expt_dir, config.cache_format)?;
    let workspace = Workspace::create(expt_dir)?;

    let outcome = run_replications(config, &plan, train, valid, &mut cache, &workspace, engines)?;

    let mut outputs = vec![config.outputs.model.clone()];
    write_score_table(&config.outputs.model, &outcome.model)?;
    let mut series = BTreeMap::new();
    series.insert("model".to_string(), summarize_rows(&outcome.model.rows()?));

    let mut delta = None;
    if let Some(baseline) = &outcome.baseline {
        series.insert("baseline".to_string(), summarize_rows(&baseline.rows()?));
        if config.baseline {
            write_score_table(&config.outputs.baseline, baseline)?;
            outputs.push(config.outputs.baseline.clone());
        }
        if config.delta {
            let diff = outcome.model.delta(baseline)?;
            write_score_table(&config.outputs.delta, &diff)?;
            outputs.push(config.outputs.delta.clone());
            series.insert("delta".to_string(), summarize_rows(&diff.rows()?));
            delta = Some(diff);
        }
    }

    let summary = RunSummary {
        provenance: manifest.provenance,
        counts: outcome.counts,
        series,
    };
    let summary_path = write_summary(expt_dir, &summary)?;
    info!(
        cells = outcome.counts.cells,
        cache_hits = outcome.counts.cache_hits,
        computed = outcome.counts.computed,
        summary = %summary_path.display(),
        "experiment complete"
    );
    Ok(ExperimentReport {
        outcome,
        delta,
        outputs,
        summary,
        summary_path,
    })
}
