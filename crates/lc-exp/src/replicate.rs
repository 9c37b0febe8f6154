use std::fs;
use std::path::{Path, PathBuf};

use lc_core::errors::{ErrorInfo, LcError};
use lc_core::rng::RngHandle;
use lc_corpus::{
    extract_gazetteer, write_bio_gazetteer, write_empty_gazetteer, write_instances, Corpus,
    GazetteerOptions, Instance,
};
use tracing::{debug, info};

use crate::cache::{Fetched, ResultCache};
use crate::config::ExperimentConfig;
use crate::folds::FoldPlan;
use crate::key::{Engine, ExperimentKey};
use crate::manifest::CellCounts;
use crate::report::ScoreMatrix;
use crate::tools::{FoldFiles, ScoreTool};

const WORK_DIR: &str = "work";

/// Scratch files shared by every cell of an experiment.
///
/// The validation and gazetteer files are rewritten once per replication,
/// the training file once per fold.
#[derive(Debug, Clone)]
pub struct Workspace {
    dir: PathBuf,
    files: FoldFiles,
}

impl Workspace {
    /// Creates `<expt_dir>/work` and names the scratch files inside it.
    pub fn create(expt_dir: &Path) -> Result<Self, LcError> {
        let dir = expt_dir.join(WORK_DIR);
        fs::create_dir_all(&dir).map_err(|err| LcError::io("workspace-mkdir", &dir, err))?;
        let files = FoldFiles {
            train: dir.join("replications_train.tab"),
            valid: dir.join("replications_valid.tab"),
            gazetteer: dir.join("replications_gaz.tab"),
        };
        Ok(Self { dir, files })
    }

    /// Scratch directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths handed to the engines.
    pub fn files(&self) -> &FoldFiles {
        &self.files
    }
}

/// Engines taking part in a run. The baseline is skipped when absent.
pub struct Engines<'a> {
    /// Baseline engine, required when baseline or delta output is requested.
    pub baseline: Option<&'a dyn ScoreTool>,
    /// Model engine.
    pub model: &'a dyn ScoreTool,
}

/// Filled score matrices of a completed replication loop.
#[derive(Debug, Clone)]
pub struct ReplicationOutcome {
    /// Model scores.
    pub model: ScoreMatrix,
    /// Baseline scores, when the baseline ran.
    pub baseline: Option<ScoreMatrix>,
    /// Cache accounting.
    pub counts: CellCounts,
}

/// Fails fast when the corpora cannot supply every region the run slices.
pub fn check_budgets(
    config: &ExperimentConfig,
    train: &Corpus,
    valid: &Corpus,
) -> Result<(), LcError> {
    train.region("training and gazetteer", 0, config.n_train + config.n_gaz)?;
    valid.region("validation", 0, config.n_valid)?;
    Ok(())
}

/// Runs every (fold, replication) cell, consulting `cache` before each engine call.
///
/// Replication `r` shuffles fresh copies of both corpora with the RNG
/// substream `(config.seed, r)`: training first, then validation. Its
/// gazetteer is the `n_gaz` instances following the training budget.
pub fn run_replications(
    config: &ExperimentConfig,
    plan: &FoldPlan,
    train: &Corpus,
    valid: &Corpus,
    cache: &mut ResultCache,
    workspace: &Workspace,
    engines: &Engines<'_>,
) -> Result<ReplicationOutcome, LcError> {
    check_budgets(config, train, valid)?;
    let baseline = if config.wants_baseline() {
        Some(engines.baseline.ok_or_else(|| {
            LcError::Config(ErrorInfo::new(
                "baseline-engine-missing",
                "baseline output requested without a baseline engine",
            ))
        })?)
    } else {
        None
    };

    let sizes = plan.materialized_sizes(train.len());
    let n_reps = config.n_replication;
    let total = plan.total_cells(n_reps);
    info!(
        folds = plan.len(),
        replications = n_reps,
        experiments = total,
        "planned experiment"
    );

    let mut model_scores = ScoreMatrix::new(sizes.clone(), n_reps);
    let mut baseline_scores = baseline.map(|_| ScoreMatrix::new(sizes.clone(), n_reps));
    let mut counts = CellCounts::default();
    let gaz_opts = GazetteerOptions {
        repeat: config.repeat_gaz,
        other_label: config.other_label.clone(),
    };
    let files = workspace.files();

    for rep in 0..n_reps {
        let mut rng = RngHandle::substream(config.seed, rep as u64);
        let train_rep = train.shuffled(&mut rng);
        let valid_rep = valid.shuffled(&mut rng);

        write_instances(
            &files.valid,
            valid_rep.region("validation", 0, config.n_valid)?,
            &config.delim,
        )?;
        write_gazetteer(config, &train_rep, &gaz_opts, &files.gazetteer)?;

        for (fold, size) in sizes.iter().enumerate() {
            let prefix = train_rep.prefix(*size);
            let model_key = ExperimentKey::new(Engine::Model, prefix, rep)?;
            let baseline_key = baseline
                .map(|tool| ExperimentKey::new(tool.engine(), prefix, rep))
                .transpose()?;
            let pending = !cache.contains(&model_key)
                || baseline_key.as_ref().is_some_and(|key| !cache.contains(key));
            if pending {
                write_instances(&files.train, prefix, &config.delim)?;
            }

            if let (Some(tool), Some(key), Some(scores)) =
                (baseline, baseline_key.as_ref(), baseline_scores.as_mut())
            {
                let fetched = fetch_score(cache, config, key, tool, files)?;
                counts.record(&fetched);
                scores.set(fold, rep, fetched.score)?;
            }
            let fetched = fetch_score(cache, config, &model_key, engines.model, files)?;
            counts.record(&fetched);
            model_scores.set(fold, rep, fetched.score)?;

            counts.cells += 1;
            info!(
                replication = rep,
                fold_size = size,
                model = fetched.score,
                "cell {}/{}",
                counts.cells,
                total
            );
        }
    }

    Ok(ReplicationOutcome {
        model: model_scores,
        baseline: baseline_scores,
        counts,
    })
}

fn write_gazetteer(
    config: &ExperimentConfig,
    train: &Corpus,
    opts: &GazetteerOptions,
    path: &Path,
) -> Result<(), LcError> {
    if config.n_gaz < 1 {
        return write_empty_gazetteer(path);
    }
    let region: &[Instance] = train.region("gazetteer", config.n_train, config.n_gaz)?;
    let gazetteer = extract_gazetteer(region, opts);
    debug!(entries = gazetteer.len(), "materialized gazetteer");
    write_bio_gazetteer(gazetteer.iter(), path, &config.other_label)
}

fn fetch_score(
    cache: &mut ResultCache,
    config: &ExperimentConfig,
    key: &ExperimentKey,
    tool: &dyn ScoreTool,
    files: &FoldFiles,
) -> Result<Fetched, LcError> {
    cache.fetch_or_run(key, &config.retry, || {
        let run = tool.run(files)?;
        debug!(engine = %tool.engine(), score = ?run.score, "engine finished");
        Ok(run.score)
    })
}
