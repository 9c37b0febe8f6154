use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use lc_exp::{run_experiment, ExperimentConfig, ModelConfig};
use tracing::info;

use super::CacheFormatArg;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Training corpus (CoNLL, `TOKEN LABEL` lines).
    pub train: PathBuf,
    /// Validation corpus.
    pub valid: PathBuf,
    /// Experiment directory holding the result cache.
    pub expt_dir: PathBuf,
    /// YAML or JSON experiment configuration; flags below override it.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// YAML file replacing the whole model section.
    #[arg(long)]
    pub model_config: Option<PathBuf>,
    #[arg(long)]
    pub n_train: Option<usize>,
    #[arg(long)]
    pub n_valid: Option<usize>,
    #[arg(long)]
    pub n_gaz: Option<usize>,
    #[arg(long)]
    pub n_replication: Option<usize>,
    #[arg(long)]
    pub n_train_fold: Option<usize>,
    #[arg(long)]
    pub seed: Option<u64>,
    /// Token/label separator for materialized files; `\t` is accepted.
    #[arg(long)]
    pub delim: Option<String>,
    #[arg(long)]
    pub other_label: Option<String>,
    /// Write baseline scores.
    #[arg(long)]
    pub baseline: bool,
    /// Write model minus baseline scores.
    #[arg(long)]
    pub delta: bool,
    /// Keep duplicate gazetteer entries.
    #[arg(long)]
    pub repeat_gaz: bool,
    #[arg(long)]
    pub model_out: Option<PathBuf>,
    #[arg(long)]
    pub baseline_out: Option<PathBuf>,
    #[arg(long)]
    pub delta_out: Option<PathBuf>,
    /// Shell command prefix running the model.
    #[arg(long)]
    pub model_command: Option<String>,
    #[arg(long)]
    pub particles: Option<u32>,
    #[arg(long)]
    pub gaz_pseudocount: Option<f64>,
    /// Shell command prefix running the baseline classifier.
    #[arg(long)]
    pub baseline_command: Option<String>,
    /// Feature properties passed to the baseline.
    #[arg(long)]
    pub baseline_features: Option<PathBuf>,
    /// Attempts per cell before giving up on a tool that yields no score.
    #[arg(long)]
    pub max_attempts: Option<u32>,
    /// Kill a tool invocation after this many seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,
    #[arg(long, value_enum)]
    pub cache_format: Option<CacheFormatArg>,
    /// Reuse cached scores even though score settings or corpora changed.
    #[arg(long)]
    pub allow_config_drift: bool,
    /// Print the resolved configuration and exit.
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let config = resolve_config(args)?;
    if args.dry_run {
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }
    let report = run_experiment(&config, &args.train, &args.valid, &args.expt_dir)?;
    for path in &report.outputs {
        info!(path = %path.display(), "score table");
    }
    println!(
        "{} cells ({} cached, {} computed); summary at {}",
        report.outcome.counts.cells,
        report.outcome.counts.cache_hits,
        report.outcome.counts.computed,
        report.summary_path.display()
    );
    Ok(())
}

pub fn resolve_config(args: &RunArgs) -> Result<ExperimentConfig, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ExperimentConfig::default(),
    };
    override_with(&mut config.n_train, args.n_train);
    override_with(&mut config.n_valid, args.n_valid);
    override_with(&mut config.n_gaz, args.n_gaz);
    override_with(&mut config.n_replication, args.n_replication);
    override_with(&mut config.n_train_fold, args.n_train_fold);
    override_with(&mut config.seed, args.seed);
    override_with(&mut config.delim, args.delim.as_deref().map(unescape));
    override_with(&mut config.other_label, args.other_label.clone());
    config.baseline |= args.baseline;
    config.delta |= args.delta;
    config.repeat_gaz |= args.repeat_gaz;
    config.allow_config_drift |= args.allow_config_drift;
    override_with(&mut config.outputs.model, args.model_out.clone());
    override_with(&mut config.outputs.baseline, args.baseline_out.clone());
    override_with(&mut config.outputs.delta, args.delta_out.clone());
    override_with(&mut config.baseline_tool.command, args.baseline_command.clone());
    override_with(&mut config.baseline_tool.features, args.baseline_features.clone());
    override_with(&mut config.retry.max_attempts, args.max_attempts);
    if args.timeout_secs.is_some() {
        config.timeout_secs = args.timeout_secs;
    }
    if let Some(format) = args.cache_format {
        config.cache_format = format.into();
    }

    match &args.model_config {
        Some(path) => config.model = ModelConfig::load(path)?,
        None => {
            override_with(&mut config.model.command, args.model_command.clone());
            if args.particles.is_some() {
                config.model.particles = args.particles;
            }
            if args.gaz_pseudocount.is_some() {
                config.model.gaz_pseudocount = args.gaz_pseudocount;
            }
        }
    }
    config.validate()?;
    Ok(config)
}

fn load_config(path: &Path) -> Result<ExperimentConfig, Box<dyn Error>> {
    let text = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&text)?)
}

fn override_with<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn unescape(raw: &str) -> String {
    match raw {
        "\\t" => "\t".to_string(),
        "\\s" => " ".to_string(),
        other => other.to_string(),
    }
}
