use std::fs;
use std::path::{Path, PathBuf};

use lc_core::errors::{ErrorInfo, LcError};
use lc_core::hash::stable_hash_string;
use serde::{Deserialize, Serialize};

use crate::cache::CacheFormat;
use crate::folds::FoldPlan;
use crate::retry::RetryPolicy;

/// Resolved settings for one learning-curve experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Training budget split into folds.
    #[serde(default = "default_n_train")]
    pub n_train: usize,
    /// Validation instances per replication.
    #[serde(default = "default_n_valid")]
    pub n_valid: usize,
    /// Training instances, following the training budget, used for the gazetteer.
    #[serde(default = "default_n_gaz")]
    pub n_gaz: usize,
    /// Independent replications.
    #[serde(default = "default_n_replication")]
    pub n_replication: usize,
    /// Number of fold increments.
    #[serde(default = "default_n_train_fold")]
    pub n_train_fold: usize,
    /// Master seed for every shuffle.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Separator between token and label in materialized train/valid files.
    #[serde(default = "default_delim")]
    pub delim: String,
    /// Label of tokens outside any entity.
    #[serde(default = "default_other_label")]
    pub other_label: String,
    /// Write baseline scores.
    #[serde(default)]
    pub baseline: bool,
    /// Write model minus baseline deltas.
    #[serde(default)]
    pub delta: bool,
    /// Keep duplicate gazetteer entries.
    #[serde(default)]
    pub repeat_gaz: bool,
    /// Tabular output locations.
    #[serde(default)]
    pub outputs: OutputPaths,
    /// Model invocation settings.
    #[serde(default)]
    pub model: ModelConfig,
    /// Baseline invocation settings.
    #[serde(default)]
    pub baseline_tool: BaselineConfig,
    /// Retry policy for runs that yield no score.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Per-subprocess wall clock limit in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Result cache layout.
    #[serde(default)]
    pub cache_format: CacheFormat,
    /// Reuse cached scores even when score-affecting settings changed.
    #[serde(default)]
    pub allow_config_drift: bool,
}

/// The settings that decide what a cached score means.
#[derive(Serialize)]
struct ScoreInputs<'a> {
    n_train: usize,
    n_valid: usize,
    n_gaz: usize,
    seed: u64,
    delim: &'a str,
    other_label: &'a str,
    repeat_gaz: bool,
    model: &'a ModelConfig,
    baseline_tool: &'a BaselineConfig,
}

fn default_n_train() -> usize {
    100
}

fn default_n_valid() -> usize {
    250
}

fn default_n_gaz() -> usize {
    50
}

fn default_n_replication() -> usize {
    5
}

fn default_n_train_fold() -> usize {
    10
}

fn default_seed() -> u64 {
    42
}

fn default_delim() -> String {
    "\t".to_string()
}

fn default_other_label() -> String {
    "O".to_string()
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            n_train: default_n_train(),
            n_valid: default_n_valid(),
            n_gaz: default_n_gaz(),
            n_replication: default_n_replication(),
            n_train_fold: default_n_train_fold(),
            seed: default_seed(),
            delim: default_delim(),
            other_label: default_other_label(),
            baseline: false,
            delta: false,
            repeat_gaz: false,
            outputs: OutputPaths::default(),
            model: ModelConfig::default(),
            baseline_tool: BaselineConfig::default(),
            retry: RetryPolicy::default(),
            timeout_secs: None,
            cache_format: CacheFormat::default(),
            allow_config_drift: false,
        }
    }
}

impl ExperimentConfig {
    /// Checks every knob that would otherwise fail mid-run.
    pub fn validate(&self) -> Result<FoldPlan, LcError> {
        if self.n_replication == 0 {
            return Err(LcError::Config(
                ErrorInfo::new("replications-zero", "at least one replication is required")
                    .with_context("n_replication", "0"),
            ));
        }
        if self.delim.is_empty() {
            return Err(LcError::Config(ErrorInfo::new(
                "delim-empty",
                "token/label delimiter must not be empty",
            )));
        }
        if self.timeout_secs == Some(0) {
            return Err(LcError::Config(
                ErrorInfo::new("timeout-zero", "subprocess timeout must be positive")
                    .with_hint("omit the timeout to wait indefinitely"),
            ));
        }
        self.retry.validate()?;
        FoldPlan::new(self.n_train, self.n_train_fold)
    }

    /// Whether the baseline must run (for its own table or for deltas).
    pub fn wants_baseline(&self) -> bool {
        self.baseline || self.delta
    }

    /// Stable digest of the configuration, recorded in the experiment manifest.
    pub fn config_hash(&self) -> Result<String, LcError> {
        stable_hash_string(self)
    }

    /// Digest of the settings that change the meaning of a cached score.
    ///
    /// Fold and replication counts, output paths, retry, timeout, and cache
    /// layout are left out: changing them never invalidates a cached cell.
    pub fn score_settings_hash(&self) -> Result<String, LcError> {
        stable_hash_string(&ScoreInputs {
            n_train: self.n_train,
            n_valid: self.n_valid,
            n_gaz: self.n_gaz,
            seed: self.seed,
            delim: &self.delim,
            other_label: &self.other_label,
            repeat_gaz: self.repeat_gaz,
            model: &self.model,
            baseline_tool: &self.baseline_tool,
        })
    }
}

/// Destinations of the tabular score files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPaths {
    /// Model score table.
    pub model: PathBuf,
    /// Baseline score table.
    pub baseline: PathBuf,
    /// Delta table.
    pub delta: PathBuf,
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self {
            model: PathBuf::from("model.dat"),
            baseline: PathBuf::from("baseline.dat"),
            delta: PathBuf::from("delta.dat"),
        }
    }
}

/// How the sequence model is invoked.
///
/// The command receives `TRAIN VALID GAZ` as positional arguments, then
/// `--particles N` and `--gaz-pseudocount X` when set, then `extra_args`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Shell command prefix.
    #[serde(default = "ModelConfig::default_command")]
    pub command: String,
    /// Particle count for the sampler.
    #[serde(default)]
    pub particles: Option<u32>,
    /// Gazetteer pseudocount.
    #[serde(default)]
    pub gaz_pseudocount: Option<f64>,
    /// Extra arguments appended verbatim.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl ModelConfig {
    fn default_command() -> String {
        "bash scripts/run_expt_smc.sh".to_string()
    }

    /// Loads a model section from a YAML (or JSON) file.
    pub fn load(path: &Path) -> Result<Self, LcError> {
        let text = fs::read_to_string(path).map_err(|err| {
            LcError::Config(
                ErrorInfo::new("model-config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_yaml::from_str(&text).map_err(|err| {
            LcError::Config(
                ErrorInfo::new("model-config-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            command: Self::default_command(),
            particles: None,
            gaz_pseudocount: None,
            extra_args: Vec::new(),
        }
    }
}

const STANFORD_HOME: &str = "stanford-ner-2015-12-09";

/// How the baseline classifier is trained and evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineConfig {
    /// Shell command prefix shared by training and evaluation.
    #[serde(default = "BaselineConfig::default_command")]
    pub command: String,
    /// Feature configuration passed as `-prop`.
    #[serde(default = "BaselineConfig::default_features")]
    pub features: PathBuf,
    /// Serialized model location; defaults to the experiment work directory.
    #[serde(default)]
    pub model_path: Option<PathBuf>,
}

impl BaselineConfig {
    fn default_command() -> String {
        format!(
            "java -server -cp \"{home}/stanford-ner.jar:{home}/lib/*\" -d64 -Xmx10g edu.stanford.nlp.ie.crf.CRFClassifier",
            home = STANFORD_HOME
        )
    }

    fn default_features() -> PathBuf {
        PathBuf::from(STANFORD_HOME).join("features.prop")
    }
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            command: Self::default_command(),
            features: Self::default_features(),
            model_path: None,
        }
    }
}
