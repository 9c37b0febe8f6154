use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use lc_core::errors::{ErrorInfo, LcError};
use lc_core::hash::stable_hash_string;
use lc_core::provenance::RunProvenance;
use lc_core::serde::from_json_slice;
use lc_corpus::Corpus;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::Fetched;
use crate::config::ExperimentConfig;
use crate::key::fold_fingerprint;
use crate::persist::atomic_write_json;
use crate::stat::FoldSummary;

const MANIFEST_FILE: &str = "manifest.json";
const SUMMARY_FILE: &str = "summary.json";

/// Provenance of an experiment directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentManifest {
    /// Who wrote the directory, when, and with which configuration.
    pub provenance: RunProvenance,
    /// Digest of the score settings and both corpora behind the cached cells.
    #[serde(default)]
    pub results_hash: String,
    /// Configuration that produced the cached results.
    pub config: ExperimentConfig,
}

impl ExperimentManifest {
    /// Manifest for `config` over `train` and `valid`, stamped now.
    pub fn new(config: &ExperimentConfig, train: &Corpus, valid: &Corpus) -> Result<Self, LcError> {
        let mut provenance = RunProvenance::now(config.config_hash()?, config.seed);
        provenance
            .tool_versions
            .insert("lc-exp".to_string(), env!("CARGO_PKG_VERSION").to_string());
        Ok(Self {
            provenance,
            results_hash: results_hash(config, train, valid)?,
            config: config.clone(),
        })
    }
}

/// Digest of everything that decides what a cached score means.
pub fn results_hash(config: &ExperimentConfig, train: &Corpus, valid: &Corpus) -> Result<String, LcError> {
    stable_hash_string(&[
        config.score_settings_hash()?,
        fold_fingerprint(train.instances())?,
        fold_fingerprint(valid.instances())?,
    ])
}

/// Location of the manifest inside `dir`.
pub fn manifest_path(dir: &Path) -> PathBuf {
    dir.join(MANIFEST_FILE)
}

/// Location of the run summary inside `dir`.
pub fn summary_path(dir: &Path) -> PathBuf {
    dir.join(SUMMARY_FILE)
}

/// Reads the manifest in `dir`, if one was written.
pub fn read_manifest(dir: &Path) -> Result<Option<ExperimentManifest>, LcError> {
    let path = manifest_path(dir);
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(&path).map_err(|err| LcError::io("manifest-read", &path, err))?;
    from_json_slice(&bytes).map(Some).map_err(|err| {
        LcError::Serde(
            ErrorInfo::new("manifest-parse", err.info().message.clone())
                .with_context("path", path.display().to_string()),
        )
    })
}

/// Records `config` as the owner of `dir`.
///
/// Changes that leave the results hash alone (more replications, other
/// output paths, retry or timeout) replace the manifest quietly. A changed
/// results hash means the cached cells were scored under other settings or
/// corpora; that fails with `config-drift` unless the configuration sets
/// `allow_config_drift`. Nothing is written when the check fails.
pub fn open_manifest(
    dir: &Path,
    config: &ExperimentConfig,
    train: &Corpus,
    valid: &Corpus,
) -> Result<ExperimentManifest, LcError> {
    let manifest = ExperimentManifest::new(config, train, valid)?;
    if let Some(previous) = read_manifest(dir)? {
        if previous.provenance.config_hash == manifest.provenance.config_hash
            && previous.results_hash == manifest.results_hash
        {
            info!(dir = %dir.display(), "resuming experiment");
            return Ok(previous);
        }
        if previous.results_hash == manifest.results_hash {
            info!(dir = %dir.display(), "bookkeeping settings changed; cached scores still apply");
        } else if config.allow_config_drift {
            warn!(
                dir = %dir.display(),
                previous = %previous.results_hash,
                current = %manifest.results_hash,
                "score settings or corpora changed; reusing cached scores as requested"
            );
        } else {
            return Err(LcError::Config(
                ErrorInfo::new(
                    "config-drift",
                    "experiment directory holds scores computed under different settings or corpora",
                )
                .with_context("dir", dir.display().to_string())
                .with_context("previous", previous.results_hash)
                .with_context("current", manifest.results_hash)
                .with_hint("use a fresh experiment directory, or pass --allow-config-drift to reuse the cache"),
            ));
        }
    }
    atomic_write_json(&manifest_path(dir), &manifest)?;
    Ok(manifest)
}

/// Cache accounting for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellCounts {
    /// Cells scored so far.
    pub cells: usize,
    /// Engine results served from the cache.
    pub cache_hits: usize,
    /// Engine results computed in this run.
    pub computed: usize,
    /// Tool invocations including retries.
    pub attempts: usize,
}

impl CellCounts {
    pub(crate) fn record(&mut self, fetched: &Fetched) {
        if fetched.hit {
            self.cache_hits += 1;
        } else {
            self.computed += 1;
        }
        self.attempts += fetched.attempts as usize;
    }
}

/// Aggregate statistics written to `summary.json` after a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Provenance of the run producing the summary.
    pub provenance: RunProvenance,
    /// Cache accounting.
    pub counts: CellCounts,
    /// Per-fold statistics keyed by series (`model`, `baseline`, `delta`).
    pub series: BTreeMap<String, Vec<FoldSummary>>,
}

/// Writes `summary` into `dir`.
pub fn write_summary(dir: &Path, summary: &RunSummary) -> Result<PathBuf, LcError> {
    let path = summary_path(dir);
    atomic_write_json(&path, summary)?;
    Ok(path)
}
