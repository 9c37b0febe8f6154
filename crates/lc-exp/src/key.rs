use std::fmt;

use lc_core::errors::LcError;
use lc_core::hash::stable_hash_string;
use lc_corpus::Instance;
use serde::{Deserialize, Serialize};

/// Which external engine produced a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// The baseline classifier.
    Baseline,
    /// The sequence model under study.
    Model,
}

impl Engine {
    /// Prefix used in cache keys.
    pub fn prefix(self) -> &'static str {
        match self {
            Engine::Baseline => "baseline",
            Engine::Model => "model",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Canonical identity of one (engine, fold, replication) unit of work.
///
/// The fold is identified by a SHA-256 of its materialized instances, so the
/// key is the same in every process that builds the same fold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExperimentKey {
    engine: Engine,
    fold_fingerprint: String,
    replication: usize,
}

impl ExperimentKey {
    /// Builds the key for `fold` in replication `replication`.
    pub fn new(engine: Engine, fold: &[Instance], replication: usize) -> Result<Self, LcError> {
        Ok(Self {
            engine,
            fold_fingerprint: fold_fingerprint(fold)?,
            replication,
        })
    }

    /// Builds a key from a precomputed fold fingerprint.
    pub fn from_fingerprint(
        engine: Engine,
        fold_fingerprint: impl Into<String>,
        replication: usize,
    ) -> Self {
        Self {
            engine,
            fold_fingerprint: fold_fingerprint.into(),
            replication,
        }
    }

    /// Engine this key belongs to.
    pub fn engine(&self) -> Engine {
        self.engine
    }

    /// Replication index.
    pub fn replication(&self) -> usize {
        self.replication
    }

    /// Hex digest of the fold contents.
    pub fn fold_fingerprint(&self) -> &str {
        &self.fold_fingerprint
    }

    /// The string stored in the result cache: `<engine>_<fingerprint>_<replication>`.
    pub fn as_cache_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ExperimentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}",
            self.engine.prefix(),
            self.fold_fingerprint,
            self.replication
        )
    }
}

/// Stable digest of a materialized fold.
pub fn fold_fingerprint(fold: &[Instance]) -> Result<String, LcError> {
    stable_hash_string(&fold)
}
