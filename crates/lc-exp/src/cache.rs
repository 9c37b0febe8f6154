use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use lc_core::errors::{ErrorInfo, LcError};
use lc_core::provenance::SchemaVersion;
use lc_core::serde::{from_json_slice, to_canonical_json_bytes};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::key::ExperimentKey;
use crate::persist::atomic_write_json;
use crate::retry::{run_with_retry, RetryPolicy};

const SNAPSHOT_FILE: &str = "cache.json";
const JOURNAL_FILE: &str = "cache.jsonl";

/// On-disk layout of the result cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheFormat {
    /// Whole mapping rewritten to `cache.json` after every insertion.
    #[default]
    Snapshot,
    /// One appended `cache.jsonl` line per insertion, replayed on load.
    Journal,
}

impl CacheFormat {
    /// File name used inside the experiment directory.
    pub fn file_name(self) -> &'static str {
        match self {
            CacheFormat::Snapshot => SNAPSHOT_FILE,
            CacheFormat::Journal => JOURNAL_FILE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheSnapshot {
    schema: SchemaVersion,
    entries: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JournalLine {
    key: String,
    score: f64,
}

/// Durable key to score mapping guarding every external tool run.
///
/// Each successful insertion is persisted before [`ResultCache::fetch_or_run`]
/// returns, so a crash loses at most the computation in flight. A single
/// process owns the cache at a time.
#[derive(Debug)]
pub struct ResultCache {
    path: PathBuf,
    format: CacheFormat,
    entries: BTreeMap<String, f64>,
}

/// Outcome of a [`ResultCache::fetch_or_run`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fetched {
    /// The cached or freshly computed score.
    pub score: f64,
    /// Whether the value came from the cache.
    pub hit: bool,
    /// Attempts spent computing (0 on a hit).
    pub attempts: u32,
}

impl ResultCache {
    /// Opens the cache in `dir`, creating the directory and an empty cache when absent.
    pub fn open(dir: &Path, format: CacheFormat) -> Result<Self, LcError> {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|err| LcError::io("cache-mkdir", dir, err))?;
            info!(dir = %dir.display(), "created experiment directory");
        }
        let path = dir.join(format.file_name());
        let entries = match format {
            CacheFormat::Snapshot => load_snapshot(&path)?,
            CacheFormat::Journal => load_journal(&path)?,
        };
        info!(path = %path.display(), entries = entries.len(), "opened result cache");
        Ok(Self {
            path,
            format,
            entries,
        })
    }

    /// Location of the persisted cache file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persistence layout in use.
    pub fn format(&self) -> CacheFormat {
        self.format
    }

    /// Number of cached results.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached score for `key`, if any.
    pub fn get(&self, key: &ExperimentKey) -> Option<f64> {
        self.entries.get(&key.as_cache_key()).copied()
    }

    /// Whether `key` has a cached score.
    pub fn contains(&self, key: &ExperimentKey) -> bool {
        self.entries.contains_key(&key.as_cache_key())
    }

    /// Cached keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Cached `(key, score)` pairs in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(key, score)| (key.as_str(), *score))
    }

    /// Stores `score` under `key` and persists it before returning.
    ///
    /// The in-memory mapping changes only once the write succeeded.
    pub fn insert(&mut self, key: &ExperimentKey, score: f64) -> Result<(), LcError> {
        let key = key.as_cache_key();
        match self.format {
            CacheFormat::Snapshot => {
                let mut next = self.entries.clone();
                next.insert(key, score);
                self.write_snapshot(&next)?;
                self.entries = next;
            }
            CacheFormat::Journal => {
                self.append_journal(&key, score)?;
                self.entries.insert(key, score);
            }
        }
        Ok(())
    }

    /// Returns the cached score for `key`, or computes, persists, and returns it.
    ///
    /// `compute` is never invoked for a cached key. A compute returning
    /// `Ok(None)` is retried per `policy`; errors propagate untouched and
    /// leave the cache unchanged.
    pub fn fetch_or_run<F>(
        &mut self,
        key: &ExperimentKey,
        policy: &RetryPolicy,
        compute: F,
    ) -> Result<Fetched, LcError>
    where
        F: FnMut() -> Result<Option<f64>, LcError>,
    {
        if let Some(score) = self.get(key) {
            debug!(key = %key, score, "cache hit");
            return Ok(Fetched {
                score,
                hit: true,
                attempts: 0,
            });
        }
        let label = key.as_cache_key();
        let (score, attempts) = run_with_retry(policy, &label, compute)?;
        self.insert(key, score)?;
        debug!(key = %key, score, attempts, "cached new result");
        Ok(Fetched {
            score,
            hit: false,
            attempts,
        })
    }

    fn write_snapshot(&self, entries: &BTreeMap<String, f64>) -> Result<(), LcError> {
        let snapshot = CacheSnapshot {
            schema: SchemaVersion::default(),
            entries: entries.clone(),
        };
        atomic_write_json(&self.path, &snapshot)
            .map_err(|err| cache_error("cache-persist", &self.path, err))
    }

    fn append_journal(&self, key: &str, score: f64) -> Result<(), LcError> {
        let line = JournalLine {
            key: key.to_string(),
            score,
        };
        let mut bytes = to_canonical_json_bytes(&line)?;
        bytes.push(b'\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| cache_error("cache-journal-open", &self.path, err))?;
        file.write_all(&bytes)
            .map_err(|err| cache_error("cache-journal-append", &self.path, err))?;
        file.sync_data()
            .map_err(|err| cache_error("cache-journal-sync", &self.path, err))
    }

    fn compact_journal(&self) -> Result<(), LcError> {
        let mut bytes = Vec::new();
        for (key, score) in &self.entries {
            let line = JournalLine {
                key: key.clone(),
                score: *score,
            };
            bytes.extend(to_canonical_json_bytes(&line)?);
            bytes.push(b'\n');
        }
        crate::persist::atomic_write_bytes(&self.path, &bytes)
            .map_err(|err| cache_error("cache-journal-compact", &self.path, err))
    }
}

fn cache_error(code: &str, path: &Path, err: impl ToString) -> LcError {
    LcError::Cache(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

fn load_snapshot(path: &Path) -> Result<BTreeMap<String, f64>, LcError> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let bytes = fs::read(path).map_err(|err| cache_error("cache-read", path, err))?;
    let snapshot: CacheSnapshot = from_json_slice(&bytes).map_err(|err| {
        LcError::Cache(
            ErrorInfo::new("cache-parse", err.info().message.clone())
                .with_context("path", path.display().to_string())
                .with_hint("the snapshot is written atomically; inspect the file for manual edits"),
        )
    })?;
    Ok(snapshot.entries)
}

fn load_journal(path: &Path) -> Result<BTreeMap<String, f64>, LcError> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let text = fs::read_to_string(path).map_err(|err| cache_error("cache-read", path, err))?;
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let mut entries = BTreeMap::new();
    let mut torn_tail = false;
    for (idx, raw) in lines.iter().enumerate() {
        match serde_json::from_str::<JournalLine>(raw) {
            Ok(line) => {
                entries.insert(line.key, line.score);
            }
            Err(err) if idx + 1 == lines.len() => {
                warn!(path = %path.display(), error = %err, "ignoring torn journal tail");
                torn_tail = true;
            }
            Err(err) => {
                return Err(LcError::Cache(
                    ErrorInfo::new("cache-journal-corrupt", err.to_string())
                        .with_context("path", path.display().to_string())
                        .with_context("line", (idx + 1).to_string()),
                ));
            }
        }
    }
    if torn_tail {
        let cache = ResultCache {
            path: path.to_path_buf(),
            format: CacheFormat::Journal,
            entries,
        };
        cache.compact_journal()?;
        return Ok(cache.entries);
    }
    Ok(entries)
}
