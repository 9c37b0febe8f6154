use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use indexmap::IndexSet;
use lc_core::errors::{ErrorInfo, LcError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chunk::{chunk_instance, Chunk};
use crate::conll::read_conll;
use crate::instance::Instance;

/// A `(surface text, label)` lexicon entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GazetteerEntry {
    /// Surface text; multi-token spans are joined by single spaces.
    pub text: String,
    /// Entity label without BIO prefix, or the other label for flat tokens.
    pub label: String,
}

impl GazetteerEntry {
    /// Creates an entry.
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
        }
    }
}

impl From<&Chunk> for GazetteerEntry {
    fn from(chunk: &Chunk) -> Self {
        Self::new(chunk.text(), chunk.label())
    }
}

/// Extraction settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GazetteerOptions {
    /// Keep duplicate entries instead of deduplicating.
    pub repeat: bool,
    /// Label marking tokens outside any entity.
    pub other_label: String,
}

impl Default for GazetteerOptions {
    fn default() -> Self {
        Self {
            repeat: false,
            other_label: "O".to_string(),
        }
    }
}

/// Extracted gazetteer, deduplicated or with duplicates retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gazetteer {
    /// Distinct entries in first-seen order.
    Set(IndexSet<GazetteerEntry>),
    /// Every extracted entry in extraction order.
    Multiset(Vec<GazetteerEntry>),
}

impl Gazetteer {
    /// Creates an empty gazetteer; `repeat` selects multiset semantics.
    pub fn new(repeat: bool) -> Self {
        if repeat {
            Gazetteer::Multiset(Vec::new())
        } else {
            Gazetteer::Set(IndexSet::new())
        }
    }

    /// Adds an entry, dropping it when an equal entry exists in set mode.
    pub fn insert(&mut self, entry: GazetteerEntry) {
        match self {
            Gazetteer::Set(set) => {
                set.insert(entry);
            }
            Gazetteer::Multiset(list) => list.push(entry),
        }
    }

    /// Number of stored entries (duplicates counted in multiset mode).
    pub fn len(&self) -> usize {
        match self {
            Gazetteer::Set(set) => set.len(),
            Gazetteer::Multiset(list) => list.len(),
        }
    }

    /// Whether no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates entries in storage order.
    pub fn iter(&self) -> Box<dyn ExactSizeIterator<Item = &GazetteerEntry> + '_> {
        match self {
            Gazetteer::Set(set) => Box::new(set.iter()),
            Gazetteer::Multiset(list) => Box::new(list.iter()),
        }
    }
}

/// Builds a gazetteer from labeled instances.
///
/// Entity spans collapse to one entry each; tokens carrying the other label
/// stay one entry per token.
pub fn extract_gazetteer(instances: &[Instance], opts: &GazetteerOptions) -> Gazetteer {
    let mut gazetteer = Gazetteer::new(opts.repeat);
    for instance in instances {
        for chunk in chunk_instance(instance, &opts.other_label) {
            gazetteer.insert(GazetteerEntry::from(&chunk));
        }
    }
    debug!(
        instances = instances.len(),
        entries = gazetteer.len(),
        repeat = opts.repeat,
        "extracted gazetteer"
    );
    gazetteer
}

fn write_error(path: &Path, err: impl ToString) -> LcError {
    LcError::Gazetteer(
        ErrorInfo::new("gazetteer-write", err.to_string())
            .with_context("path", path.display().to_string()),
    )
}

/// Writes entries as BIO-tagged `TOKEN LABEL` lines followed by one blank line.
///
/// Entries labeled `other_label` are written untagged, using their first token.
pub fn write_bio_gazetteer<'a>(
    entries: impl IntoIterator<Item = &'a GazetteerEntry>,
    path: &Path,
    other_label: &str,
) -> Result<(), LcError> {
    let file = File::create(path).map_err(|err| write_error(path, err))?;
    let mut out = BufWriter::new(file);
    for entry in entries {
        let mut tokens = entry.text.split_whitespace();
        let Some(first) = tokens.next() else {
            continue;
        };
        if entry.label == other_label {
            writeln!(out, "{} {}", first, entry.label).map_err(|err| write_error(path, err))?;
            continue;
        }
        writeln!(out, "{} B-{}", first, entry.label).map_err(|err| write_error(path, err))?;
        for token in tokens {
            writeln!(out, "{} I-{}", token, entry.label).map_err(|err| write_error(path, err))?;
        }
    }
    writeln!(out).map_err(|err| write_error(path, err))?;
    out.flush().map_err(|err| write_error(path, err))
}

/// Writes entries in the baseline's gazette format: `LABEL surface text` lines.
pub fn write_stanford_gazetteer<'a>(
    entries: impl IntoIterator<Item = &'a GazetteerEntry>,
    path: &Path,
) -> Result<(), LcError> {
    let file = File::create(path).map_err(|err| write_error(path, err))?;
    let mut out = BufWriter::new(file);
    for entry in entries {
        writeln!(out, "{} {}", entry.label, entry.text).map_err(|err| write_error(path, err))?;
    }
    out.flush().map_err(|err| write_error(path, err))
}

/// Writes the zero-length artifact used when the gazetteer budget is empty.
pub fn write_empty_gazetteer(path: &Path) -> Result<(), LcError> {
    File::create(path)
        .map(|_| ())
        .map_err(|err| write_error(path, err))
}

/// Reads a BIO gazetteer artifact back into entries, in file order.
pub fn read_bio_gazetteer(path: &Path, other_label: &str) -> Result<Vec<GazetteerEntry>, LcError> {
    let corpus = read_conll(path).map_err(|err| {
        LcError::Gazetteer(
            ErrorInfo::new("gazetteer-read", err.info().message.clone())
                .with_context("path", path.display().to_string()),
        )
    })?;
    Ok(corpus
        .instances()
        .iter()
        .flat_map(|instance| chunk_instance(instance, other_label))
        .map(|chunk| GazetteerEntry::from(&chunk))
        .collect())
}

/// Converts a BIO gazetteer artifact into the baseline's gazette format.
///
/// An empty BIO artifact yields an empty gazette.
pub fn convert_bio_to_stanford(
    bio_path: &Path,
    out_path: &Path,
    other_label: &str,
) -> Result<usize, LcError> {
    let entries = read_bio_gazetteer(bio_path, other_label)?;
    write_stanford_gazetteer(&entries, out_path)?;
    Ok(entries.len())
}
