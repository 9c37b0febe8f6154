use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use lc_core::errors::LcError;
use tracing::debug;

use crate::instance::{Corpus, Instance, TaggedToken};

/// Reads a two-column CoNLL file into a [`Corpus`].
///
/// A line with exactly two whitespace-separated fields is a token; any other
/// line (blank, `-DOCSTART-`, extra columns) closes the current instance.
/// Empty instances are dropped and a trailing instance without a closing
/// blank line is kept.
pub fn read_conll(path: &Path) -> Result<Corpus, LcError> {
    let file = File::open(path).map_err(|err| LcError::io("corpus-open", path, err))?;
    parse_conll(BufReader::new(file)).map_err(|err| match err {
        LcError::Io(info) => LcError::Io(info.with_context("path", path.display().to_string())),
        other => other,
    })
}

/// Parses CoNLL lines from any buffered reader.
pub fn parse_conll<R: BufRead>(reader: R) -> Result<Corpus, LcError> {
    let mut instances = Vec::new();
    let mut current = Vec::new();
    let mut separators = 0usize;
    for line in reader.lines() {
        let line = line.map_err(|err| LcError::io("corpus-read", Path::new("<stream>"), err))?;
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next(), fields.next()) {
            (Some(text), Some(label), None) => current.push(TaggedToken::new(text, label)),
            _ => {
                separators += 1;
                if !current.is_empty() {
                    instances.push(Instance::new(std::mem::take(&mut current)));
                }
            }
        }
    }
    if !current.is_empty() {
        instances.push(Instance::new(current));
    }
    debug!(instances = instances.len(), separators, "parsed conll corpus");
    Ok(Corpus::new(instances))
}

/// Writes instances as `TOKEN<delim>LABEL` lines, each instance followed by a blank line.
pub fn write_instances(path: &Path, instances: &[Instance], delim: &str) -> Result<(), LcError> {
    let file = File::create(path).map_err(|err| LcError::io("instances-create", path, err))?;
    let mut out = BufWriter::new(file);
    for instance in instances {
        for token in instance.tokens() {
            writeln!(out, "{}{}{}", token.text, delim, token.label)
                .map_err(|err| LcError::io("instances-write", path, err))?;
        }
        writeln!(out).map_err(|err| LcError::io("instances-write", path, err))?;
    }
    out.flush()
        .map_err(|err| LcError::io("instances-flush", path, err))
}
