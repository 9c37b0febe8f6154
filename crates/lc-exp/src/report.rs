use std::fs::File;
use std::path::Path;

use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use lc_core::errors::{ErrorInfo, LcError};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Scores indexed by (fold, replication) for one engine.
///
/// Cells start empty; the writers refuse a matrix with any cell unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreMatrix {
    sizes: Vec<usize>,
    replications: usize,
    cells: Vec<Vec<Option<f64>>>,
}

impl ScoreMatrix {
    /// Empty matrix with one row per fold size and `replications` columns.
    pub fn new(sizes: Vec<usize>, replications: usize) -> Self {
        let cells = vec![vec![None; replications]; sizes.len()];
        Self {
            sizes,
            replications,
            cells,
        }
    }

    /// Materialized fold sizes, one per row.
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Number of folds.
    pub fn n_folds(&self) -> usize {
        self.sizes.len()
    }

    /// Number of replications.
    pub fn n_replications(&self) -> usize {
        self.replications
    }

    /// Records the score of fold `fold` in replication `replication`.
    pub fn set(&mut self, fold: usize, replication: usize, score: f64) -> Result<(), LcError> {
        let cell = self
            .cells
            .get_mut(fold)
            .and_then(|row| row.get_mut(replication))
            .ok_or_else(|| {
                LcError::Config(
                    ErrorInfo::new("score-cell-out-of-range", "no such score cell")
                        .with_context("fold", fold.to_string())
                        .with_context("replication", replication.to_string()),
                )
            })?;
        *cell = Some(score);
        Ok(())
    }

    /// Scores of fold `fold` across replications; fails while any is unset.
    pub fn row(&self, fold: usize) -> Result<Vec<f64>, LcError> {
        let row = self.cells.get(fold).ok_or_else(|| incomplete(fold, None))?;
        row.iter()
            .enumerate()
            .map(|(rep, cell)| cell.ok_or_else(|| incomplete(fold, Some(rep))))
            .collect()
    }

    /// Cell-wise `self - other` over matrices of identical shape.
    pub fn delta(&self, other: &ScoreMatrix) -> Result<ScoreMatrix, LcError> {
        if self.sizes != other.sizes || self.replications != other.replications {
            return Err(LcError::Config(
                ErrorInfo::new("score-shape-mismatch", "score matrices differ in shape")
                    .with_context("left_folds", self.n_folds().to_string())
                    .with_context("right_folds", other.n_folds().to_string()),
            ));
        }
        let mut out = ScoreMatrix::new(self.sizes.clone(), self.replications);
        for fold in 0..self.n_folds() {
            let lhs = self.row(fold)?;
            let rhs = other.row(fold)?;
            for (rep, (a, b)) in lhs.iter().zip(&rhs).enumerate() {
                out.set(fold, rep, a - b)?;
            }
        }
        Ok(out)
    }

    /// Complete rows as `(fold size, scores)` pairs.
    pub fn rows(&self) -> Result<Vec<ScoreRow>, LcError> {
        self.sizes
            .iter()
            .enumerate()
            .map(|(fold, size)| {
                Ok(ScoreRow {
                    size: *size,
                    scores: self.row(fold)?,
                })
            })
            .collect()
    }
}

fn incomplete(fold: usize, replication: Option<usize>) -> LcError {
    let mut info = ErrorInfo::new("score-matrix-incomplete", "score matrix has unset cells")
        .with_context("fold", fold.to_string());
    if let Some(rep) = replication {
        info = info.with_context("replication", rep.to_string());
    }
    LcError::Config(info)
}

/// One line of a score table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRow {
    /// Fold size (x-axis value).
    pub size: usize,
    /// One score per replication.
    pub scores: Vec<f64>,
}

fn table_error(code: &str, path: &Path, err: impl ToString) -> LcError {
    LcError::Io(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

/// Writes `matrix` as space-separated lines `SIZE S_1 .. S_R`.
pub fn write_score_table(path: &Path, matrix: &ScoreMatrix) -> Result<(), LcError> {
    let rows = matrix.rows()?;
    let file = File::create(path).map_err(|err| table_error("table-create", path, err))?;
    let mut writer = WriterBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .quote_style(QuoteStyle::Never)
        .from_writer(file);
    for row in &rows {
        let mut record = Vec::with_capacity(row.scores.len() + 1);
        record.push(row.size.to_string());
        record.extend(row.scores.iter().map(|score| format!("{score:?}")));
        writer
            .write_record(&record)
            .map_err(|err| table_error("table-write", path, err))?;
    }
    writer
        .flush()
        .map_err(|err| table_error("table-flush", path, err))?;
    info!(path = %path.display(), rows = rows.len(), "wrote score table");
    Ok(())
}

/// Reads a table written by [`write_score_table`].
///
/// Rows may differ in width; blank lines are skipped.
pub fn read_score_table(path: &Path) -> Result<Vec<ScoreRow>, LcError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|err| table_error("table-open", path, err))?;
    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|err| table_error("table-read", path, err))?;
        let mut fields = record.iter().filter(|field| !field.is_empty());
        let Some(size) = fields.next() else {
            continue;
        };
        let parse_error = |field: &str| {
            LcError::Io(
                ErrorInfo::new("table-parse", format!("invalid number `{field}`"))
                    .with_context("path", path.display().to_string())
                    .with_context("line", (idx + 1).to_string()),
            )
        };
        let size = size.parse::<usize>().map_err(|_| parse_error(size))?;
        let scores = fields
            .map(|field| field.parse::<f64>().map_err(|_| parse_error(field)))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(ScoreRow { size, scores });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_and_row_track_completion() {
        let mut matrix = ScoreMatrix::new(vec![10, 20], 2);
        matrix.set(0, 0, 50.0).unwrap();
        matrix.set(0, 1, 52.5).unwrap();
        assert_eq!(matrix.row(0).unwrap(), vec![50.0, 52.5]);
        assert_eq!(matrix.row(1).unwrap_err().info().code, "score-matrix-incomplete");
        assert!(matrix.set(2, 0, 1.0).is_err());
    }

    #[test]
    fn delta_requires_same_shape() {
        let a = ScoreMatrix::new(vec![10], 1);
        let b = ScoreMatrix::new(vec![10, 20], 1);
        assert_eq!(a.delta(&b).unwrap_err().info().code, "score-shape-mismatch");
    }
}
