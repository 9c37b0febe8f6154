use lc_core::errors::{ErrorInfo, LcError};
use serde::{Deserialize, Serialize};

/// Increasing training-prefix sizes for one learning curve.
///
/// With `incr = n_train / n_folds` (integer division) the fold starts are
/// `0, incr, 2*incr, ..` while `< n_train`, and fold `j` covers the first
/// `start_j + incr` instances. When `incr` does not divide `n_train` the
/// last fold overshoots the budget (`n_train = 95, n_folds = 10` ends at 99)
/// rather than being clamped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldPlan {
    n_train: usize,
    incr: usize,
    starts: Vec<usize>,
}

impl FoldPlan {
    /// Plans folds for a training budget split into `n_folds` increments.
    pub fn new(n_train: usize, n_folds: usize) -> Result<Self, LcError> {
        if n_folds == 0 {
            return Err(LcError::Config(
                ErrorInfo::new("fold-count-zero", "fold count must be at least 1")
                    .with_context("n_train_fold", "0"),
            ));
        }
        let incr = n_train / n_folds;
        if incr == 0 {
            return Err(LcError::Config(
                ErrorInfo::new("fold-increment-zero", "training budget smaller than fold count")
                    .with_context("n_train", n_train.to_string())
                    .with_context("n_train_fold", n_folds.to_string())
                    .with_hint("raise --n-train or lower --n-train-fold"),
            ));
        }
        let starts = (0..n_train).step_by(incr).collect();
        Ok(Self {
            n_train,
            incr,
            starts,
        })
    }

    /// Training budget the plan was built for.
    pub fn n_train(&self) -> usize {
        self.n_train
    }

    /// Size step between consecutive folds.
    pub fn incr(&self) -> usize {
        self.incr
    }

    /// Start offsets of each fold.
    pub fn starts(&self) -> &[usize] {
        &self.starts
    }

    /// Number of folds, `ceil(n_train / incr)`.
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    /// Whether the plan holds no folds.
    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    /// Planned prefix size of every fold, in increasing order.
    pub fn sizes(&self) -> Vec<usize> {
        self.starts.iter().map(|start| start + self.incr).collect()
    }

    /// Prefix sizes as materialized against a corpus of `corpus_len` instances.
    pub fn materialized_sizes(&self, corpus_len: usize) -> Vec<usize> {
        self.sizes()
            .into_iter()
            .map(|size| size.min(corpus_len))
            .collect()
    }

    /// Largest planned prefix size.
    pub fn max_size(&self) -> usize {
        self.starts.last().map(|start| start + self.incr).unwrap_or(0)
    }

    /// Total number of (fold, replication) cells.
    pub fn total_cells(&self, replications: usize) -> usize {
        self.len() * replications
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_budget_yields_even_folds() {
        let plan = FoldPlan::new(100, 10).expect("plan");
        assert_eq!(plan.incr(), 10);
        assert_eq!(plan.sizes(), (1..=10).map(|i| i * 10).collect::<Vec<_>>());
        assert_eq!(plan.total_cells(5), 50);
    }

    #[test]
    fn uneven_budget_overshoots_last_fold() {
        let plan = FoldPlan::new(95, 10).expect("plan");
        assert_eq!(plan.incr(), 9);
        assert_eq!(plan.len(), 11);
        assert_eq!(plan.sizes(), (1..=11).map(|i| i * 9).collect::<Vec<_>>());
        assert_eq!(plan.max_size(), 99);
        assert_eq!(*plan.materialized_sizes(97).last().unwrap(), 97);
    }

    #[test]
    fn zero_increment_is_a_config_error() {
        let err = FoldPlan::new(5, 10).expect_err("incr zero");
        assert_eq!(err.info().code, "fold-increment-zero");
        let err = FoldPlan::new(5, 0).expect_err("no folds");
        assert_eq!(err.info().code, "fold-count-zero");
    }
}
