use serde::{Deserialize, Serialize};

use crate::report::ScoreRow;

/// Two-sided 95% Student-t critical values for 1..=30 degrees of freedom.
const T_95: [f64; 30] = [
    12.706, 4.303, 3.182, 2.776, 2.571, 2.447, 2.365, 2.306, 2.262, 2.228, 2.201, 2.179, 2.160,
    2.145, 2.131, 2.120, 2.110, 2.101, 2.093, 2.086, 2.080, 2.074, 2.069, 2.064, 2.060, 2.056,
    2.052, 2.048, 2.045, 2.042,
];

const Z_95: f64 = 1.96;

/// Descriptive statistics of one fold across replications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldSummary {
    /// Fold size.
    pub size: usize,
    /// Number of replications.
    pub n: usize,
    /// Sample mean.
    pub mean: f64,
    /// Sample standard deviation (`n - 1` denominator); 0 for a single sample.
    pub std_dev: f64,
    /// Half-width of the 95% confidence interval of the mean.
    pub ci95: f64,
}

/// Critical value for a two-sided 95% interval with `df` degrees of freedom.
pub fn t_critical_95(df: usize) -> f64 {
    match df {
        0 => f64::INFINITY,
        1..=30 => T_95[df - 1],
        _ => Z_95,
    }
}

/// Summarizes the scores of one row.
pub fn summarize_row(row: &ScoreRow) -> FoldSummary {
    let n = row.scores.len();
    if n == 0 {
        return FoldSummary {
            size: row.size,
            n,
            mean: f64::NAN,
            std_dev: f64::NAN,
            ci95: f64::NAN,
        };
    }
    let mean = row.scores.iter().sum::<f64>() / n as f64;
    if n == 1 {
        return FoldSummary {
            size: row.size,
            n,
            mean,
            std_dev: 0.0,
            ci95: 0.0,
        };
    }
    let var = row.scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let std_dev = var.sqrt();
    FoldSummary {
        size: row.size,
        n,
        mean,
        std_dev,
        ci95: t_critical_95(n - 1) * std_dev / (n as f64).sqrt(),
    }
}

/// Summarizes every row of a table in order.
pub fn summarize_rows(rows: &[ScoreRow]) -> Vec<FoldSummary> {
    rows.iter().map(summarize_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(scores: &[f64]) -> ScoreRow {
        ScoreRow {
            size: 10,
            scores: scores.to_vec(),
        }
    }

    #[test]
    fn summary_matches_hand_computation() {
        let summary = summarize_row(&row(&[2.0, 4.0, 6.0]));
        assert_eq!(summary.n, 3);
        assert!((summary.mean - 4.0).abs() < 1e-12);
        assert!((summary.std_dev - 2.0).abs() < 1e-12);
        let expected = 4.303 * 2.0 / 3f64.sqrt();
        assert!((summary.ci95 - expected).abs() < 1e-12);
    }

    #[test]
    fn single_sample_has_zero_spread() {
        let summary = summarize_row(&row(&[71.0]));
        assert_eq!((summary.mean, summary.std_dev, summary.ci95), (71.0, 0.0, 0.0));
    }

    #[test]
    fn large_samples_use_normal_quantile() {
        assert_eq!(t_critical_95(1), 12.706);
        assert_eq!(t_critical_95(30), 2.042);
        assert_eq!(t_critical_95(31), 1.96);
    }
}
