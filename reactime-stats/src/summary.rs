//! Summary Statistics
//!
//! Descriptive statistics reported next to each permutation test: central
//! tendency, spread and percentiles of one sample.
//!
//! Standard deviation is the population form (divides by `n`), matching the
//! per-participant tables the experiments produce.

use crate::percentiles::{Percentiles, percentile_of_sorted};

/// Descriptive statistics of one sample
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SummaryStatistics {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub percentiles: Percentiles,
}

/// Compute summary statistics; an empty sample yields all zeros
pub fn compute_summary(samples: &[f64]) -> SummaryStatistics {
    if samples.is_empty() {
        return SummaryStatistics::default();
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = sorted.len();
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let variance = sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;

    let percentiles = Percentiles {
        p25: percentile_of_sorted(&sorted, 25.0),
        p50: percentile_of_sorted(&sorted, 50.0),
        p75: percentile_of_sorted(&sorted, 75.0),
        p90: percentile_of_sorted(&sorted, 90.0),
        p95: percentile_of_sorted(&sorted, 95.0),
    };

    SummaryStatistics {
        count: n,
        mean,
        median: percentiles.p50,
        std_dev: variance.sqrt(),
        min: sorted[0],
        max: sorted[n - 1],
        percentiles,
    }
}

impl SummaryStatistics {
    /// Coefficient of variation in percent
    pub fn coefficient_of_variation(&self) -> f64 {
        if self.mean == 0.0 {
            0.0
        } else {
            (self.std_dev / self.mean) * 100.0
        }
    }

    /// Standard error of the mean
    pub fn standard_error(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.std_dev / (self.count as f64).sqrt()
        }
    }
}
