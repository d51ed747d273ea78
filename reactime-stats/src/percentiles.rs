//! Percentile Computation
//!
//! Linear interpolation between nearest ranks, the same convention the
//! experiment spreadsheets use for reaction-time quartiles.

/// Standard percentiles of a reaction-time sample
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Percentiles {
    /// 25th percentile (first quartile)
    pub p25: f64,
    /// 50th percentile (median)
    pub p50: f64,
    /// 75th percentile (third quartile)
    pub p75: f64,
    /// 90th percentile
    pub p90: f64,
    /// 95th percentile
    pub p95: f64,
}

impl Percentiles {
    /// Interquartile range
    pub fn iqr(&self) -> f64 {
        self.p75 - self.p25
    }
}

/// Compute a single percentile from samples
///
/// Uses linear interpolation between nearest ranks.
///
/// # Examples
///
/// ```
/// # use reactime_stats::compute_percentile;
/// let samples = vec![310.0, 295.0, 402.0, 350.0, 330.0];
/// assert_eq!(compute_percentile(&samples, 50.0), 330.0);
/// ```
pub fn compute_percentile(samples: &[f64], percentile: f64) -> f64 {
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    percentile_of_sorted(&sorted, percentile)
}

/// Compute all standard percentiles
pub fn compute_percentiles(samples: &[f64]) -> Percentiles {
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    Percentiles {
        p25: percentile_of_sorted(&sorted, 25.0),
        p50: percentile_of_sorted(&sorted, 50.0),
        p75: percentile_of_sorted(&sorted, 75.0),
        p90: percentile_of_sorted(&sorted, 90.0),
        p95: percentile_of_sorted(&sorted, 95.0),
    }
}

/// `sorted` must be in ascending order
pub(crate) fn percentile_of_sorted(sorted: &[f64], percentile: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (percentile / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lower_idx = rank.floor() as usize;
            let upper_idx = (lower_idx + 1).min(n - 1);
            let fraction = rank - lower_idx as f64;

            sorted[lower_idx] + fraction * (sorted[upper_idx] - sorted[lower_idx])
        }
    }
}
