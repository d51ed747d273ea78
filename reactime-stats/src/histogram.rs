//! Null-Distribution Histogram
//!
//! Equal-width binning of the permuted differences with the observed
//! difference marked, enough to redraw the permutation plot elsewhere.

use thiserror::Error;

/// Binned null distribution
#[derive(Debug, Clone, PartialEq)]
pub struct NullHistogram {
    /// Left edge of the first bin
    pub lower: f64,
    /// Right edge of the last bin
    pub upper: f64,
    /// Width shared by every bin
    pub bin_width: f64,
    /// Values per bin; the last bin is closed on the right
    pub counts: Vec<usize>,
    /// Observed difference to mark on the plot
    pub observed: f64,
    /// Bin holding the observed difference, if it lies inside the range
    pub observed_bin: Option<usize>,
}

impl NullHistogram {
    /// Left and right edge of bin `index`
    pub fn bin_edges(&self, index: usize) -> (f64, f64) {
        let left = self.lower + index as f64 * self.bin_width;
        (left, left + self.bin_width)
    }

    /// Total number of binned values
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Errors from histogram construction
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistogramError {
    #[error("Histogram needs at least one bin")]
    ZeroBins,
    #[error("No finite values to bin")]
    Empty,
}

/// Bin `values` into `bins` equal-width bins spanning their range.
///
/// Non-finite values are skipped. When every value is equal the range is
/// widened by 0.5 on each side so the bins keep a positive width.
pub fn compute_histogram(
    values: &[f64],
    bins: usize,
    observed: f64,
) -> Result<NullHistogram, HistogramError> {
    if bins == 0 {
        return Err(HistogramError::ZeroBins);
    }

    let finite = || values.iter().copied().filter(|v| v.is_finite());
    let (mut lower, mut upper) = finite().fold((f64::INFINITY, f64::NEG_INFINITY), |acc, v| {
        (acc.0.min(v), acc.1.max(v))
    });
    if lower > upper {
        return Err(HistogramError::Empty);
    }
    if lower == upper {
        lower -= 0.5;
        upper += 0.5;
    }

    let bin_width = (upper - lower) / bins as f64;
    let bin_of = |v: f64| (((v - lower) / bin_width).floor() as usize).min(bins - 1);

    let mut counts = vec![0; bins];
    for v in finite() {
        counts[bin_of(v)] += 1;
    }

    let observed_bin = (observed >= lower && observed <= upper).then(|| bin_of(observed));

    Ok(NullHistogram {
        lower,
        upper,
        bin_width,
        counts,
        observed,
        observed_bin,
    })
}
