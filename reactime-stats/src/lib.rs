#![warn(missing_docs)]
//! Reactime Statistical Engine
//!
//! Statistics for reaction-time experiments:
//! - Two-sample permutation test of the difference in means
//! - Reproducible random streams (seeded, chunked, parallel-safe)
//! - Null-distribution histogram for redrawing the permutation plot
//! - Descriptive summaries (mean, median, spread, percentiles)

mod histogram;
mod percentiles;
mod permutation;
mod summary;

pub use histogram::{HistogramError, NullHistogram, compute_histogram};
pub use percentiles::{Percentiles, compute_percentile, compute_percentiles};
pub use permutation::{
    CancellationToken, PermutationConfig, PermutationError, PermutationResult, SampleLabel,
    run_test, run_test_cancellable, run_test_with_rng,
};
pub use summary::{SummaryStatistics, compute_summary};

/// Default number of permutation iterations
pub const DEFAULT_PERMUTATION_ITERATIONS: usize = 10_000;

/// Default significance threshold (alpha)
pub const DEFAULT_SIGNIFICANCE_THRESHOLD: f64 = 0.05;

/// Default number of bins for the null-distribution histogram
pub const DEFAULT_HISTOGRAM_BINS: usize = 50;

/// Permutations drawn from one random stream.
///
/// Chunk `k` of a seeded run always uses stream `k`, so serial and parallel
/// runs with the same seed draw identical permutations.
pub const PERMUTATION_CHUNK_SIZE: usize = 1024;
