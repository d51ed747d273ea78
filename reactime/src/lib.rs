#![warn(missing_docs)]
//! # Reactime
//!
//! Analysis toolkit for reaction-time experiments (simple reaction time,
//! binary-stimulus discrimination, food-image recognition).
//!
//! - **Permutation Test**: two-sample difference in means with a two-sided
//!   empirical p-value, resampling group labels without replacement
//! - **Reproducible Randomness**: seeded, chunked ChaCha streams; serial and
//!   parallel runs agree bit for bit
//! - **Null Histogram**: binned permutation differences with the observed value marked
//! - **Descriptive Summaries**: mean, median, spread and percentiles per condition
//!
//! ## Quick Start
//!
//! ```
//! use reactime::{PermutationConfig, run_test};
//!
//! let binary = [100.0, 110.0, 120.0, 130.0, 140.0];
//! let food = [200.0, 210.0, 220.0, 230.0, 240.0];
//! let config = PermutationConfig {
//!     seed: Some(42),
//!     ..Default::default()
//! };
//!
//! let result = run_test(&binary, &food, &config).unwrap();
//! assert_eq!(result.observed_difference, 100.0);
//! assert!(result.is_significant);
//! ```

// Re-export stats
pub use reactime_stats::{
    CancellationToken, DEFAULT_HISTOGRAM_BINS, DEFAULT_PERMUTATION_ITERATIONS,
    DEFAULT_SIGNIFICANCE_THRESHOLD, HistogramError, NullHistogram, PERMUTATION_CHUNK_SIZE,
    Percentiles, PermutationConfig, PermutationError, PermutationResult, SampleLabel,
    SummaryStatistics, compute_histogram, compute_percentile, compute_percentiles,
    compute_summary, run_test, run_test_cancellable, run_test_with_rng,
};

// Re-export CLI pieces useful to embedders
pub use reactime_cli::{
    LoadedSample, OutputFormat, ReactimeConfig, TestReport, generate_json_report, load_sample,
    parse_sample,
};

/// Run the Reactime CLI harness.
///
/// ```ignore
/// fn main() {
///     reactime::run().unwrap();
/// }
/// ```
pub use reactime_cli::run;
