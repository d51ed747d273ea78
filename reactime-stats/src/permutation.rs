//! Permutation Test
//!
//! Two-sample test of the difference in means. The pooled observations are
//! reshuffled between the two groups to build the null distribution, keeping
//! both group sizes fixed in every draw (resampling WITHOUT replacement).
//!
//! The p-value is two-sided: the one-sided tail fraction in the direction of the
//! observed difference, doubled and clamped to 1.0.

use crate::histogram::{HistogramError, NullHistogram, compute_histogram};
use crate::{
    DEFAULT_PERMUTATION_ITERATIONS, DEFAULT_SIGNIFICANCE_THRESHOLD, PERMUTATION_CHUNK_SIZE,
};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng, thread_rng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, trace};

/// Permutation test configuration
#[derive(Debug, Clone)]
pub struct PermutationConfig {
    /// Number of permutations drawn (default: 10,000)
    pub iterations: usize,
    /// Significance threshold alpha (default: 0.05)
    pub significance_threshold: f64,
    /// Whether to draw permutation chunks in parallel
    pub parallel: bool,
    /// Master seed; a fresh one is drawn (and recorded) when `None`
    pub seed: Option<u64>,
}

impl Default for PermutationConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_PERMUTATION_ITERATIONS,
            significance_threshold: DEFAULT_SIGNIFICANCE_THRESHOLD,
            parallel: true,
            seed: None,
        }
    }
}

impl PermutationConfig {
    /// Check iteration count and significance threshold
    pub fn validate(&self) -> Result<(), PermutationError> {
        if self.iterations == 0 {
            return Err(PermutationError::InvalidConfiguration(
                "iterations must be at least 1".to_string(),
            ));
        }
        let alpha = self.significance_threshold;
        // Written this way so NaN is rejected too
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(PermutationError::InvalidConfiguration(format!(
                "significance threshold {} must be strictly between 0 and 1",
                alpha
            )));
        }
        Ok(())
    }
}

/// Which of the two samples an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleLabel {
    /// First sample (`sample_a`)
    A,
    /// Second sample (`sample_b`)
    B,
}

impl std::fmt::Display for SampleLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleLabel::A => write!(f, "A"),
            SampleLabel::B => write!(f, "B"),
        }
    }
}

/// Errors from the permutation test
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PermutationError {
    /// A sample is empty, so its mean is undefined
    #[error("Sample {0} is empty")]
    InsufficientData(SampleLabel),

    /// A sample contains NaN or an infinity
    #[error("Sample {sample} has a non-finite value at index {index}")]
    NonFiniteValue {
        /// Offending sample
        sample: SampleLabel,
        /// Position of the first non-finite value
        index: usize,
    },

    /// Iteration count or significance threshold out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The run was cancelled before all permutations were drawn
    #[error("Cancelled after {completed} of {requested} permutations")]
    Incomplete {
        /// Permutations finished before cancellation was observed
        completed: usize,
        /// Permutations requested by the configuration
        requested: usize,
    },
}

/// Cooperative cancellation flag shared with a running test.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// New token in the "not cancelled" state
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Result of a permutation test
#[derive(Debug, Clone, PartialEq)]
pub struct PermutationResult {
    /// Mean of sample A
    pub mean_a: f64,
    /// Mean of sample B
    pub mean_b: f64,
    /// Size of sample A
    pub n_a: usize,
    /// Size of sample B
    pub n_b: usize,
    /// `mean_b - mean_a`
    pub observed_difference: f64,
    /// Number of permutations drawn
    pub iterations: usize,
    /// Two-sided p-value in [0, 1]
    pub p_value: f64,
    /// Threshold the p-value was compared against
    pub significance_threshold: f64,
    /// `p_value < significance_threshold`
    pub is_significant: bool,
    /// Permuted differences at least as extreme as the observed one
    pub extreme_count: usize,
    /// Every permuted difference, in draw order
    pub null_distribution: Vec<f64>,
    /// Master seed of the run (`None` when an external generator was injected)
    pub seed: Option<u64>,
}

impl PermutationResult {
    /// Tail fraction before doubling
    pub fn one_sided_p_value(&self) -> f64 {
        self.extreme_count as f64 / self.iterations as f64
    }

    /// Bin the null distribution, marking the observed difference
    pub fn null_histogram(&self, bins: usize) -> Result<NullHistogram, HistogramError> {
        compute_histogram(&self.null_distribution, bins, self.observed_difference)
    }
}

/// Run the permutation test with the configured (or a fresh) seed.
///
/// Tie rule: when the observed difference is exactly zero the upper tail
/// (`>=`) is counted, whichever sample is passed first.
pub fn run_test(
    sample_a: &[f64],
    sample_b: &[f64],
    config: &PermutationConfig,
) -> Result<PermutationResult, PermutationError> {
    run_test_cancellable(sample_a, sample_b, config, &CancellationToken::new())
}

/// Run the permutation test, stopping early if `cancel` fires.
///
/// A cancelled run returns [`PermutationError::Incomplete`]; no partial
/// p-value is reported.
pub fn run_test_cancellable(
    sample_a: &[f64],
    sample_b: &[f64],
    config: &PermutationConfig,
    cancel: &CancellationToken,
) -> Result<PermutationResult, PermutationError> {
    let observed = Observed::prepare(sample_a, sample_b, config)?;
    let seed = config.seed.unwrap_or_else(|| thread_rng().next_u64());
    let chunks = config.iterations.div_ceil(PERMUTATION_CHUNK_SIZE);

    debug!(
        n_a = observed.n_a,
        n_b = observed.n_b,
        iterations = config.iterations,
        seed,
        chunks,
        parallel = config.parallel,
        "running permutation test"
    );

    let run_chunk = |chunk: usize| {
        let start = chunk * PERMUTATION_CHUNK_SIZE;
        let len = PERMUTATION_CHUNK_SIZE.min(config.iterations - start);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(chunk as u64);
        permuted_differences(&observed.pooled, observed.n_a, len, &mut rng, cancel)
    };

    let per_chunk: Vec<Vec<f64>> = if config.parallel {
        (0..chunks).into_par_iter().map(run_chunk).collect()
    } else {
        (0..chunks).map(run_chunk).collect()
    };
    let null_distribution: Vec<f64> = per_chunk.into_iter().flatten().collect();

    if null_distribution.len() < config.iterations {
        debug!(
            completed = null_distribution.len(),
            requested = config.iterations,
            "permutation test cancelled"
        );
        return Err(PermutationError::Incomplete {
            completed: null_distribution.len(),
            requested: config.iterations,
        });
    }

    Ok(observed.finish(config, null_distribution, Some(seed)))
}

/// Run the permutation test serially on a caller-supplied generator.
///
/// `config.seed` and `config.parallel` are ignored; every permutation is drawn
/// from `rng` in order.
pub fn run_test_with_rng<R: Rng + ?Sized>(
    sample_a: &[f64],
    sample_b: &[f64],
    config: &PermutationConfig,
    rng: &mut R,
) -> Result<PermutationResult, PermutationError> {
    let observed = Observed::prepare(sample_a, sample_b, config)?;
    let null_distribution = permuted_differences(
        &observed.pooled,
        observed.n_a,
        config.iterations,
        rng,
        &CancellationToken::new(),
    );
    Ok(observed.finish(config, null_distribution, None))
}

/// Validated inputs plus the observed statistic
struct Observed {
    mean_a: f64,
    mean_b: f64,
    n_a: usize,
    n_b: usize,
    pooled: Vec<f64>,
}

impl Observed {
    fn prepare(
        sample_a: &[f64],
        sample_b: &[f64],
        config: &PermutationConfig,
    ) -> Result<Self, PermutationError> {
        config.validate()?;
        check_sample(sample_a, SampleLabel::A)?;
        check_sample(sample_b, SampleLabel::B)?;

        let mut pooled = Vec::with_capacity(sample_a.len() + sample_b.len());
        pooled.extend_from_slice(sample_a);
        pooled.extend_from_slice(sample_b);

        Ok(Self {
            mean_a: mean(sample_a),
            mean_b: mean(sample_b),
            n_a: sample_a.len(),
            n_b: sample_b.len(),
            pooled,
        })
    }

    fn finish(
        self,
        config: &PermutationConfig,
        null_distribution: Vec<f64>,
        seed: Option<u64>,
    ) -> PermutationResult {
        let observed_difference = self.mean_b - self.mean_a;
        let extreme_count = count_extreme(&null_distribution, observed_difference);
        let iterations = null_distribution.len();

        let one_sided = extreme_count as f64 / iterations as f64;
        let p_value = (2.0 * one_sided).min(1.0);
        let is_significant = p_value < config.significance_threshold;

        trace!(extreme_count, one_sided, p_value, "permutation test finished");

        PermutationResult {
            mean_a: self.mean_a,
            mean_b: self.mean_b,
            n_a: self.n_a,
            n_b: self.n_b,
            observed_difference,
            iterations,
            p_value,
            significance_threshold: config.significance_threshold,
            is_significant,
            extreme_count,
            null_distribution,
            seed,
        }
    }
}

fn check_sample(sample: &[f64], label: SampleLabel) -> Result<(), PermutationError> {
    if sample.is_empty() {
        return Err(PermutationError::InsufficientData(label));
    }
    if let Some(index) = sample.iter().position(|x| !x.is_finite()) {
        return Err(PermutationError::NonFiniteValue {
            sample: label,
            index,
        });
    }
    Ok(())
}

/// Draw `count` permutations of `pooled` and record `mean(tail) - mean(head)`
/// with the head holding the first `n_a` values.
fn permuted_differences<R: Rng + ?Sized>(
    pooled: &[f64],
    n_a: usize,
    count: usize,
    rng: &mut R,
    cancel: &CancellationToken,
) -> Vec<f64> {
    let mut shuffled = pooled.to_vec();
    let mut diffs = Vec::with_capacity(count);
    for _ in 0..count {
        if cancel.is_cancelled() {
            break;
        }
        shuffled.shuffle(&mut *rng);
        let (first, second) = shuffled.split_at(n_a);
        diffs.push(mean(second) - mean(first));
    }
    diffs
}

/// Count differences at least as extreme as `observed`, in its direction
fn count_extreme(null_distribution: &[f64], observed: f64) -> usize {
    if observed >= 0.0 {
        null_distribution.iter().filter(|&&d| d >= observed).count()
    } else {
        null_distribution.iter().filter(|&&d| d <= observed).count()
    }
}

fn mean(samples: &[f64]) -> f64 {
    samples.iter().sum::<f64>() / samples.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_distr::{Distribution, Normal};

    fn seeded(iterations: usize, seed: u64) -> PermutationConfig {
        PermutationConfig {
            iterations,
            seed: Some(seed),
            ..Default::default()
        }
    }

    fn draw(rng: &mut ChaCha8Rng, mean: f64, std_dev: f64, n: usize) -> Vec<f64> {
        let normal = Normal::new(mean, std_dev).unwrap();
        (0..n).map(|_| normal.sample(rng)).collect()
    }

    #[test]
    fn test_default_config() {
        let config = PermutationConfig::default();
        assert_eq!(config.iterations, 10_000);
        assert!((config.significance_threshold - 0.05).abs() < f64::EPSILON);
        assert!(config.parallel);
        assert!(config.seed.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_concrete_scenario() {
        let a = vec![100.0, 110.0, 120.0, 130.0, 140.0];
        let b = vec![200.0, 210.0, 220.0, 230.0, 240.0];

        let result = run_test(&a, &b, &seeded(10_000, 42)).unwrap();

        assert_eq!(result.mean_a, 120.0);
        assert_eq!(result.mean_b, 220.0);
        assert_eq!(result.n_a, 5);
        assert_eq!(result.n_b, 5);
        assert_eq!(result.observed_difference, 100.0);
        assert_eq!(result.iterations, 10_000);
        // Only the original split (1 of 252) reaches +100
        assert!(result.p_value < 0.02, "p = {}", result.p_value);
        assert!(result.is_significant);
    }

    #[test]
    fn test_result_invariants() {
        let a = vec![310.0, 295.0, 402.0, 350.0];
        let b = vec![330.0, 298.0, 415.0, 362.0, 371.0, 344.0];

        let result = run_test(&a, &b, &seeded(3_000, 9)).unwrap();

        assert_eq!(result.n_a, a.len());
        assert_eq!(result.n_b, b.len());
        assert_eq!(result.null_distribution.len(), 3_000);
        assert!((0.0..=1.0).contains(&result.p_value));
        assert!(result.extreme_count <= result.iterations);
        assert_eq!(
            result.is_significant,
            result.p_value < result.significance_threshold
        );
        assert_eq!(result.seed, Some(9));
    }

    #[test]
    fn test_deterministic_with_seed() {
        let a = vec![250.0, 270.0, 262.0, 281.0, 240.0];
        let b = vec![266.0, 290.0, 301.0, 255.0];

        let first = run_test(&a, &b, &seeded(5_000, 1234)).unwrap();
        let second = run_test(&a, &b, &seeded(5_000, 1234)).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_parallel_matches_serial() {
        let a = vec![250.0, 270.0, 262.0, 281.0, 240.0, 233.0];
        let b = vec![266.0, 290.0, 301.0, 255.0, 279.0];

        let parallel = run_test(&a, &b, &seeded(5_000, 77)).unwrap();
        let serial = run_test(
            &a,
            &b,
            &PermutationConfig {
                parallel: false,
                ..seeded(5_000, 77)
            },
        )
        .unwrap();

        assert_eq!(parallel, serial);
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = vec![250.0, 270.0, 262.0, 281.0, 240.0];
        let b = vec![266.0, 290.0, 301.0, 255.0];

        let first = run_test(&a, &b, &seeded(2_000, 1)).unwrap();
        let second = run_test(&a, &b, &seeded(2_000, 2)).unwrap();

        assert_ne!(first.null_distribution, second.null_distribution);
    }

    #[test]
    fn test_unseeded_run_records_seed() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![4.0, 5.0, 6.0];

        let config = PermutationConfig {
            iterations: 100,
            ..Default::default()
        };
        let first = run_test(&a, &b, &config).unwrap();
        let seed = first.seed.expect("seed recorded");

        let replay = run_test(&a, &b, &seeded(100, seed)).unwrap();
        assert_eq!(first.null_distribution, replay.null_distribution);
        assert_eq!(first.p_value, replay.p_value);
    }

    #[test]
    fn test_injected_rng_is_deterministic() {
        let a = vec![250.0, 270.0, 262.0];
        let b = vec![266.0, 290.0, 301.0, 255.0];
        let config = PermutationConfig {
            iterations: 500,
            ..Default::default()
        };

        let first = run_test_with_rng(&a, &b, &config, &mut ChaCha8Rng::seed_from_u64(5)).unwrap();
        let second =
            run_test_with_rng(&a, &b, &config, &mut ChaCha8Rng::seed_from_u64(5)).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.seed, None);
        assert_eq!(first.null_distribution.len(), 500);
    }

    #[test]
    fn test_swapping_samples_negates_difference() {
        let a = vec![300.0, 320.0, 310.0, 335.0, 305.0, 298.0];
        let b = vec![330.0, 345.0, 318.0, 350.0, 327.0, 341.0];

        let ab = run_test(&a, &b, &seeded(10_000, 3)).unwrap();
        let ba = run_test(&b, &a, &seeded(10_000, 3)).unwrap();

        assert_eq!(ab.observed_difference, -ba.observed_difference);
        assert_eq!(ab.mean_a, ba.mean_b);
        // Two-sided doubling makes the p-value orientation-free up to noise
        assert!(
            (ab.p_value - ba.p_value).abs() < 0.05,
            "{} vs {}",
            ab.p_value,
            ba.p_value
        );
    }

    #[test]
    fn test_zero_difference_counts_upper_tail() {
        let a = vec![5.0, 5.0, 5.0];
        let b = vec![5.0, 5.0, 5.0];

        let ab = run_test(&a, &b, &seeded(200, 8)).unwrap();
        let ba = run_test(&b, &a, &seeded(200, 8)).unwrap();

        // Every permuted difference ties at 0 and counts as extreme
        assert_eq!(ab.observed_difference, 0.0);
        assert_eq!(ab.extreme_count, 200);
        assert_eq!(ab.p_value, 1.0);
        assert!(!ab.is_significant);
        assert_eq!(ab.p_value, ba.p_value);
    }

    #[test]
    fn test_p_value_clamped_to_one() {
        let a = vec![1.0, 2.0, 3.0, 4.0];
        let b = vec![4.0, 3.0, 2.0, 1.0];

        let result = run_test(&a, &b, &seeded(1_000, 21)).unwrap();

        assert!(result.one_sided_p_value() > 0.5);
        assert_eq!(result.p_value, 1.0);
    }

    #[test]
    fn test_single_iteration_resolution() {
        let a = vec![100.0, 110.0, 120.0];
        let b = vec![115.0, 125.0, 105.0];

        for seed in 0..20 {
            let result = run_test(&a, &b, &seeded(1, seed)).unwrap();
            assert!(
                result.p_value == 0.0 || result.p_value == 1.0,
                "p = {}",
                result.p_value
            );
        }
    }

    #[test]
    fn test_hundred_iteration_granularity() {
        let a = vec![100.0, 110.0, 120.0, 130.0];
        let b = vec![105.0, 125.0, 118.0, 140.0];

        let result = run_test(&a, &b, &seeded(100, 13)).unwrap();
        let scaled = result.one_sided_p_value() * 100.0;

        assert!((scaled - scaled.round()).abs() < 1e-9);
        assert!((result.p_value - (2.0 * result.one_sided_p_value()).min(1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_power_large_shift() {
        let mut rng = ChaCha8Rng::seed_from_u64(2025);
        let a = draw(&mut rng, 400.0, 80.0, 30);
        let b = draw(&mut rng, 900.0, 80.0, 30);

        let result = run_test(&a, &b, &seeded(10_000, 4)).unwrap();

        assert!(result.observed_difference > 400.0);
        assert!(result.p_value < 0.001);
        assert!(result.is_significant);
    }

    #[test]
    fn test_null_case_calibration() {
        let mut rng = ChaCha8Rng::seed_from_u64(31);
        let runs = 300;
        let mut below_alpha = 0;
        let mut p_sum = 0.0;

        for run in 0..runs {
            let a = draw(&mut rng, 450.0, 60.0, 15);
            let b = draw(&mut rng, 450.0, 60.0, 15);
            let config = PermutationConfig {
                parallel: false,
                ..seeded(500, run)
            };
            let result = run_test(&a, &b, &config).unwrap();
            if result.is_significant {
                below_alpha += 1;
            }
            p_sum += result.p_value;
        }

        let rejection_rate = below_alpha as f64 / runs as f64;
        let mean_p = p_sum / runs as f64;
        assert!(
            rejection_rate > 0.01 && rejection_rate < 0.12,
            "rejection rate {}",
            rejection_rate
        );
        assert!((mean_p - 0.5).abs() < 0.1, "mean p {}", mean_p);
    }

    #[test]
    fn test_empty_samples() {
        let config = PermutationConfig::default();

        assert_eq!(
            run_test(&[], &[1.0, 2.0, 3.0], &config),
            Err(PermutationError::InsufficientData(SampleLabel::A))
        );
        assert_eq!(
            run_test(&[1.0, 2.0, 3.0], &[], &config),
            Err(PermutationError::InsufficientData(SampleLabel::B))
        );
    }

    #[test]
    fn test_single_value_samples() {
        let result = run_test(&[100.0], &[300.0], &seeded(1_000, 6)).unwrap();

        assert_eq!(result.observed_difference, 200.0);
        // Two equally likely splits: +200 and -200
        assert!(result.p_value > 0.8);
    }

    #[test]
    fn test_non_finite_values() {
        let config = PermutationConfig::default();

        assert_eq!(
            run_test(&[1.0, f64::NAN], &[2.0], &config),
            Err(PermutationError::NonFiniteValue {
                sample: SampleLabel::A,
                index: 1
            })
        );
        assert_eq!(
            run_test(&[1.0], &[f64::INFINITY], &config),
            Err(PermutationError::NonFiniteValue {
                sample: SampleLabel::B,
                index: 0
            })
        );
    }

    #[test]
    fn test_invalid_configuration() {
        let a = [1.0, 2.0];
        let b = [3.0, 4.0];

        let zero_iterations = PermutationConfig {
            iterations: 0,
            ..Default::default()
        };
        assert!(matches!(
            run_test(&a, &b, &zero_iterations),
            Err(PermutationError::InvalidConfiguration(_))
        ));

        for alpha in [0.0, 1.0, -0.1, 1.5, f64::NAN] {
            let config = PermutationConfig {
                significance_threshold: alpha,
                ..Default::default()
            };
            assert!(
                matches!(
                    run_test(&a, &b, &config),
                    Err(PermutationError::InvalidConfiguration(_))
                ),
                "alpha {} accepted",
                alpha
            );
        }
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();

        let result = run_test_cancellable(&[1.0, 2.0], &[3.0, 4.0], &seeded(5_000, 1), &token);

        assert_eq!(
            result,
            Err(PermutationError::Incomplete {
                completed: 0,
                requested: 5_000
            })
        );
    }

    #[test]
    fn test_uncancelled_token_completes() {
        let token = CancellationToken::new();
        let result =
            run_test_cancellable(&[1.0, 2.0], &[3.0, 4.0], &seeded(2_500, 1), &token).unwrap();

        assert!(!token.is_cancelled());
        assert_eq!(result.iterations, 2_500);
    }

    #[test]
    fn test_null_histogram_from_result() {
        let a = vec![100.0, 110.0, 120.0, 130.0, 140.0];
        let b = vec![200.0, 210.0, 220.0, 230.0, 240.0];
        let result = run_test(&a, &b, &seeded(1_000, 2)).unwrap();

        let histogram = result.null_histogram(50).unwrap();

        assert_eq!(histogram.counts.len(), 50);
        assert_eq!(histogram.counts.iter().sum::<usize>(), 1_000);
        assert_eq!(histogram.observed, 100.0);
    }

    #[test]
    fn test_count_extreme_direction() {
        let null = vec![-3.0, -1.0, 0.0, 1.0, 3.0];

        assert_eq!(count_extreme(&null, 1.0), 2);
        assert_eq!(count_extreme(&null, -1.0), 2);
        assert_eq!(count_extreme(&null, 0.0), 3);
        assert_eq!(count_extreme(&null, 5.0), 0);
    }
}
