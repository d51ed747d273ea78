//! Report Data Structures
//!
//! Machine-readable record of one permutation test, serialized as JSON.

use chrono::{DateTime, Utc};
use reactime_stats::{
    NullHistogram, Percentiles, PermutationConfig, PermutationResult, SummaryStatistics,
};
use serde::{Deserialize, Serialize};

/// Report schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Compact single-line JSON
    Json,
    /// Indented JSON
    Pretty,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "pretty" | "json-pretty" => Ok(OutputFormat::Pretty),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}

/// Complete test report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    pub meta: ReportMeta,
    pub labels: SampleLabels,
    pub summary_a: SummaryReport,
    pub summary_b: SummaryReport,
    pub result: ResultReport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub histogram: Option<HistogramReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub null_distribution: Option<Vec<f64>>,
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    pub schema_version: u32,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub config: ReportConfig,
}

/// Test configuration captured in report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub iterations: usize,
    pub significance_threshold: f64,
    pub parallel: bool,
    pub seed: Option<u64>,
}

impl From<&PermutationConfig> for ReportConfig {
    fn from(config: &PermutationConfig) -> Self {
        Self {
            iterations: config.iterations,
            significance_threshold: config.significance_threshold,
            parallel: config.parallel,
            seed: config.seed,
        }
    }
}

/// Names of the two compared conditions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleLabels {
    pub a: String,
    pub b: String,
}

/// Descriptive statistics of one sample, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryReport {
    pub count: usize,
    pub missing: usize,
    pub mean_ms: f64,
    pub median_ms: f64,
    pub std_dev_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p25_ms: f64,
    pub p75_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
}

impl SummaryReport {
    /// Build from summary statistics plus the loader's missing count
    pub fn new(stats: &SummaryStatistics, missing: usize) -> Self {
        let Percentiles {
            p25, p75, p90, p95, ..
        } = stats.percentiles;
        Self {
            count: stats.count,
            missing,
            mean_ms: stats.mean,
            median_ms: stats.median,
            std_dev_ms: stats.std_dev,
            min_ms: stats.min,
            max_ms: stats.max,
            p25_ms: p25,
            p75_ms: p75,
            p90_ms: p90,
            p95_ms: p95,
        }
    }
}

/// Permutation test outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultReport {
    pub mean_a: f64,
    pub mean_b: f64,
    pub n_a: usize,
    pub n_b: usize,
    pub observed_difference: f64,
    pub iterations: usize,
    pub p_value: f64,
    pub significance_threshold: f64,
    pub is_significant: bool,
    pub extreme_count: usize,
    pub seed: Option<u64>,
}

impl From<&PermutationResult> for ResultReport {
    fn from(result: &PermutationResult) -> Self {
        Self {
            mean_a: result.mean_a,
            mean_b: result.mean_b,
            n_a: result.n_a,
            n_b: result.n_b,
            observed_difference: result.observed_difference,
            iterations: result.iterations,
            p_value: result.p_value,
            significance_threshold: result.significance_threshold,
            is_significant: result.is_significant,
            extreme_count: result.extreme_count,
            seed: result.seed,
        }
    }
}

/// Null-distribution histogram
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramReport {
    pub lower: f64,
    pub upper: f64,
    pub bin_width: f64,
    pub counts: Vec<usize>,
    pub observed: f64,
    pub observed_bin: Option<usize>,
}

impl From<NullHistogram> for HistogramReport {
    fn from(histogram: NullHistogram) -> Self {
        Self {
            lower: histogram.lower,
            upper: histogram.upper,
            bin_width: histogram.bin_width,
            counts: histogram.counts,
            observed: histogram.observed,
            observed_bin: histogram.observed_bin,
        }
    }
}

/// Serialize a report in the requested format
pub fn generate_json_report(
    report: &TestReport,
    format: OutputFormat,
) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Json => serde_json::to_string(report),
        OutputFormat::Pretty => serde_json::to_string_pretty(report),
    }
}
