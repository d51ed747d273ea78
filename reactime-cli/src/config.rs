//! Configuration loading from reactime.toml
//!
//! Analysis defaults can be kept in a `reactime.toml` next to the data. The file
//! is discovered by walking up from the current directory; command-line flags
//! override whatever it sets.

use anyhow::Context;
use reactime_stats::{
    DEFAULT_HISTOGRAM_BINS, DEFAULT_PERMUTATION_ITERATIONS, DEFAULT_SIGNIFICANCE_THRESHOLD,
    PermutationConfig,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name looked up during discovery
pub const CONFIG_FILE_NAME: &str = "reactime.toml";

/// Reactime configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ReactimeConfig {
    /// Permutation test settings
    #[serde(default)]
    pub test: TestConfig,
    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Permutation test settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestConfig {
    /// Number of permutations
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Significance threshold (alpha)
    #[serde(default = "default_significance_threshold")]
    pub significance_threshold: f64,
    /// Draw permutations on the rayon pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    /// Fixed master seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            significance_threshold: default_significance_threshold(),
            parallel: default_parallel(),
            seed: None,
        }
    }
}

fn default_iterations() -> usize {
    DEFAULT_PERMUTATION_ITERATIONS
}
fn default_significance_threshold() -> f64 {
    DEFAULT_SIGNIFICANCE_THRESHOLD
}
fn default_parallel() -> bool {
    true
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Output format: "json" or "pretty"
    #[serde(default = "default_format")]
    pub format: String,
    /// Bins of the null-distribution histogram (0 disables it)
    #[serde(default = "default_histogram_bins")]
    pub histogram_bins: usize,
    /// Embed every permuted difference in the output
    #[serde(default)]
    pub include_null_distribution: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            histogram_bins: default_histogram_bins(),
            include_null_distribution: false,
        }
    }
}

fn default_format() -> String {
    "json".to_string()
}
fn default_histogram_bins() -> usize {
    DEFAULT_HISTOGRAM_BINS
}

impl ReactimeConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Find `reactime.toml` in `start` or any of its ancestors.
    ///
    /// A file that exists but does not parse is an error, not a miss.
    pub fn discover_from(start: impl AsRef<Path>) -> anyhow::Result<Option<(PathBuf, Self)>> {
        let mut dir = start.as_ref().to_path_buf();
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.is_file() {
                let config = Self::load(&config_path)?;
                return Ok(Some((config_path, config)));
            }
            if !dir.pop() {
                return Ok(None);
            }
        }
    }

    /// Discover configuration starting at the current directory
    pub fn discover() -> anyhow::Result<Option<(PathBuf, Self)>> {
        let cwd = std::env::current_dir().context("resolving current directory")?;
        Self::discover_from(cwd)
    }

    /// Permutation settings as the stats engine expects them
    pub fn permutation_config(&self) -> PermutationConfig {
        PermutationConfig {
            iterations: self.test.iterations,
            significance_threshold: self.test.significance_threshold,
            parallel: self.test.parallel,
            seed: self.test.seed,
        }
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# Reactime Configuration

[test]
# Number of label permutations drawn for the null distribution
iterations = 10000
# Significance threshold (alpha), strictly between 0 and 1
significance_threshold = 0.05
# Draw permutations in parallel (results are identical either way)
parallel = true
# Fixed master seed for reproducible p-values (uncomment to enable)
# seed = 42

[output]
# Output format: json or pretty
format = "json"
# Bins of the null-distribution histogram (0 disables it)
histogram_bins = 50
# Embed every permuted difference in the output
include_null_distribution = false
"#
        .to_string()
    }
}
