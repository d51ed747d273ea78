#![warn(missing_docs)]
//! Reactime CLI Library
//!
//! Command-line driver around the permutation test: loads two sample files,
//! layers `reactime.toml` and flag overrides into a test configuration, runs
//! the test and writes a JSON report.
//!
//! # Example
//!
//! ```text
//! reactime test binary_means.txt food_means.json --seed 42 --format pretty
//! ```

mod config;
mod report;
mod samples;

pub use config::*;
pub use report::*;
pub use samples::{LoadedSample, load_sample, parse_sample};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use rayon::ThreadPoolBuilder;
use reactime_stats::{PermutationConfig, compute_summary, run_test};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Reactime CLI arguments
#[derive(Parser, Debug)]
#[command(name = "reactime")]
#[command(
    author,
    version,
    about = "Reactime - permutation tests for reaction-time experiments"
)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Explicit config file (skips discovery of reactime.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of threads for parallel permutations
    /// 0 = use all available cores (default), 1 = single-threaded
    #[arg(long, short = 'j', default_value = "0", global = true)]
    pub threads: usize,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compare the means of two samples with a permutation test
    Test(TestArgs),
    /// Print a default reactime.toml
    Init,
}

/// Arguments of the `test` subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct TestArgs {
    /// File with the first sample (JSON array or one value per line)
    pub sample_a: PathBuf,

    /// File with the second sample
    pub sample_b: PathBuf,

    /// Number of permutations
    #[arg(long, short = 'n')]
    pub iterations: Option<usize>,

    /// Significance threshold
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Master seed for a reproducible run
    #[arg(long)]
    pub seed: Option<u64>,

    /// Draw permutations on the calling thread only
    #[arg(long)]
    pub serial: bool,

    /// Null-distribution histogram bins (0 disables the histogram)
    #[arg(long)]
    pub bins: Option<usize>,

    /// Embed every permuted difference in the report
    #[arg(long)]
    pub null_distribution: bool,

    /// Output format: json, pretty
    #[arg(long)]
    pub format: Option<String>,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Name of the first condition in the report
    #[arg(long)]
    pub label_a: Option<String>,

    /// Name of the second condition in the report
    #[arg(long)]
    pub label_b: Option<String>,
}

/// Run the Reactime CLI with the process arguments.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the Reactime CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Init => {
            print!("{}", ReactimeConfig::default_toml());
            Ok(())
        }
        Commands::Test(ref args) => {
            let config = resolve_config(cli.config.as_ref())?;

            // Configure Rayon thread pool for parallel permutations
            if cli.threads > 0 {
                ThreadPoolBuilder::new()
                    .num_threads(cli.threads)
                    .build_global()
                    .ok();
            }

            let format = resolve_format(args, &config)?;
            let report = run_test_command(args, &config)?;
            let json = generate_json_report(&report, format)?;

            match &args.output {
                Some(path) => {
                    std::fs::write(path, json + "\n")
                        .with_context(|| format!("writing report {}", path.display()))?;
                    info!(path = %path.display(), "report written");
                }
                None => println!("{}", json),
            }
            Ok(())
        }
    }
}

/// Logs go to stderr so stdout stays clean JSON. `RUST_LOG` overrides the default filter.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "reactime_cli=debug,reactime_stats=debug"
    } else {
        "reactime_cli=info,reactime_stats=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // Ignore a second initialisation (tests drive the CLI repeatedly)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Explicit `--config` wins, then discovery, then defaults.
fn resolve_config(explicit: Option<&PathBuf>) -> anyhow::Result<ReactimeConfig> {
    if let Some(path) = explicit {
        return ReactimeConfig::load(path);
    }
    match ReactimeConfig::discover()? {
        Some((path, config)) => {
            info!(path = %path.display(), "using config file");
            Ok(config)
        }
        None => Ok(ReactimeConfig::default()),
    }
}

fn resolve_format(args: &TestArgs, config: &ReactimeConfig) -> anyhow::Result<OutputFormat> {
    let raw = args.format.as_deref().unwrap_or(config.output.format.as_str());
    raw.parse::<OutputFormat>().map_err(anyhow::Error::msg)
}

/// Build the permutation configuration by layering: reactime.toml → CLI overrides.
pub fn build_permutation_config(args: &TestArgs, config: &ReactimeConfig) -> PermutationConfig {
    let base = config.permutation_config();
    PermutationConfig {
        iterations: args.iterations.unwrap_or(base.iterations),
        significance_threshold: args.alpha.unwrap_or(base.significance_threshold),
        parallel: base.parallel && !args.serial,
        seed: args.seed.or(base.seed),
    }
}

/// Load both samples, run the test and assemble the report.
pub fn run_test_command(args: &TestArgs, config: &ReactimeConfig) -> anyhow::Result<TestReport> {
    let sample_a = load_sample(&args.sample_a)?;
    let sample_b = load_sample(&args.sample_b)?;
    let permutation = build_permutation_config(args, config);

    if permutation.iterations > 0 && permutation.iterations < 100 {
        warn!(
            iterations = permutation.iterations,
            "very few permutations; the p-value resolution is 1/iterations"
        );
    }

    let label_a = args
        .label_a
        .clone()
        .unwrap_or_else(|| file_label(&args.sample_a));
    let label_b = args
        .label_b
        .clone()
        .unwrap_or_else(|| file_label(&args.sample_b));

    let start = Instant::now();
    let result = run_test(&sample_a.values, &sample_b.values, &permutation)
        .with_context(|| format!("permutation test {} vs {}", label_a, label_b))?;

    info!(
        a = %label_a,
        b = %label_b,
        observed_difference = result.observed_difference,
        p_value = result.p_value,
        significant = result.is_significant,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "permutation test complete"
    );

    let bins = args.bins.unwrap_or(config.output.histogram_bins);
    let histogram = if bins > 0 {
        Some(HistogramReport::from(result.null_histogram(bins)?))
    } else {
        None
    };
    let null_distribution = (args.null_distribution || config.output.include_null_distribution)
        .then(|| result.null_distribution.clone());

    Ok(TestReport {
        meta: ReportMeta {
            schema_version: SCHEMA_VERSION,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            config: ReportConfig {
                seed: result.seed,
                ..ReportConfig::from(&permutation)
            },
        },
        labels: SampleLabels {
            a: label_a,
            b: label_b,
        },
        summary_a: SummaryReport::new(&compute_summary(&sample_a.values), sample_a.missing),
        summary_b: SummaryReport::new(&compute_summary(&sample_b.values), sample_b.missing),
        result: ResultReport::from(&result),
        histogram,
        null_distribution,
    })
}

fn file_label(path: &std::path::Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
