//! Sample loading
//!
//! A sample file holds one condition's reaction times in milliseconds, either
//! as a JSON array (`[412.5, null, 388]`) or as plain text with one value per
//! line. Missing entries are dropped here so the test only sees real values.

use anyhow::{Context, bail};
use std::path::Path;
use tracing::debug;

/// Tokens treated as a missing measurement in text files (case-insensitive)
const MISSING_TOKENS: &[&str] = &["null", "nan", "na", "n/a", "none", "-"];

/// Values read from one sample file
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSample {
    /// Finite reaction times, in file order
    pub values: Vec<f64>,
    /// Entries dropped as missing
    pub missing: usize,
}

/// Read and parse a sample file
pub fn load_sample(path: impl AsRef<Path>) -> anyhow::Result<LoadedSample> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading sample {}", path.display()))?;
    let sample =
        parse_sample(&content).with_context(|| format!("parsing sample {}", path.display()))?;

    debug!(
        path = %path.display(),
        values = sample.values.len(),
        missing = sample.missing,
        "loaded sample"
    );
    Ok(sample)
}

/// Parse sample text, detecting JSON by a leading `[`
pub fn parse_sample(content: &str) -> anyhow::Result<LoadedSample> {
    if content.trim_start().starts_with('[') {
        parse_json(content)
    } else {
        parse_lines(content)
    }
}

fn parse_json(content: &str) -> anyhow::Result<LoadedSample> {
    let raw: Vec<Option<f64>> =
        serde_json::from_str(content).context("expected a JSON array of numbers or nulls")?;
    Ok(collect(raw))
}

fn parse_lines(content: &str) -> anyhow::Result<LoadedSample> {
    let mut raw = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let token = line.trim();
        if token.is_empty() || token.starts_with('#') {
            continue;
        }
        if MISSING_TOKENS.iter().any(|m| token.eq_ignore_ascii_case(m)) {
            raw.push(None);
            continue;
        }
        match token.parse::<f64>() {
            Ok(value) => raw.push(Some(value)),
            Err(_) => bail!("line {}: '{}' is not a number", line_no + 1, token),
        }
    }
    Ok(collect(raw))
}

fn collect(raw: Vec<Option<f64>>) -> LoadedSample {
    let total = raw.len();
    let values: Vec<f64> = raw
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .collect();
    LoadedSample {
        missing: total - values.len(),
        values,
    }
}
