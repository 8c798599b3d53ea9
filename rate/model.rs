use itertools::Itertools;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs;
use std::io::{BufWriter, Write};
use thiserror::Error;

// --- Public Data Structures ---
// The configuration and result types double as the on-disk TOML formats.

/// Which reduction path produced the effect-size posterior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateMode {
    /// Effect covariance estimated directly from effect-size draws.
    FullRank,
    /// Effect covariance built through a truncated SVD of the design matrix.
    LowRank,
}

/// Options for a single RATE computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    /// Share of the design matrix's squared singular values to keep in low-rank
    /// mode. Values at or above 1 keep every significant component.
    pub prop_var: f64,
    pub low_rank: bool,
    /// Evaluate the per-predictor divergences on a worker pool.
    pub parallel: bool,
    /// Worker pool size for parallel mode; `None` uses every hardware thread.
    pub workers: Option<usize>,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            prop_var: 1.0,
            low_rank: false,
            parallel: false,
            workers: None,
        }
    }
}

impl RateConfig {
    pub fn mode(&self) -> RateMode {
        if self.low_rank {
            RateMode::LowRank
        } else {
            RateMode::FullRank
        }
    }

    /// Worker count for parallel mode, resolving `None` to the hardware thread count.
    pub fn resolved_workers(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get)
    }

    pub fn save(&self, path: &str) -> Result<(), ModelError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        Ok(())
    }

    pub fn load(path: &str) -> Result<Self, ModelError> {
        let toml_string = fs::read_to_string(path)?;
        let config = toml::from_str(&toml_string)?;
        Ok(config)
    }
}

/// Ranks and execution details recorded alongside the scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankDiagnostics {
    pub mode: RateMode,
    /// Retained design rank (low-rank mode only).
    pub design_rank: Option<usize>,
    /// Rank of the precision factor `U`.
    pub precision_rank: usize,
    /// Worker pool size (parallel mode only).
    pub workers: Option<usize>,
}

/// The output of a RATE computation, index-aligned with the design matrix columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateResult {
    pub names: Vec<String>,
    pub delta: f64,
    pub eff_samp_size: f64,
    pub kld: Array1<f64>,
    pub rates: Array1<f64>,
    pub diagnostics: RankDiagnostics,
}

/// One row of a ranked RATE table.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedPredictor<'a> {
    pub index: usize,
    pub name: &'a str,
    pub rate: f64,
    pub kld: f64,
}

/// Custom error type for configuration and result persistence.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read or write file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
}

impl RateResult {
    pub fn num_predictors(&self) -> usize {
        self.rates.len()
    }

    /// Predictors ordered by decreasing rate; ties keep predictor order.
    pub fn ranked(&self) -> Vec<RankedPredictor<'_>> {
        (0..self.num_predictors())
            .map(|index| RankedPredictor {
                index,
                name: &self.names[index],
                rate: self.rates[index],
                kld: self.kld[index],
            })
            .sorted_by(|a, b| b.rate.partial_cmp(&a.rate).unwrap_or(Ordering::Equal))
            .collect()
    }

    /// Writes `predictor\tkld\trate` rows in predictor order, followed by the
    /// summary statistics as comment lines.
    pub fn save_tsv(&self, path: &str) -> Result<(), ModelError> {
        let mut file = BufWriter::new(fs::File::create(path)?);
        writeln!(file, "predictor\tkld\trate")?;
        for ((name, kld), rate) in self.names.iter().zip(&self.kld).zip(&self.rates) {
            writeln!(file, "{name}\t{kld}\t{rate}")?;
        }
        writeln!(file, "# delta\t{}", self.delta)?;
        writeln!(file, "# eff_samp_size\t{}", self.eff_samp_size)?;
        file.flush()?;
        Ok(())
    }

    /// Saves the full result in a human-readable TOML format.
    pub fn save_summary(&self, path: &str) -> Result<(), ModelError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        Ok(())
    }

    pub fn load_summary(path: &str) -> Result<Self, ModelError> {
        let toml_string = fs::read_to_string(path)?;
        let result = toml::from_str(&toml_string)?;
        Ok(result)
    }
}

/// Default predictor labels: `"1"` through `"p"`.
pub fn default_names(p: usize) -> Vec<String> {
    (1..=p).map(|i| i.to_string()).collect()
}
