//! # RATE Entry Point
//!
//! Validates the caller's inputs and runs the three numerical stages in order:
//!
//! 1. Dimensionality reduction (`reduce`): effect-size mean and covariance, either
//!    directly from effect draws or through a truncated SVD of `X`.
//! 2. Precision construction (`precision`): `Lambda = U U^T`.
//! 3. KLD evaluation (`kld`) and aggregation (`aggregate`).
//!
//! Every precondition on shapes, draw counts and configuration is checked here.
//! The stages themselves assume validated input and only report numerical
//! degeneracy. Any failure aborts the whole computation.

use crate::aggregate::aggregate;
use crate::kld::{KldInputs, compute_kld_parallel, compute_kld_sequential};
use crate::model::{RankDiagnostics, RateConfig, RateMode, RateResult, default_names};
use crate::precision::construct_precision;
use crate::progress::{KldProgressObserver, NoopKldProgress};
use crate::reduce::{self, EffectPosterior};
use ndarray::{ArrayView2, CowArray, Ix2};
use ndarray_linalg::error::LinalgError;
use thiserror::Error;

/// A comprehensive error type for a RATE computation.
#[derive(Error, Debug)]
pub enum RateError {
    #[error("Dimension mismatch for {what}: expected {expected}, found {found}.")]
    ShapeMismatch {
        what: &'static str,
        expected: String,
        found: String,
    },

    #[error("Missing required input: {0}")]
    MissingInput(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("At least {required} posterior draws are required to estimate a covariance, but {found} were supplied.")]
    InsufficientDraws { found: usize, required: usize },

    #[error("Non-finite values (NaN or Infinity) were found in {0}.")]
    NonFiniteInput(&'static str),

    #[error("Retained rank is zero after truncating singular values in the {stage}; no predictors survive.")]
    DegenerateRank { stage: &'static str },

    #[error("The KLD values sum to {sum}; RATE scores cannot be normalized.")]
    NonPositiveKldSum { sum: f64 },

    #[error("SVD did not return singular vectors.")]
    MissingSingularVectors,

    #[error("Linear algebra backend failed: {0}")]
    LinalgError(#[from] LinalgError),

    #[error("Failed to build the KLD worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Design matrix, posterior draws and optional predictor names for one RATE call.
#[derive(Debug, Clone)]
pub struct RateInput<'a> {
    /// `n x p` design matrix.
    pub design: ArrayView2<'a, f64>,
    /// `n_draws x n` function-space draws.
    pub f_draws: Option<ArrayView2<'a, f64>>,
    /// `n_draws x p` effect-size draws.
    pub beta_draws: Option<ArrayView2<'a, f64>>,
    /// One label per column of the design matrix.
    pub names: Option<Vec<String>>,
}

impl<'a> RateInput<'a> {
    pub fn new(design: ArrayView2<'a, f64>) -> Self {
        Self {
            design,
            f_draws: None,
            beta_draws: None,
            names: None,
        }
    }

    pub fn with_function_draws(mut self, f_draws: ArrayView2<'a, f64>) -> Self {
        self.f_draws = Some(f_draws);
        self
    }

    pub fn with_effect_draws(mut self, beta_draws: ArrayView2<'a, f64>) -> Self {
        self.beta_draws = Some(beta_draws);
        self
    }

    pub fn with_names(mut self, names: Vec<String>) -> Self {
        self.names = Some(names);
        self
    }
}

/// Computes RATE scores without progress reporting.
pub fn rate(input: &RateInput<'_>, config: &RateConfig) -> Result<RateResult, RateError> {
    rate_with_progress(input, config, &mut NoopKldProgress)
}

/// Computes RATE scores, reporting per-predictor progress in sequential mode.
pub fn rate_with_progress(
    input: &RateInput<'_>,
    config: &RateConfig,
    progress: &mut dyn KldProgressObserver,
) -> Result<RateResult, RateError> {
    validate_config(config)?;
    validate_input(input, config)?;

    let (n, p) = input.design.dim();
    log::info!(
        "Calculating RATE for {p} predictors over {n} samples ({:?})",
        config.mode()
    );

    let posterior = reduce_posterior(input, config)?;
    let factor = construct_precision(&posterior)?;
    let lambda = factor.lambda();

    let inputs = KldInputs {
        mu: posterior.mu.view(),
        lambda: lambda.view(),
        covariance: posterior.covariance.view(),
    };
    let (kld, workers) = if config.parallel {
        let workers = config.resolved_workers();
        (compute_kld_parallel(&inputs, workers)?, Some(workers))
    } else {
        (compute_kld_sequential(&inputs, progress), None)
    };
    log::info!("KLD calculation completed.");

    let centrality = aggregate(&kld)?;
    let names = input.names.clone().unwrap_or_else(|| default_names(p));

    Ok(RateResult {
        names,
        delta: centrality.delta,
        eff_samp_size: centrality.eff_samp_size,
        kld,
        rates: centrality.rates,
        diagnostics: RankDiagnostics {
            mode: config.mode(),
            design_rank: posterior.design_rank(),
            precision_rank: factor.rank(),
            workers,
        },
    })
}

fn reduce_posterior(input: &RateInput<'_>, config: &RateConfig) -> Result<EffectPosterior, RateError> {
    match config.mode() {
        RateMode::LowRank => {
            if input.beta_draws.is_some() {
                log::warn!("Effect-size draws are ignored in low-rank mode; using function draws.");
            }
            // Presence was checked in `validate_input`.
            let f_draws = input.f_draws.ok_or(RateError::MissingInput(
                "low-rank mode requires function-space draws",
            ))?;
            reduce::reduce_low_rank(input.design, f_draws, config.prop_var)
        }
        RateMode::FullRank => {
            let beta_draws: CowArray<'_, f64, Ix2> = match (input.beta_draws, input.f_draws) {
                (Some(beta), _) => CowArray::from(beta),
                (None, Some(f_draws)) => {
                    CowArray::from(reduce::effect_draws_from_function_draws(input.design, f_draws)?)
                }
                (None, None) => {
                    return Err(RateError::MissingInput(
                        "full-rank mode requires effect-size draws or function-space draws",
                    ));
                }
            };
            Ok(reduce::reduce_full_rank(beta_draws.view()))
        }
    }
}

fn validate_config(config: &RateConfig) -> Result<(), RateError> {
    if !config.prop_var.is_finite() || config.prop_var <= 0.0 {
        return Err(RateError::InvalidConfig(format!(
            "prop_var must be a finite positive number, but was {}",
            config.prop_var
        )));
    }
    if config.workers == Some(0) {
        return Err(RateError::InvalidConfig(
            "workers must be at least 1 when specified".to_string(),
        ));
    }
    Ok(())
}

fn validate_input(input: &RateInput<'_>, config: &RateConfig) -> Result<(), RateError> {
    const MIN_DRAWS: usize = 2;

    let (n, p) = input.design.dim();
    if n == 0 || p == 0 {
        return Err(RateError::ShapeMismatch {
            what: "design matrix X",
            expected: "at least one sample and one predictor".to_string(),
            found: format!("{n} x {p}"),
        });
    }
    ensure_finite(&input.design, "design matrix X")?;

    if let Some(names) = &input.names {
        if names.len() != p {
            return Err(RateError::ShapeMismatch {
                what: "predictor names",
                expected: format!("{p} names (one per column of X)"),
                found: format!("{} names", names.len()),
            });
        }
    }

    if let Some(f_draws) = &input.f_draws {
        if f_draws.ncols() != n {
            return Err(RateError::ShapeMismatch {
                what: "f_draws",
                expected: format!("n_draws x {n} (one column per row of X)"),
                found: format!("{} x {}", f_draws.nrows(), f_draws.ncols()),
            });
        }
        if f_draws.nrows() < MIN_DRAWS {
            return Err(RateError::InsufficientDraws {
                found: f_draws.nrows(),
                required: MIN_DRAWS,
            });
        }
        ensure_finite(f_draws, "f_draws")?;
    }

    if let Some(beta_draws) = &input.beta_draws {
        if beta_draws.ncols() != p {
            return Err(RateError::ShapeMismatch {
                what: "beta_draws",
                expected: format!("n_draws x {p} (one column per column of X)"),
                found: format!("{} x {}", beta_draws.nrows(), beta_draws.ncols()),
            });
        }
        if !config.low_rank && beta_draws.nrows() < MIN_DRAWS {
            return Err(RateError::InsufficientDraws {
                found: beta_draws.nrows(),
                required: MIN_DRAWS,
            });
        }
        ensure_finite(beta_draws, "beta_draws")?;
    }

    match config.mode() {
        RateMode::LowRank if input.f_draws.is_none() => Err(RateError::MissingInput(
            "low-rank mode requires function-space draws (f_draws)",
        )),
        RateMode::FullRank if input.f_draws.is_none() && input.beta_draws.is_none() => {
            Err(RateError::MissingInput(
                "full-rank mode requires effect-size draws (beta_draws) or function-space draws (f_draws)",
            ))
        }
        _ => Ok(()),
    }
}

fn ensure_finite(matrix: &ArrayView2<'_, f64>, what: &'static str) -> Result<(), RateError> {
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(RateError::NonFiniteInput(what));
    }
    Ok(())
}
