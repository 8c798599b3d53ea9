//! Aggregation of per-predictor divergences into RATE scores.

use crate::estimate::RateError;
use ndarray::Array1;

/// Normalized centrality scores and their entropic summary.
#[derive(Debug, Clone)]
pub struct Centrality {
    /// `kld / sum(kld)`; sums to one.
    pub rates: Array1<f64>,
    /// KL divergence of `rates` from the uniform distribution over predictors.
    pub delta: f64,
    /// `100 / (1 + delta)`, in percent.
    pub eff_samp_size: f64,
}

/// Normalizes the divergences and computes `delta` and the effective sample size.
///
/// Zero rates contribute nothing to `delta` (`0 * ln 0 = 0`). A single predictor
/// carries all of the centrality regardless of its divergence.
pub fn aggregate(kld: &Array1<f64>) -> Result<Centrality, RateError> {
    let p = kld.len();
    if p == 1 {
        return Ok(Centrality {
            rates: Array1::ones(1),
            delta: 0.0,
            eff_samp_size: 100.0,
        });
    }

    let total = kld.sum();
    if !total.is_finite() || total <= 0.0 {
        return Err(RateError::NonPositiveKldSum { sum: total });
    }

    let rates = kld / total;
    let delta = entropic_deviation(&rates);
    let eff_samp_size = 100.0 / (1.0 + delta);
    log::info!("RATE delta = {delta:.6}, effective sample size = {eff_samp_size:.2}%");

    Ok(Centrality {
        rates,
        delta,
        eff_samp_size,
    })
}

/// `sum(rates * ln(p * rates))` over the strictly positive rates.
pub fn entropic_deviation(rates: &Array1<f64>) -> f64 {
    let p = rates.len() as f64;
    rates
        .iter()
        .filter(|&&rate| rate > 0.0)
        .map(|&rate| rate * (p * rate).ln())
        .sum()
}
