//! Dimensionality reduction: from posterior draws to an effect-size posterior.
//!
//! Produces the posterior mean `mu` (as magnitudes) and covariance `V` of the
//! effect sizes, indexed by the columns of the design matrix. The low-rank path
//! additionally keeps the reduced covariance `Sigma_star` and the right singular
//! basis `v` of the design matrix, which the precision stage needs to lift the
//! reduced precision back into predictor space.

use crate::estimate::RateError;
use crate::linalg::{
    self, SINGULAR_VALUE_TOLERANCE, column_means, pseudo_inverse, sample_covariance,
};
use ndarray::{Array1, Array2, ArrayView2, s};

/// Summary of the effect-size posterior, aligned with the columns of `X`.
#[derive(Debug, Clone)]
pub struct EffectPosterior {
    /// Absolute posterior mean effect size per predictor.
    pub mu: Array1<f64>,
    /// `p x p` effect covariance `V`.
    pub covariance: Array2<f64>,
    pub projection: Projection,
}

/// How the effect covariance relates to the design matrix.
#[derive(Debug, Clone)]
pub enum Projection {
    /// `V` was estimated directly from effect-size draws.
    Full,
    /// `V = basis @ sigma_star @ basis^T` with a retained rank of `basis.ncols()`.
    LowRank {
        /// Right singular vectors of `X` restricted to the retained components (`p x r`).
        basis: Array2<f64>,
        /// Draws covariance projected into the reduced space (`r x r`).
        sigma_star: Array2<f64>,
    },
}

impl EffectPosterior {
    pub fn num_predictors(&self) -> usize {
        self.mu.len()
    }

    /// Retained design rank, for low-rank posteriors.
    pub fn design_rank(&self) -> Option<usize> {
        match &self.projection {
            Projection::Full => None,
            Projection::LowRank { basis, .. } => Some(basis.ncols()),
        }
    }
}

/// Projects function-space draws onto effect sizes: `(pinv(X) @ f_draws^T)^T`.
///
/// `x` is `n x p`, `f_draws` is `n_draws x n`; the result is `n_draws x p`.
pub fn effect_draws_from_function_draws(
    x: ArrayView2<f64>,
    f_draws: ArrayView2<f64>,
) -> Result<Array2<f64>, RateError> {
    let x_pinv = pseudo_inverse(&x)?;
    Ok(f_draws.dot(&x_pinv.t()))
}

/// Full-rank reduction: sample moments of the effect-size draws.
pub fn reduce_full_rank(beta_draws: ArrayView2<f64>) -> EffectPosterior {
    let covariance = sample_covariance(&beta_draws);
    let mu = column_means(&beta_draws).mapv(f64::abs);
    log::debug!(
        "Full-rank reduction: {} draws over {} predictors",
        beta_draws.nrows(),
        mu.len()
    );
    EffectPosterior {
        mu,
        covariance,
        projection: Projection::Full,
    }
}

/// Low-rank reduction through a truncated SVD of the design matrix.
///
/// A component is retained when its singular value exceeds the fixed tolerance
/// and the cumulative share of squared singular values up to and including it is
/// below `prop_var`. `prop_var >= 1` retains every significant component.
pub fn reduce_low_rank(
    x: ArrayView2<f64>,
    f_draws: ArrayView2<f64>,
    prop_var: f64,
) -> Result<EffectPosterior, RateError> {
    let svd = linalg::thin_svd(&x)?;
    let rank = retained_components(&svd.s, prop_var);
    if rank == 0 {
        return Err(RateError::DegenerateRank {
            stage: "design matrix truncation",
        });
    }
    log::info!(
        "Low-rank reduction keeps {rank} of {} singular components (prop_var = {prop_var})",
        svd.s.len()
    );

    // u: r x n, each left singular vector scaled by the inverse singular value.
    let mut u = svd.u.slice(s![.., ..rank]).t().to_owned();
    for (mut row, &sv) in u.rows_mut().into_iter().zip(svd.s.iter()) {
        row.mapv_inplace(|value| value / sv);
    }
    // v: p x r.
    let basis = svd.vt.slice(s![..rank, ..]).t().to_owned();

    let sigma_f = sample_covariance(&f_draws);
    let sigma_star = u.dot(&sigma_f).dot(&u.t());
    let covariance = basis.dot(&sigma_star).dot(&basis.t());

    let f_mean = column_means(&f_draws);
    let mu = basis.dot(&u.dot(&f_mean)).mapv(f64::abs);

    Ok(EffectPosterior {
        mu,
        covariance,
        projection: Projection::LowRank { basis, sigma_star },
    })
}

/// Length of the retained prefix of a decreasing singular value spectrum.
fn retained_components(singular_values: &Array1<f64>, prop_var: f64) -> usize {
    let total: f64 = singular_values.iter().map(|sv| sv * sv).sum();
    if total <= 0.0 {
        return 0;
    }
    let keep_all = prop_var >= 1.0;
    let mut cumulative = 0.0;
    singular_values
        .iter()
        .take_while(|&&sv| {
            cumulative += sv * sv / total;
            sv > SINGULAR_VALUE_TOLERANCE && (keep_all || cumulative < prop_var)
        })
        .count()
}
