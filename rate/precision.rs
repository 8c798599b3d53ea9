//! Precision construction: a factor `U` with `Lambda = U U^T`.

use crate::estimate::RateError;
use crate::linalg::{pseudo_inverse, thin_svd};
use crate::reduce::{EffectPosterior, Projection};
use ndarray::{Array2, s};

/// Low-rank factor of the effect-size precision matrix.
#[derive(Debug, Clone)]
pub struct PrecisionFactor {
    /// `p x r` factor.
    pub factor: Array2<f64>,
}

impl PrecisionFactor {
    pub fn rank(&self) -> usize {
        self.factor.ncols()
    }

    /// Materializes `Lambda = U U^T` (`p x p`).
    pub fn lambda(&self) -> Array2<f64> {
        self.factor.dot(&self.factor.t())
    }
}

pub fn construct_precision(posterior: &EffectPosterior) -> Result<PrecisionFactor, RateError> {
    let factor = match &posterior.projection {
        Projection::Full => full_rank_factor(&posterior.covariance)?,
        Projection::LowRank { basis, sigma_star } => low_rank_factor(basis, sigma_star)?,
    };
    log::info!(
        "Precision factor has rank {} over {} predictors",
        factor.ncols(),
        factor.nrows()
    );
    Ok(PrecisionFactor { factor })
}

/// `D = pinv(V)`, then `U = D_u[:, :r] * sqrt(D_s[:r])`.
fn full_rank_factor(covariance: &Array2<f64>) -> Result<Array2<f64>, RateError> {
    let precision = pseudo_inverse(covariance)?;
    let svd = thin_svd(&precision)?;
    let rank = svd.significant_rank();
    if rank == 0 {
        return Err(RateError::DegenerateRank {
            stage: "effect precision",
        });
    }
    let scale = svd.s.slice(s![..rank]).mapv(f64::sqrt);
    Ok(&svd.u.slice(s![.., ..rank]) * &scale)
}

/// Inverts `Sigma_star` on its significant spectrum and lifts it through `pinv(v)^T`.
fn low_rank_factor(basis: &Array2<f64>, sigma_star: &Array2<f64>) -> Result<Array2<f64>, RateError> {
    let svd = thin_svd(sigma_star)?;
    let rank = svd.significant_rank();
    if rank == 0 {
        return Err(RateError::DegenerateRank {
            stage: "reduced draws covariance",
        });
    }
    // tmp^T = u[:, :r] diag(1 / sqrt(s[:r]))
    let inv_sqrt = svd.s.slice(s![..rank]).mapv(|sv| 1.0 / sv.sqrt());
    let tmp_t = &svd.u.slice(s![.., ..rank]) * &inv_sqrt;
    let basis_pinv = pseudo_inverse(basis)?;
    Ok(basis_pinv.t().dot(&tmp_t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reduce::{reduce_full_rank, reduce_low_rank, effect_draws_from_function_draws};
    use crate::test_fixtures::SyntheticRateData;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use ndarray_linalg::Inverse;

    #[test]
    fn full_rank_lambda_inverts_covariance() {
        let covariance = array![[2.0, 0.5, 0.0], [0.5, 1.0, 0.2], [0.0, 0.2, 0.5]];
        let posterior = EffectPosterior {
            mu: array![1.0, 1.0, 1.0],
            covariance: covariance.clone(),
            projection: Projection::Full,
        };
        let factor = construct_precision(&posterior).unwrap();
        assert_eq!(factor.rank(), 3);

        let expected = covariance.inv().unwrap();
        let lambda = factor.lambda();
        for (a, b) in lambda.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-10);
        }
    }

    #[test]
    fn singular_covariance_keeps_only_significant_directions() {
        // Rank-one covariance: only one direction carries precision.
        let covariance = array![[1.0, 1.0], [1.0, 1.0]];
        let posterior = EffectPosterior {
            mu: array![1.0, 1.0],
            covariance,
            projection: Projection::Full,
        };
        let factor = construct_precision(&posterior).unwrap();
        assert_eq!(factor.rank(), 1);
    }

    #[test]
    fn zero_covariance_is_degenerate() {
        let posterior = EffectPosterior {
            mu: array![1.0, 1.0],
            covariance: Array2::zeros((2, 2)),
            projection: Projection::Full,
        };
        let err = construct_precision(&posterior).unwrap_err();
        assert!(matches!(err, RateError::DegenerateRank { .. }));
    }

    #[test]
    fn low_rank_and_full_rank_lambda_agree() {
        let data = SyntheticRateData::builder()
            .samples(50)
            .predictors(3)
            .draws(300)
            .seed(21)
            .build();

        let beta = effect_draws_from_function_draws(data.x.view(), data.f_draws.view()).unwrap();
        let full = construct_precision(&reduce_full_rank(beta.view())).unwrap();
        let low = construct_precision(
            &reduce_low_rank(data.x.view(), data.f_draws.view(), 1.0).unwrap(),
        )
        .unwrap();

        let full_lambda = full.lambda();
        let low_lambda = low.lambda();
        let scale = full_lambda.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        for (a, b) in full_lambda.iter().zip(low_lambda.iter()) {
            assert_abs_diff_eq!(a / scale, b / scale, epsilon = 1e-7);
        }
    }
}
