//! Dense linear algebra helpers shared by the reduction and precision stages.
//!
//! All decompositions go through `ndarray-linalg` (LAPACK). The helpers here only
//! add the pieces the RATE stages need on top of it: a thin SVD, a Moore-Penrose
//! pseudo-inverse, rank counting against the fixed singular value tolerance, and
//! sample moments over posterior draws (rows are draws, columns are variables).

use crate::estimate::RateError;
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix2};
use ndarray_linalg::{JobSvd, SVDDC};

/// Absolute tolerance below which a singular value is treated as zero.
///
/// Every rank truncation in the crate uses this value so that low-rank and
/// full-rank runs on the same data truncate identically.
pub const SINGULAR_VALUE_TOLERANCE: f64 = 1e-10;

/// Economy-size singular value decomposition `A = U diag(s) Vt`.
///
/// For an `m x n` input with `k = min(m, n)`: `u` is `m x k`, `s` has length `k`
/// sorted in decreasing order, and `vt` is `k x n`.
#[derive(Debug, Clone)]
pub struct ThinSvd {
    pub u: Array2<f64>,
    pub s: Array1<f64>,
    pub vt: Array2<f64>,
}

impl ThinSvd {
    /// Number of singular values above [`SINGULAR_VALUE_TOLERANCE`].
    pub fn significant_rank(&self) -> usize {
        significant_rank(&self.s)
    }
}

pub fn thin_svd<S>(matrix: &ArrayBase<S, Ix2>) -> Result<ThinSvd, RateError>
where
    S: Data<Elem = f64>,
{
    // Economy mode: LAPACK only materializes the leading min(m, n) vectors.
    let (u, s, vt) = matrix.svddc(JobSvd::Some)?;
    match (u, vt) {
        (Some(u), Some(vt)) => Ok(ThinSvd { u, s, vt }),
        _ => Err(RateError::MissingSingularVectors),
    }
}

/// Counts singular values strictly above [`SINGULAR_VALUE_TOLERANCE`].
pub fn significant_rank(singular_values: &Array1<f64>) -> usize {
    singular_values
        .iter()
        .filter(|&&sv| sv > SINGULAR_VALUE_TOLERANCE)
        .count()
}

/// Moore-Penrose pseudo-inverse via SVD.
///
/// Singular values at or below `max(m, n) * eps * s_max` are dropped, the usual
/// LAPACK-style relative cutoff.
pub fn pseudo_inverse<S>(matrix: &ArrayBase<S, Ix2>) -> Result<Array2<f64>, RateError>
where
    S: Data<Elem = f64>,
{
    let (m, n) = matrix.dim();
    let svd = thin_svd(matrix)?;
    let s_max = svd.s.iter().fold(0.0_f64, |acc, &v| acc.max(v));
    let cutoff = m.max(n) as f64 * f64::EPSILON * s_max;

    let inv_s = svd
        .s
        .mapv(|sv| if sv > cutoff { 1.0 / sv } else { 0.0 });

    // V diag(1/s) U^T, with the column scaling applied to V before the product.
    let v_scaled = &svd.vt.t() * &inv_s;
    Ok(v_scaled.dot(&svd.u.t()))
}

/// Column means of a draws matrix (one row per draw).
pub fn column_means<S>(draws: &ArrayBase<S, Ix2>) -> Array1<f64>
where
    S: Data<Elem = f64>,
{
    let n = draws.nrows() as f64;
    draws.sum_axis(Axis(0)) / n
}

/// Unbiased sample covariance between the columns of a draws matrix.
///
/// Rows are observations; the result is `ncols x ncols` with denominator
/// `nrows - 1`. Callers guarantee at least two rows.
pub fn sample_covariance<S>(draws: &ArrayBase<S, Ix2>) -> Array2<f64>
where
    S: Data<Elem = f64>,
{
    let means = column_means(draws);
    let centered = draws - &means;
    let denom = (draws.nrows() - 1) as f64;
    centered.t().dot(&centered) / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn thin_svd_reconstructs_tall_matrix() {
        let a = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0], [0.5, -1.0]];
        let svd = thin_svd(&a).unwrap();
        assert_eq!(svd.u.dim(), (4, 2));
        assert_eq!(svd.s.len(), 2);
        assert_eq!(svd.vt.dim(), (2, 2));

        let rebuilt = (&svd.u * &svd.s).dot(&svd.vt);
        for (x, y) in rebuilt.iter().zip(a.iter()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-12);
        }
    }

    #[test]
    fn thin_svd_of_wide_matrix_keeps_economy_shapes() {
        let a = Array2::from_shape_fn((3, 40), |(i, j)| ((i * 7 + j * 3) % 11) as f64 - 5.0);
        let svd = thin_svd(&a).unwrap();
        assert_eq!(svd.u.dim(), (3, 3));
        assert_eq!(svd.s.len(), 3);
        assert_eq!(svd.vt.dim(), (3, 40));

        let rebuilt = (&svd.u * &svd.s).dot(&svd.vt);
        for (x, y) in rebuilt.iter().zip(a.iter()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-10);
        }
    }

    #[test]
    fn pseudo_inverse_of_invertible_matrix_is_inverse() {
        let a = array![[4.0, 1.0], [2.0, 3.0]];
        let pinv = pseudo_inverse(&a).unwrap();
        let identity = a.dot(&pinv);
        assert_abs_diff_eq!(identity[[0, 0]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(identity[[0, 1]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(identity[[1, 0]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(identity[[1, 1]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn pseudo_inverse_satisfies_penrose_identity_for_rank_deficient_input() {
        // Second column is twice the first.
        let a = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]];
        let pinv = pseudo_inverse(&a).unwrap();
        assert_eq!(pinv.dim(), (2, 3));
        let roundtrip = a.dot(&pinv).dot(&a);
        for (x, y) in roundtrip.iter().zip(a.iter()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-10);
        }
    }

    #[test]
    fn significant_rank_uses_absolute_tolerance() {
        let s = array![3.0, 1e-3, 1e-10, 1e-12, 0.0];
        assert_eq!(significant_rank(&s), 2);
    }

    #[test]
    fn sample_covariance_matches_hand_computation() {
        let draws = array![[1.0, 2.0], [3.0, 6.0], [5.0, 7.0]];
        let means = column_means(&draws);
        assert_abs_diff_eq!(means[0], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(means[1], 5.0, epsilon = 1e-12);

        let cov = sample_covariance(&draws);
        // deviations: [-2,-3], [0,1], [2,2]
        assert_abs_diff_eq!(cov[[0, 0]], 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cov[[1, 1]], 7.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cov[[0, 1]], 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cov[[1, 0]], 5.0, epsilon = 1e-12);
    }
}
