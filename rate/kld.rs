//! Per-predictor Kullback-Leibler divergence.
//!
//! For predictor `q`, the precision `Lambda` is downdated with column `q` of the
//! effect covariance via the Sherman-Morrison identity, and the divergence is the
//! quadratic form of the cross terms between `q` and every other predictor under
//! the remaining block, weighted by `mu[q]^2 / 2`.
//!
//! Every evaluation works on its own copy of `Lambda`, so indices are independent
//! and can be evaluated on a worker pool. Results are always returned in
//! predictor order.

use crate::estimate::RateError;
use crate::progress::KldProgressObserver;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;

/// Read-only inputs shared by every per-predictor evaluation.
#[derive(Clone, Copy)]
pub struct KldInputs<'a> {
    pub mu: ArrayView1<'a, f64>,
    pub lambda: ArrayView2<'a, f64>,
    pub covariance: ArrayView2<'a, f64>,
}

impl KldInputs<'_> {
    pub fn num_predictors(&self) -> usize {
        self.mu.len()
    }
}

/// Sherman-Morrison rank-one update of an inverse.
///
/// If `a = B^{-1}`, returns `(B + u v^T)^{-1} = a - (a u)(v^T a) / (1 + v^T a u)`.
pub fn sherman_r(a: ArrayView2<f64>, u: ArrayView1<f64>, v: ArrayView1<f64>) -> Array2<f64> {
    let a_u = a.dot(&u);
    let v_a = v.dot(&a);
    let denom = 1.0 + v.dot(&a_u);

    let outer = a_u
        .insert_axis(Axis(1))
        .dot(&v_a.insert_axis(Axis(0)));
    let mut updated = a.to_owned();
    updated.scaled_add(-1.0 / denom, &outer);
    updated
}

/// Divergence contribution of predictor `q`.
pub fn calc_kld(inputs: &KldInputs<'_>, q: usize) -> f64 {
    let p = inputs.num_predictors();
    if p < 2 {
        // No other predictor to carry cross terms.
        return 0.0;
    }
    let column = inputs.covariance.column(q);
    let updated = sherman_r(inputs.lambda, column, column);

    let others: Vec<usize> = (0..p).filter(|&i| i != q).collect();
    let cross = updated.column(q).select(Axis(0), &others);
    let block = updated.select(Axis(0), &others).select(Axis(1), &others);
    let alpha = cross.dot(&block.dot(&cross));

    // The downdated precision is PSD, so any negative alpha is round-off.
    // NaN passes through so aggregation can reject it.
    let kld = inputs.mu[q].powi(2) * alpha * 0.5;
    if kld < 0.0 { 0.0 } else { kld }
}

/// Evaluates every predictor on the calling thread, reporting progress per index.
pub fn compute_kld_sequential(
    inputs: &KldInputs<'_>,
    progress: &mut dyn KldProgressObserver,
) -> Array1<f64> {
    let p = inputs.num_predictors();
    progress.on_start(p);
    let mut kld = Array1::zeros(p);
    for q in 0..p {
        kld[q] = calc_kld(inputs, q);
        log::trace!("KLD({q}) = {}", kld[q]);
        progress.on_advance(q + 1);
    }
    progress.on_finish();
    kld
}

/// Evaluates every predictor on a dedicated pool of `workers` threads.
pub fn compute_kld_parallel(inputs: &KldInputs<'_>, workers: usize) -> Result<Array1<f64>, RateError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|index| format!("rate-kld-{index}"))
        .build()?;
    log::debug!(
        "Dispatching {} KLD evaluations across {workers} workers",
        inputs.num_predictors()
    );
    let kld: Vec<f64> = pool.install(|| {
        (0..inputs.num_predictors())
            .into_par_iter()
            .map(|q| calc_kld(inputs, q))
            .collect()
    });
    Ok(Array1::from(kld))
}
