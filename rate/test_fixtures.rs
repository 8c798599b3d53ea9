//! Test fixtures and builders for RATE tests.
//!
//! Generates a design matrix together with matching effect-size and
//! function-space posterior draws, so every entry path can be exercised on the
//! same underlying data.

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Synthetic inputs for a RATE computation.
#[derive(Clone)]
pub struct SyntheticRateData {
    /// Design matrix (n_samples × n_predictors), i.i.d. standard normal.
    pub x: Array2<f64>,
    /// Effect-size draws (n_draws × n_predictors).
    pub beta_draws: Array2<f64>,
    /// Function-space draws `beta_draws @ x^T` plus noise (n_draws × n_samples).
    pub f_draws: Array2<f64>,
}

impl SyntheticRateData {
    pub fn builder() -> SyntheticRateBuilder {
        SyntheticRateBuilder::default()
    }
}

/// Builder for creating synthetic RATE inputs with configurable properties.
pub struct SyntheticRateBuilder {
    n_samples: usize,
    n_predictors: usize,
    n_draws: usize,
    effect_means: Option<Vec<f64>>,
    effect_sds: Option<Vec<f64>>,
    correlation: f64,
    function_noise: f64,
    seed: u64,
}

impl Default for SyntheticRateBuilder {
    fn default() -> Self {
        Self {
            n_samples: 50,
            n_predictors: 3,
            n_draws: 200,
            effect_means: None,
            effect_sds: None,
            correlation: 0.0,
            function_noise: 0.05,
            seed: 0,
        }
    }
}

impl SyntheticRateBuilder {
    pub fn samples(mut self, n: usize) -> Self {
        self.n_samples = n;
        self
    }

    pub fn predictors(mut self, p: usize) -> Self {
        self.n_predictors = p;
        self
    }

    pub fn draws(mut self, n: usize) -> Self {
        self.n_draws = n;
        self
    }

    /// Posterior mean of each effect size (defaults to 1.0 for every predictor).
    pub fn effect_means(mut self, means: Vec<f64>) -> Self {
        self.effect_means = Some(means);
        self
    }

    /// Posterior standard deviation of each effect size (defaults to 1.0).
    pub fn effect_sds(mut self, sds: Vec<f64>) -> Self {
        self.effect_sds = Some(sds);
        self
    }

    /// Shared correlation between every pair of effect sizes, in [0, 1).
    pub fn correlation(mut self, rho: f64) -> Self {
        self.correlation = rho;
        self
    }

    pub fn function_noise(mut self, sd: f64) -> Self {
        self.function_noise = sd;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn build(self) -> SyntheticRateData {
        let p = self.n_predictors;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let means = Array1::from(self.effect_means.unwrap_or_else(|| vec![1.0; p]));
        let sds = Array1::from(self.effect_sds.unwrap_or_else(|| vec![1.0; p]));
        assert_eq!(means.len(), p, "one effect mean per predictor");
        assert_eq!(sds.len(), p, "one effect sd per predictor");

        let x = Array2::from_shape_fn((self.n_samples, p), |_| {
            rng.sample::<f64, _>(StandardNormal)
        });

        // One-factor model: z_j = sqrt(rho) g + sqrt(1 - rho) e_j has unit
        // variance and pairwise correlation rho.
        let shared = self.correlation.sqrt();
        let own = (1.0 - self.correlation).sqrt();
        let mut beta_draws = Array2::zeros((self.n_draws, p));
        for mut row in beta_draws.rows_mut() {
            let g: f64 = rng.sample(StandardNormal);
            for j in 0..p {
                let e: f64 = rng.sample(StandardNormal);
                row[j] = means[j] + sds[j] * (shared * g + own * e);
            }
        }

        let noise = Array2::from_shape_fn((self.n_draws, self.n_samples), |_| {
            self.function_noise * rng.sample::<f64, _>(StandardNormal)
        });
        let f_draws = beta_draws.dot(&x.t()) + noise;

        SyntheticRateData {
            x,
            beta_draws,
            f_draws,
        }
    }
}
