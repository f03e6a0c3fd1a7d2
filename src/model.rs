//! The per-column regression collaborator.
//!
//! The chained-equations engine never looks inside the regression model; it
//! consumes the `RegressionModel` capability and nothing else. One model
//! instance is owned by the imputer and refit from scratch for every column
//! in every round, so no per-column state survives between rounds.
//!
//! `BayesianRidge` is the default implementation: ridge regression with a
//! Gaussian posterior over coefficients, which is what gives `predict` its
//! `random_draw` mode (a draw from the coefficient posterior) and
//! `predict_dist` its per-row predictive variance.

use crate::error::MiceError;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use ndarray_linalg::{Cholesky, InverseH, UPLO};
use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal};

/// Capability contract the imputation engine consumes.
///
/// `fit` is side-effecting on the model instance. `predict` with
/// `random_draw = true` first draws one coefficient vector from the
/// posterior, then produces point predictions under that draw; with
/// `random_draw = false` it uses the posterior mean. `predict_dist` returns
/// the posterior predictive `(mean, variance)` per input row.
pub trait RegressionModel {
    fn fit(&mut self, inputs: ArrayView2<f64>, targets: ArrayView1<f64>) -> Result<(), MiceError>;

    fn predict(
        &self,
        inputs: ArrayView2<f64>,
        random_draw: bool,
        rng: &mut StdRng,
    ) -> Result<Array1<f64>, MiceError>;

    fn predict_dist(
        &self,
        inputs: ArrayView2<f64>,
    ) -> Result<(Array1<f64>, Array1<f64>), MiceError>;
}

/// State computed by one `BayesianRidge::fit` call.
#[derive(Debug, Clone)]
struct RidgePosterior {
    /// Posterior mean of the coefficients.
    beta: Array1<f64>,
    /// (XᵀX + λ·scale·I)⁻¹, the unscaled posterior covariance.
    precision_inv: Array2<f64>,
    /// Lower Cholesky factor of `precision_inv`, for coefficient draws.
    precision_inv_chol: Array2<f64>,
    /// Residual noise variance σ².
    noise_variance: f64,
}

/// Bayesian ridge regression.
///
/// The penalty `lambda` is scaled by the Frobenius norm of XᵀX at fit time,
/// so a single default works across wildly different column scales. With
/// A = XᵀX + λ‖XᵀX‖·I the posterior over coefficients is
/// N(A⁻¹Xᵀy, σ²A⁻¹) and the predictive variance for a row x is
/// σ²(1 + xᵀA⁻¹x).
#[derive(Debug, Clone)]
pub struct BayesianRidge {
    lambda: f64,
    posterior: Option<RidgePosterior>,
}

impl BayesianRidge {
    /// Creates a model with the given ridge penalty. Sensible values to try:
    /// 0.25, 0.1, 0.01, 0.001, 0.0001.
    pub fn new(lambda: f64) -> Self {
        Self {
            lambda,
            posterior: None,
        }
    }

    fn posterior(&self) -> Result<&RidgePosterior, MiceError> {
        self.posterior.as_ref().ok_or(MiceError::ModelNotFitted)
    }
}

impl Default for BayesianRidge {
    fn default() -> Self {
        Self::new(0.001)
    }
}

impl RegressionModel for BayesianRidge {
    fn fit(&mut self, inputs: ArrayView2<f64>, targets: ArrayView1<f64>) -> Result<(), MiceError> {
        let (n_rows, n_cols) = inputs.dim();
        if n_rows == 0 || n_cols == 0 {
            return Err(MiceError::InsufficientData(format!(
                "cannot fit a regression on a {n_rows}x{n_cols} input"
            )));
        }
        if targets.len() != n_rows {
            return Err(MiceError::InvalidInput(format!(
                "target length {} does not match {} input rows",
                targets.len(),
                n_rows
            )));
        }

        let xtx = inputs.t().dot(&inputs);
        let xty = inputs.t().dot(&targets);

        // Frobenius norm of XᵀX; falls back to an unscaled penalty when the
        // inputs are all zero so the system stays invertible.
        let mut scale = xtx.iter().map(|v| v * v).sum::<f64>().sqrt();
        if scale <= 0.0 {
            scale = 1.0;
        }

        let mut regularized = xtx;
        for i in 0..n_cols {
            regularized[[i, i]] += self.lambda * scale;
        }

        let precision_inv = regularized.invh()?;
        let beta = precision_inv.dot(&xty);
        let precision_inv_chol = precision_inv.cholesky(UPLO::Lower)?;

        let residuals = &targets.to_owned() - &inputs.dot(&beta);
        let dof = n_rows.saturating_sub(n_cols).max(1) as f64;
        let noise_variance = residuals.iter().map(|r| r * r).sum::<f64>() / dof;

        self.posterior = Some(RidgePosterior {
            beta,
            precision_inv,
            precision_inv_chol,
            noise_variance,
        });
        Ok(())
    }

    fn predict(
        &self,
        inputs: ArrayView2<f64>,
        random_draw: bool,
        rng: &mut StdRng,
    ) -> Result<Array1<f64>, MiceError> {
        let posterior = self.posterior()?;
        let beta = if random_draw {
            // β ~ N(β̂, σ²A⁻¹): β̂ + σ·L·z with L the Cholesky factor of A⁻¹.
            let sigma = posterior.noise_variance.sqrt();
            let z: Array1<f64> = Array1::from_iter(
                (0..posterior.beta.len()).map(|_| StandardNormal.sample(rng)),
            );
            &posterior.beta + &(posterior.precision_inv_chol.dot(&z) * sigma)
        } else {
            posterior.beta.clone()
        };
        Ok(inputs.dot(&beta))
    }

    fn predict_dist(
        &self,
        inputs: ArrayView2<f64>,
    ) -> Result<(Array1<f64>, Array1<f64>), MiceError> {
        let posterior = self.posterior()?;
        let means = inputs.dot(&posterior.beta);
        let variances = Array1::from_iter(inputs.rows().into_iter().map(|row| {
            let quad = row.dot(&posterior.precision_inv.dot(&row));
            posterior.noise_variance * (1.0 + quad)
        }));
        Ok((means, variances))
    }
}

/// Deterministic model for tests: ignores its training data and predicts a
/// fixed mean (and variance) for every row.
#[derive(Debug, Clone)]
pub struct FixedModel {
    pub mean: f64,
    pub variance: f64,
}

impl FixedModel {
    pub fn new(mean: f64, variance: f64) -> Self {
        Self { mean, variance }
    }
}

impl RegressionModel for FixedModel {
    fn fit(&mut self, _inputs: ArrayView2<f64>, _targets: ArrayView1<f64>) -> Result<(), MiceError> {
        Ok(())
    }

    fn predict(
        &self,
        inputs: ArrayView2<f64>,
        _random_draw: bool,
        _rng: &mut StdRng,
    ) -> Result<Array1<f64>, MiceError> {
        Ok(Array1::from_elem(inputs.nrows(), self.mean))
    }

    fn predict_dist(
        &self,
        inputs: ArrayView2<f64>,
    ) -> Result<(Array1<f64>, Array1<f64>), MiceError> {
        Ok((
            Array1::from_elem(inputs.nrows(), self.mean),
            Array1::from_elem(inputs.nrows(), self.variance),
        ))
    }
}
