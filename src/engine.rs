//! The chained-equations imputation engine.
//!
//! One `MiceImputer` owns a configuration and a regression model and runs the
//! whole procedure: derive the missing mask, plan the column visit order,
//! seed the chain with marginal draws, then cycle `n_burn_in + n_imputations`
//! rounds in which every incomplete column is refit on the others and its
//! missing cells redrawn. Updates made earlier in a pass are visible to later
//! columns in the same pass, which is what makes the scheme Gibbs-like.
//!
//! All validation happens before the loop touches anything; errors raised by
//! the regression model mid-round abort the run unchanged.

use crate::config::{ImputeType, MiceConfig, VisitSequence};
use crate::error::MiceError;
use crate::model::RegressionModel;
use crate::sampling::{k_nearest_indices, weighted_sample_without_replacement};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand_distr::{Distribution, Normal};

/// Everything `multiple_imputations` returns: one flat sample per
/// post-burn-in round plus the mask tying sample positions to matrix cells.
#[derive(Debug, Clone)]
pub struct ImputationResult {
    /// One entry per post-burn-in round. Each array holds the values drawn
    /// for the missing cells during that round, in row-major mask order, so
    /// every sample has identical length and positional correspondence.
    pub samples: Vec<Array1<f64>>,
    /// True where the input was missing. Same shape as the input (the
    /// synthetic bias column, if any, is stripped before returning).
    pub missing_mask: Array2<bool>,
}

/// Driver for one-or-many chained-equation imputations of a matrix.
pub struct MiceImputer<M: RegressionModel> {
    config: MiceConfig,
    model: M,
}

impl<M: RegressionModel> MiceImputer<M> {
    /// Validates the configuration eagerly; an invalid option never reaches
    /// the iterative loop.
    pub fn new(config: MiceConfig, model: M) -> Result<Self, MiceError> {
        config.validate()?;
        Ok(Self { config, model })
    }

    /// Runs the full chain and returns every post-burn-in draw.
    ///
    /// Missing entries of `x` are marked with `NaN`. The input itself is
    /// never mutated; the engine works on a copy.
    pub fn multiple_imputations(
        &mut self,
        x: ArrayView2<f64>,
    ) -> Result<ImputationResult, MiceError> {
        validate_input(x)?;
        let missing_mask = x.mapv(|v| v.is_nan());
        let visit = visit_indices(&missing_mask, self.config.visit_sequence);

        // The bias column is appended after the visit order is fixed, so it
        // is never visited: it has no missing entries by construction.
        let mut x_filled = x.to_owned();
        let mut mask = missing_mask.clone();
        if self.config.add_ones {
            let n_rows = x_filled.nrows();
            x_filled
                .push_column(Array1::ones(n_rows).view())
                .map_err(|e| MiceError::InvalidInput(e.to_string()))?;
            mask.push_column(Array1::from_elem(n_rows, false).view())
                .map_err(|e| MiceError::InvalidInput(e.to_string()))?;
        }

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        initialize(&mut x_filled, &mask, &visit, &mut rng);

        let total_rounds = self.config.n_burn_in + self.config.n_imputations;
        let mut samples = Vec::with_capacity(self.config.n_imputations);
        for round in 0..total_rounds {
            if self.config.verbose {
                log::info!("imputation round {}/{}", round + 1, total_rounds);
            }
            self.imputation_round(&mut x_filled, &mask, &visit, &mut rng)?;
            if round >= self.config.n_burn_in {
                // Row-major mask order; the bias column is all-false so the
                // sequence matches the stripped mask exactly.
                let values: Vec<f64> = mask
                    .indexed_iter()
                    .filter(|(_, m)| **m)
                    .map(|((r, c), _)| x_filled[[r, c]])
                    .collect();
                samples.push(Array1::from_vec(values));
            }
        }

        Ok(ImputationResult {
            samples,
            missing_mask,
        })
    }

    /// Runs the chain and averages the post-burn-in draws into a single
    /// completed copy of the input.
    pub fn complete(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>, MiceError> {
        if self.config.n_imputations == 0 {
            return Err(MiceError::InsufficientData(
                "cannot average imputations: n_imputations is 0, so no post-burn-in samples would be collected".to_string(),
            ));
        }
        let result = self.multiple_imputations(x)?;
        let n_samples = result.samples.len() as f64;
        let n_missing = result.samples.first().map_or(0, |s| s.len());
        let mut means = Array1::<f64>::zeros(n_missing);
        for sample in &result.samples {
            means += sample;
        }
        means /= n_samples;

        let mut completed = x.to_owned();
        let mut next = means.iter();
        for ((r, c), missing) in result.missing_mask.indexed_iter() {
            if *missing {
                // Same row-major order the samples were collected in.
                completed[[r, c]] = *next.next().ok_or_else(|| {
                    MiceError::Numerical(
                        "imputation sample shorter than the missing-cell count".to_string(),
                    )
                })?;
            }
        }
        Ok(completed)
    }

    /// One full pass over the columns in visit order.
    fn imputation_round(
        &mut self,
        x_filled: &mut Array2<f64>,
        mask: &Array2<bool>,
        visit: &[usize],
        rng: &mut StdRng,
    ) -> Result<(), MiceError> {
        let n_cols = x_filled.ncols();
        let n_bias = usize::from(self.config.add_ones);

        // Subsetting binds only when a column would otherwise see more
        // predictors (bias excluded) than the configured cap.
        let n_predictors = n_cols - n_bias - 1;
        let subset_size = match self.config.n_nearest_columns {
            Some(cap) if n_predictors > cap => Some(cap),
            _ => None,
        };
        // The correlation matrix reflects the values at the start of the
        // round; it is not refreshed as columns are updated mid-pass.
        let correlation = match subset_size {
            Some(_) => Some(abs_correlation_matrix(x_filled.view())),
            None => None,
        };

        for &col in visit {
            let missing_rows: Vec<usize> = (0..x_filled.nrows())
                .filter(|&r| mask[[r, col]])
                .collect();
            if missing_rows.is_empty() {
                continue;
            }
            let observed_rows: Vec<usize> = (0..x_filled.nrows())
                .filter(|&r| !mask[[r, col]])
                .collect();

            let predictor_cols = match (subset_size, &correlation) {
                (Some(cap), Some(corr)) => {
                    // Bias never enters the weighted draw; it is appended
                    // back afterward so every fit keeps its intercept.
                    let candidates: Vec<usize> = (0..n_cols - n_bias).filter(|&c| c != col).collect();
                    let weights: Vec<f64> = candidates.iter().map(|&c| corr[[col, c]]).collect();
                    let mut picked =
                        weighted_sample_without_replacement(&candidates, &weights, cap, rng)?;
                    if self.config.add_ones {
                        picked.push(n_cols - 1);
                    }
                    picked
                }
                _ => (0..n_cols).filter(|&c| c != col).collect(),
            };

            let train_inputs = gather(x_filled, &observed_rows, &predictor_cols);
            let train_targets =
                Array1::from_iter(observed_rows.iter().map(|&r| x_filled[[r, col]]));
            self.model.fit(train_inputs.view(), train_targets.view())?;

            let missing_inputs = gather(x_filled, &missing_rows, &predictor_cols);
            let drawn = match self.config.impute_type {
                ImputeType::Col => {
                    let (means, variances) = self.model.predict_dist(missing_inputs.view())?;
                    let mut values = Vec::with_capacity(missing_rows.len());
                    for (mean, variance) in means.iter().zip(variances.iter()) {
                        // Round-off can push a predictive variance a hair
                        // below zero; a zero variance degenerates to the mean.
                        let sd = variance.max(0.0).sqrt();
                        let normal = Normal::new(*mean, sd).map_err(|e| {
                            MiceError::Numerical(format!(
                                "posterior predictive draw failed for column {col}: {e}"
                            ))
                        })?;
                        values.push(normal.sample(rng));
                    }
                    values
                }
                ImputeType::Pmm => {
                    let stochastic = self.model.predict(missing_inputs.view(), true, rng)?;
                    let anchors = self.model.predict(train_inputs.view(), false, rng)?;
                    let k = self
                        .config
                        .n_pmm_neighbors
                        .min(observed_rows.len().saturating_sub(1))
                        .max(1);
                    let mut values = Vec::with_capacity(missing_rows.len());
                    for pred in stochastic.iter() {
                        let distances: Vec<f64> =
                            anchors.iter().map(|a| (pred - a).abs()).collect();
                        let neighbors = k_nearest_indices(&distances, k);
                        let chosen = neighbors.choose(rng).ok_or_else(|| {
                            MiceError::InsufficientData(format!(
                                "column {col} has no observed rows to match against"
                            ))
                        })?;
                        // The neighbor's actual observed value, never a
                        // prediction: PMM preserves the empirical
                        // distribution of the column.
                        values.push(x_filled[[observed_rows[*chosen], col]]);
                    }
                    values
                }
            };

            for (&row, value) in missing_rows.iter().zip(drawn) {
                x_filled[[row, col]] = value;
            }
        }
        Ok(())
    }
}

/// Rejects inputs the chain cannot work with, before any state is created.
fn validate_input(x: ArrayView2<f64>) -> Result<(), MiceError> {
    let (n_rows, n_cols) = x.dim();
    if n_rows == 0 || n_cols == 0 {
        return Err(MiceError::InvalidInput(format!(
            "matrix must have at least one row and one column, got {n_rows}x{n_cols}"
        )));
    }
    if x.iter().any(|v| v.is_infinite()) {
        return Err(MiceError::InvalidInput(
            "matrix contains infinite values; missing entries must be NaN and observed entries finite".to_string(),
        ));
    }
    for (col, column) in x.axis_iter(Axis(1)).enumerate() {
        if column.iter().all(|v| v.is_nan()) {
            return Err(MiceError::AllMissingColumn { column: col });
        }
    }
    Ok(())
}

/// Plans the column visit order from the missing mask. Computed once per run
/// and reused by the initializer and every round. Ties under the monotone
/// policies are broken by the stable sort, i.e. by ascending index.
fn visit_indices(mask: &Array2<bool>, policy: VisitSequence) -> Vec<usize> {
    let n_cols = mask.ncols();
    match policy {
        VisitSequence::Roman => (0..n_cols).collect(),
        VisitSequence::Arabic => (0..n_cols).rev().collect(),
        VisitSequence::Monotone | VisitSequence::RevMonotone => {
            let counts: Vec<usize> = mask
                .axis_iter(Axis(1))
                .map(|col| col.iter().filter(|m| **m).count())
                .collect();
            let mut order: Vec<usize> = (0..n_cols).collect();
            match policy {
                VisitSequence::Monotone => order.sort_by(|&a, &b| counts[b].cmp(&counts[a])),
                _ => order.sort_by(|&a, &b| counts[a].cmp(&counts[b])),
            }
            order
        }
    }
}

/// Seeds the chain: every missing cell receives a uniform with-replacement
/// draw from its own column's observed values. Marginal information only; no
/// cross-column model is fit here.
fn initialize(
    x_filled: &mut Array2<f64>,
    mask: &Array2<bool>,
    visit: &[usize],
    rng: &mut StdRng,
) {
    for &col in visit {
        let observed: Vec<f64> = (0..x_filled.nrows())
            .filter(|&r| !mask[[r, col]])
            .map(|r| x_filled[[r, col]])
            .collect();
        if observed.len() == x_filled.nrows() {
            continue;
        }
        for row in 0..x_filled.nrows() {
            if mask[[row, col]] {
                // Observed set is non-empty: all-missing columns were
                // rejected during validation.
                if let Some(value) = observed.choose(rng) {
                    x_filled[[row, col]] = *value;
                }
            }
        }
    }
}

/// Absolute Pearson correlation between all column pairs. Zero-variance
/// columns yield NaN entries; the weighted draw treats those as zero weight.
fn abs_correlation_matrix(x: ArrayView2<f64>) -> Array2<f64> {
    let n_cols = x.ncols();
    let means = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(n_cols));
    let mut centered = x.to_owned();
    for (mut col, mean) in centered.axis_iter_mut(Axis(1)).zip(means.iter()) {
        col.mapv_inplace(|v| v - mean);
    }
    let cross = centered.t().dot(&centered);
    let mut corr = Array2::zeros((n_cols, n_cols));
    for i in 0..n_cols {
        for j in 0..n_cols {
            corr[[i, j]] = (cross[[i, j]] / (cross[[i, i]] * cross[[j, j]]).sqrt()).abs();
        }
    }
    corr
}

/// Copies the submatrix at the given rows and columns into a dense array.
fn gather(x: &Array2<f64>, rows: &[usize], cols: &[usize]) -> Array2<f64> {
    Array2::from_shape_fn((rows.len(), cols.len()), |(i, j)| x[[rows[i], cols[j]]])
}
