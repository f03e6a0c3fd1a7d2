//! Configuration for an imputation run.
//!
//! All options are validated when the imputer is constructed, never mid-run.
//! The enum options (`VisitSequence`, `ImputeType`) parse from their string
//! names through `FromStr`, and an unrecognized name fails right there with
//! `InvalidConfiguration` rather than being deferred or silently ignored.

use crate::error::MiceError;
use std::fmt;
use std::str::FromStr;

/// The order in which columns are visited within one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitSequence {
    /// Ascending column index.
    Roman,
    /// Descending column index.
    Arabic,
    /// Most-missing columns first.
    Monotone,
    /// Least-missing columns first.
    RevMonotone,
}

impl FromStr for VisitSequence {
    type Err = MiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "roman" => Ok(Self::Roman),
            "arabic" => Ok(Self::Arabic),
            "monotone" => Ok(Self::Monotone),
            "revmonotone" => Ok(Self::RevMonotone),
            other => Err(MiceError::InvalidConfiguration(format!(
                "invalid choice for visit order: '{other}' (expected one of roman, arabic, monotone, revmonotone)"
            ))),
        }
    }
}

impl fmt::Display for VisitSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Roman => "roman",
            Self::Arabic => "arabic",
            Self::Monotone => "monotone",
            Self::RevMonotone => "revmonotone",
        };
        f.write_str(name)
    }
}

/// How replacement values are drawn for a column's missing rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImputeType {
    /// Sample each missing row from Normal(mean, sqrt(variance)) given by the
    /// model's posterior predictive distribution.
    Col,
    /// Predictive mean matching: copy the actual observed value of the column
    /// from one of the k observed rows whose predictions lie closest to the
    /// missing row's (stochastic) prediction.
    Pmm,
}

impl FromStr for ImputeType {
    type Err = MiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "col" => Ok(Self::Col),
            "pmm" => Ok(Self::Pmm),
            other => Err(MiceError::InvalidConfiguration(format!(
                "invalid choice for impute type: '{other}' (expected 'col' or 'pmm')"
            ))),
        }
    }
}

impl fmt::Display for ImputeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Col => "col",
            Self::Pmm => "pmm",
        })
    }
}

/// Options controlling one imputation run.
#[derive(Debug, Clone)]
pub struct MiceConfig {
    /// Column visit order policy.
    pub visit_sequence: VisitSequence,
    /// Number of post-burn-in rounds, each contributing one sample.
    pub n_imputations: usize,
    /// Number of initial rounds discarded while the chain mixes.
    pub n_burn_in: usize,
    /// Neighbor pool size for predictive mean matching. Must be positive.
    pub n_pmm_neighbors: usize,
    /// Draw strategy for missing rows.
    pub impute_type: ImputeType,
    /// Append a constant column of ones so every fit carries an intercept.
    pub add_ones: bool,
    /// Cap on predictor columns per fit; `None` uses all other columns.
    /// When the cap binds, predictors are sampled with probability
    /// proportional to their absolute Pearson correlation with the target
    /// column. Must be positive when set.
    pub n_nearest_columns: Option<usize>,
    /// Log one progress line per round. No behavioral effect.
    pub verbose: bool,
    /// Seed for the run's random source. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for MiceConfig {
    fn default() -> Self {
        Self {
            visit_sequence: VisitSequence::Monotone,
            n_imputations: 100,
            n_burn_in: 10,
            n_pmm_neighbors: 5,
            impute_type: ImputeType::Col,
            add_ones: true,
            n_nearest_columns: None,
            verbose: true,
            seed: None,
        }
    }
}

impl MiceConfig {
    /// Checks option values that the type system cannot rule out.
    pub fn validate(&self) -> Result<(), MiceError> {
        if self.n_pmm_neighbors == 0 {
            return Err(MiceError::InvalidConfiguration(
                "n_pmm_neighbors must be a positive integer".to_string(),
            ));
        }
        if self.n_nearest_columns == Some(0) {
            return Err(MiceError::InvalidConfiguration(
                "n_nearest_columns must be a positive integer when set".to_string(),
            ));
        }
        Ok(())
    }
}
