//! Error taxonomy for the imputation engine.
//!
//! Every validation failure is raised before the iterative loop starts, so a
//! returned error implies no caller-visible state was mutated unless the
//! failure came from the regression collaborator mid-round, in which case the
//! whole run is aborted. A silently-skipped column would corrupt the chain's
//! statistical validity, so nothing here is recoverable or retried.

use thiserror::Error;

/// All failure modes of configuration, validation, and the imputation chain.
#[derive(Error, Debug)]
pub enum MiceError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid input matrix: {0}")]
    InvalidInput(String),

    #[error(
        "Column {column} has no observed values. Every column needs at least one observed entry to seed initialization and fit a model."
    )]
    AllMissingColumn { column: usize },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Numerical error during imputation: {0}")]
    Numerical(String),

    #[error("The regression model was asked to predict before being fit.")]
    ModelNotFitted,

    #[error("A linear algebra operation failed. The system may be singular. Error: {0}")]
    LinearAlgebra(#[from] ndarray_linalg::error::LinalgError),
}
