use mice::config::{ImputeType, MiceConfig, VisitSequence};
use mice::engine::MiceImputer;
use mice::error::MiceError;
use mice::model::{BayesianRidge, FixedModel};
use ndarray::{Array2, array};

/// A small matrix with a linear relationship between columns and a handful
/// of missing cells, so the ridge model has real signal to fit.
fn linear_matrix_with_gaps() -> Array2<f64> {
    array![
        [1.0, 2.0, 3.0],
        [2.0, 4.0, f64::NAN],
        [3.0, f64::NAN, 9.0],
        [4.0, 8.0, 12.0],
        [f64::NAN, 10.0, 15.0],
        [6.0, 12.0, 18.0],
        [7.0, f64::NAN, 21.0],
        [8.0, 16.0, 24.0],
    ]
}

/// Column indices of the missing cells in row-major mask order.
fn missing_columns_in_order(x: &Array2<f64>) -> Vec<usize> {
    x.indexed_iter()
        .filter(|(_, v)| v.is_nan())
        .map(|((_, c), _)| c)
        .collect()
}

#[test]
fn deterministic_stub_end_to_end() {
    // 5x3, one missing cell in column 0. With a zero-variance stub the
    // posterior predictive draw degenerates to the stub's fixed output, so
    // the single imputed value is exactly that output.
    let x = array![
        [f64::NAN, 1.0, 2.0],
        [1.0, 2.0, 3.0],
        [2.0, 3.0, 4.0],
        [3.0, 4.0, 5.0],
        [4.0, 5.0, 6.0]
    ];
    let config = MiceConfig {
        n_burn_in: 1,
        n_imputations: 1,
        add_ones: false,
        verbose: false,
        seed: Some(1),
        ..MiceConfig::default()
    };
    let mut imputer = MiceImputer::new(config, FixedModel::new(7.5, 0.0)).unwrap();
    let completed = imputer.complete(x.view()).unwrap();
    assert_eq!(completed[[0, 0]], 7.5);
    // Observed cells pass through untouched.
    assert_eq!(completed[[1, 0]], 1.0);
    assert_eq!(completed[[4, 2]], 6.0);
}

#[test]
fn sample_collection_has_expected_shape() {
    let x = linear_matrix_with_gaps();
    let n_missing = x.iter().filter(|v| v.is_nan()).count();
    let config = MiceConfig {
        n_burn_in: 2,
        n_imputations: 3,
        verbose: false,
        seed: Some(2),
        ..MiceConfig::default()
    };
    let mut imputer = MiceImputer::new(config, BayesianRidge::default()).unwrap();
    let result = imputer.multiple_imputations(x.view()).unwrap();

    assert_eq!(result.samples.len(), 3);
    for sample in &result.samples {
        assert_eq!(sample.len(), n_missing);
        assert!(sample.iter().all(|v| v.is_finite()));
    }
    // The returned mask matches the input shape with the bias column gone.
    assert_eq!(result.missing_mask.dim(), x.dim());
    let mask_count = result.missing_mask.iter().filter(|m| **m).count();
    assert_eq!(mask_count, n_missing);
}

#[test]
fn completed_matrix_has_no_remaining_nans() {
    let x = linear_matrix_with_gaps();
    let config = MiceConfig {
        n_burn_in: 3,
        n_imputations: 5,
        verbose: false,
        seed: Some(3),
        ..MiceConfig::default()
    };
    let mut imputer = MiceImputer::new(config, BayesianRidge::default()).unwrap();
    let completed = imputer.complete(x.view()).unwrap();

    assert!(completed.iter().all(|v| v.is_finite()));
    for ((r, c), v) in x.indexed_iter() {
        if v.is_finite() {
            assert_eq!(completed[[r, c]], *v, "observed cell ({r},{c}) changed");
        }
    }
}

#[test]
fn pmm_only_places_originally_observed_values() {
    let x = linear_matrix_with_gaps();
    let config = MiceConfig {
        impute_type: ImputeType::Pmm,
        n_pmm_neighbors: 3,
        n_burn_in: 2,
        n_imputations: 4,
        verbose: false,
        seed: Some(4),
        ..MiceConfig::default()
    };
    let mut imputer = MiceImputer::new(config, BayesianRidge::default()).unwrap();
    let result = imputer.multiple_imputations(x.view()).unwrap();

    // Observed value sets per column of the original input.
    let observed: Vec<Vec<f64>> = (0..x.ncols())
        .map(|c| x.column(c).iter().copied().filter(|v| v.is_finite()).collect())
        .collect();
    let sample_cols = missing_columns_in_order(&x);
    for sample in &result.samples {
        for (value, col) in sample.iter().zip(&sample_cols) {
            assert!(
                observed[*col].contains(value),
                "PMM placed {value} into column {col}, which has no such observed value"
            );
        }
    }
}

#[test]
fn pmm_with_a_single_observed_value_copies_it() {
    // Column 1 has exactly one observed value; the neighbor pool clamps to
    // that lone row and every draw copies 42.0.
    let x = array![
        [1.0, 42.0],
        [2.0, f64::NAN],
        [3.0, f64::NAN],
        [4.0, f64::NAN]
    ];
    let config = MiceConfig {
        impute_type: ImputeType::Pmm,
        n_burn_in: 1,
        n_imputations: 2,
        verbose: false,
        seed: Some(6),
        ..MiceConfig::default()
    };
    let mut imputer = MiceImputer::new(config, BayesianRidge::default()).unwrap();
    let completed = imputer.complete(x.view()).unwrap();
    for row in 1..4 {
        assert_eq!(completed[[row, 1]], 42.0);
    }
}

#[test]
fn col_draws_follow_the_stub_distribution() {
    // One missing cell, a stub that always reports N(2, 4), and many
    // post-burn-in rounds: each round contributes one independent draw, so
    // the sample mean and standard deviation converge on 2 and 2.
    let x = array![
        [f64::NAN, 1.0],
        [1.0, 2.0],
        [2.0, 3.0],
        [3.0, 4.0]
    ];
    let n_rounds = 400;
    let config = MiceConfig {
        n_burn_in: 0,
        n_imputations: n_rounds,
        add_ones: false,
        verbose: false,
        seed: Some(7),
        ..MiceConfig::default()
    };
    let mut imputer = MiceImputer::new(config, FixedModel::new(2.0, 4.0)).unwrap();
    let result = imputer.multiple_imputations(x.view()).unwrap();
    assert_eq!(result.samples.len(), n_rounds);

    let draws: Vec<f64> = result.samples.iter().map(|s| s[0]).collect();
    let mean = draws.iter().sum::<f64>() / n_rounds as f64;
    let var = draws.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / (n_rounds - 1) as f64;
    assert!((mean - 2.0).abs() < 0.5, "sample mean {mean} too far from 2");
    assert!(
        (var.sqrt() - 2.0).abs() < 0.5,
        "sample sd {} too far from 2",
        var.sqrt()
    );
}

#[test]
fn fixed_seed_reproduces_the_run_exactly() {
    let x = linear_matrix_with_gaps();
    let config = MiceConfig {
        visit_sequence: VisitSequence::RevMonotone,
        n_burn_in: 2,
        n_imputations: 3,
        verbose: false,
        seed: Some(1234),
        ..MiceConfig::default()
    };
    let mut first = MiceImputer::new(config.clone(), BayesianRidge::default()).unwrap();
    let mut second = MiceImputer::new(config, BayesianRidge::default()).unwrap();

    let a = first.complete(x.view()).unwrap();
    let b = second.complete(x.view()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn predictor_subsetting_still_completes_the_matrix() {
    // Five informative columns with the cap at two forces the
    // correlation-weighted subsetting path on every visited column.
    let mut x = Array2::zeros((10, 5));
    for r in 0..10 {
        for c in 0..5 {
            x[[r, c]] = (r as f64 + 1.0) * (c as f64 + 1.0) + ((r * 3 + c) % 5) as f64 * 0.1;
        }
    }
    x[[1, 0]] = f64::NAN;
    x[[4, 2]] = f64::NAN;
    x[[7, 4]] = f64::NAN;

    let config = MiceConfig {
        n_nearest_columns: Some(2),
        n_burn_in: 2,
        n_imputations: 2,
        verbose: false,
        seed: Some(8),
        ..MiceConfig::default()
    };
    let mut imputer = MiceImputer::new(config, BayesianRidge::default()).unwrap();
    let completed = imputer.complete(x.view()).unwrap();
    assert!(completed.iter().all(|v| v.is_finite()));
}

#[test]
fn invalid_configuration_surfaces_before_running() {
    let config = MiceConfig {
        n_pmm_neighbors: 0,
        ..MiceConfig::default()
    };
    assert!(matches!(
        MiceImputer::new(config, BayesianRidge::default()),
        Err(MiceError::InvalidConfiguration(_))
    ));
}
