//! Randomized selection primitives used by the round executor.
//!
//! Both routines deliberately avoid full sorts: predictor subsetting uses
//! weighted reservoir sampling and neighbor selection uses an unordered
//! partial selection, keeping the per-column cost linear-to-linearithmic in
//! the number of candidates.

use crate::error::MiceError;
use rand::rngs::StdRng;
use rand::seq::index::sample_weighted;

/// Draws `amount` items from `candidates` without replacement, with
/// selection probability proportional to the matching entry of `weights`.
///
/// Non-finite weights (e.g. the NaN correlation of a zero-variance column)
/// are treated as zero. Fails with a numerical error when fewer than
/// `amount` candidates carry positive weight, rather than padding the draw
/// with columns the weights say carry no signal.
pub fn weighted_sample_without_replacement(
    candidates: &[usize],
    weights: &[f64],
    amount: usize,
    rng: &mut StdRng,
) -> Result<Vec<usize>, MiceError> {
    debug_assert_eq!(candidates.len(), weights.len());
    let sanitized: Vec<f64> = weights
        .iter()
        .map(|w| if w.is_finite() && *w > 0.0 { *w } else { 0.0 })
        .collect();
    let n_positive = sanitized.iter().filter(|w| **w > 0.0).count();
    if n_positive < amount {
        return Err(MiceError::Numerical(format!(
            "predictor subsetting needs {amount} columns with usable correlation weights, but only {n_positive} of {} candidates have one (the rest are zero or undefined)",
            candidates.len()
        )));
    }

    let picked = sample_weighted(rng, sanitized.len(), |i| sanitized[i], amount)
        .map_err(|e| MiceError::Numerical(format!("weighted predictor draw failed: {e}")))?;
    Ok(picked.iter().map(|i| candidates[i]).collect())
}

/// Returns the indices of the `k` smallest entries of `distances`, in no
/// particular order. `k` is clamped to the slice length.
pub fn k_nearest_indices(distances: &[f64], k: usize) -> Vec<usize> {
    let n = distances.len();
    let k = k.min(n);
    if k == 0 {
        return Vec::new();
    }
    let mut order: Vec<usize> = (0..n).collect();
    if k < n {
        order.select_nth_unstable_by(k - 1, |&a, &b| distances[a].total_cmp(&distances[b]));
        order.truncate(k);
    }
    order
}
