//! Application of the rotation sequence to row vectors.
//!
//! Coarsening a matrix means replaying the merge history: each rotation
//! mixes two rows, and every step reads the rows left by the previous
//! step. The sweep is an intentionally sequential reduction over an owned
//! buffer — it must not be parallelized across steps. Columns within one
//! step are independent.

use ndarray::Array2;

use crate::basis::TreeletModel;
use crate::error::{Error, Result};

/// Number of rotation steps to apply for a retained rank `k`.
///
/// `k` counts the final, coarsest steps to skip: `k = 1` applies all n−1
/// steps, `k = n` applies none. Nonpositive `k` wraps as `n + k`, so the
/// conventional `k = -1` retains n−1 coarse directions and applies a
/// single step. Out-of-range values clamp to `[0, n−1]` steps.
pub(crate) fn steps_for_rank(n: usize, k: isize) -> usize {
    let rank = if k <= 0 { n as isize + k } else { k };
    (n as isize - rank).clamp(0, n.saturating_sub(1) as isize) as usize
}

/// Apply the first n−k rotation steps of `model` to the rows of `v`.
///
/// `v` must have exactly n rows (any number of columns); the result is a
/// new matrix whose early-surviving rows carry coarse merged components
/// and whose retired rows carry fine-scale residual directions.
pub fn transform(model: &TreeletModel, v: &Array2<f64>, k: isize) -> Result<Array2<f64>> {
    let n = model.n();
    if v.nrows() != n {
        return Err(Error::DimensionMismatch {
            expected: n,
            found: v.nrows(),
        });
    }

    let steps = steps_for_rank(n, k);
    let mut out = v.clone();
    for step in &model.rotations()[..steps] {
        for col in 0..out.ncols() {
            let vi = out[[step.i, col]];
            let vj = out[[step.j, col]];
            out[[step.i, col]] = step.cos * vi - step.sin * vj;
            out[[step.j, col]] = step.sin * vi + step.cos * vj;
        }
    }
    Ok(out)
}
