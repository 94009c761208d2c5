//! Reduced-rank kernel approximation and tree-ordered diagonal factor.

use ndarray::Array2;

use crate::basis::TreeletModel;
use crate::error::{Error, Result};
use crate::transform::transform;

/// Rank-reduced similarity matrix: the orthogonal transform applied to both
/// the row space and the column space of A₀, retaining k coarse directions.
pub fn reduced_kernel(model: &TreeletModel, a0: &Array2<f64>, k: isize) -> Result<Array2<f64>> {
    let rows = transform(model, &a0.t().to_owned(), k)?;
    transform(model, &rows.t().to_owned(), k)
}

/// Tree-ordered diagonal factor of a symmetric matrix `m`.
///
/// With rows and columns reordered into the merge order imposed by the tree
/// (each merge's absorbed slot in sequence, the root last), the factor is
/// the elementwise square root of the reordered diagonal; its rows are then
/// permuted back into original sample order. This assumes the treelet
/// ordering has already concentrated variance on the diagonal — it is not a
/// general Cholesky factorization.
pub fn decompose(model: &TreeletModel, m: &Array2<f64>) -> Result<Array2<f64>> {
    let n = model.n();
    if m.nrows() != n || m.ncols() != n {
        return Err(Error::DimensionMismatch {
            expected: n,
            found: if m.nrows() != n { m.nrows() } else { m.ncols() },
        });
    }

    // Forward order: absorbed slot of each merge, root last. Absorbed slots
    // are distinct and the root is never absorbed, so this is a permutation.
    let forward: Vec<usize> = model
        .tree()
        .iter()
        .map(|merge| merge.absorbed)
        .chain(std::iter::once(model.root()))
        .collect();

    let mut backward = vec![0usize; n];
    for (pos, &slot) in forward.iter().enumerate() {
        backward[slot] = pos;
    }
    debug_assert!(
        forward.iter().enumerate().all(|(pos, &slot)| backward[slot] == pos),
        "tree ordering permutations must be exact inverses"
    );

    let mut l = Array2::zeros((n, n));
    for (pos, &slot) in forward.iter().enumerate() {
        l[[slot, pos]] = m[[slot, slot]].sqrt();
    }
    Ok(l)
}
