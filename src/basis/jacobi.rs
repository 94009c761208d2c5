//! Default treelet builder: pairwise Jacobi rotations on the similarity
//! matrix.
//!
//! The classic treelet sweep (Lee, Nadler, Wasserman 2008): at each level
//! pick the two most correlated active directions, cancel their
//! off-diagonal entry with a 2D Jacobi rotation, keep the higher-variance
//! direction active, and retire the other. n−1 levels produce a full
//! hierarchy.
//!
//! Ships as the bundled [`TreeletBuilder`] so the crate works out of the
//! box; any other builder can be swapped in behind the trait.

use log::debug;
use ndarray::Array2;

use super::{MergeStep, RotationStep, TreeletBuilder, TreeletModel};
use crate::error::{Error, Result};

/// Treelet construction by iterated 2×2 Jacobi rotations.
#[derive(Debug, Clone, Copy, Default)]
pub struct JacobiTreelets;

impl TreeletBuilder for JacobiTreelets {
    fn build(&self, similarity: &Array2<f64>) -> Result<TreeletModel> {
        let n = similarity.nrows();
        if n == 0 {
            return Err(Error::EmptyInput);
        }
        if similarity.ncols() != n {
            return Err(Error::DimensionMismatch {
                expected: n,
                found: similarity.ncols(),
            });
        }

        let mut a = similarity.clone();
        let mut active = vec![true; n];
        let mut rotations = Vec::with_capacity(n - 1);
        let mut tree = Vec::with_capacity(n - 1);
        let mut diagnostics = Vec::with_capacity(n - 1);
        let mut root = 0;

        for level in 0..n.saturating_sub(1) {
            let (p, q) = select_pair(&a, &active);
            let apq = a[[p, q]];

            // Angle cancelling a[p][q] under the convention
            // v[p]' = cos·v[p] − sin·v[q], v[q]' = sin·v[p] + cos·v[q].
            let theta = 0.5 * (2.0 * apq).atan2(a[[q, q]] - a[[p, p]]);
            let (sin, cos) = theta.sin_cos();
            rotate(&mut a, p, q, cos, sin);

            // The higher-variance direction survives. Expressing the same
            // rotation with swapped slots flips the sign of the sine.
            let (survivor, absorbed, cos, sin) = if a[[p, p]] >= a[[q, q]] {
                (p, q, cos, sin)
            } else {
                (q, p, cos, -sin)
            };

            rotations.push(RotationStep { i: survivor, j: absorbed, cos, sin });
            tree.push(MergeStep { survivor, absorbed });
            diagnostics.push(apq.abs().max(f64::MIN_POSITIVE).ln());
            active[absorbed] = false;
            root = survivor;

            debug!(
                "level {level}: merged slots ({p}, {q}), survivor {survivor}, |a_pq| = {:.3e}",
                apq.abs()
            );
        }

        TreeletModel::new(n, rotations, tree, root, diagnostics)
    }
}

/// Active pair with the largest absolute correlation
/// |a_ij| / sqrt(a_ii·a_jj), falling back to raw |a_ij| when a diagonal
/// entry is nonpositive.
fn select_pair(a: &Array2<f64>, active: &[bool]) -> (usize, usize) {
    let n = a.nrows();
    let mut best = (0, 1, f64::NEG_INFINITY);
    for p in 0..n {
        if !active[p] {
            continue;
        }
        for q in (p + 1)..n {
            if !active[q] {
                continue;
            }
            let denom = (a[[p, p]] * a[[q, q]]).max(0.0).sqrt();
            let score = if denom > f64::EPSILON {
                (a[[p, q]] / denom).abs()
            } else {
                a[[p, q]].abs()
            };
            if score > best.2 {
                best = (p, q, score);
            }
        }
    }
    (best.0, best.1)
}

/// Two-sided rotation G·A·Gᵗ touching rows and columns p and q.
fn rotate(a: &mut Array2<f64>, p: usize, q: usize, cos: f64, sin: f64) {
    let n = a.nrows();
    for k in 0..n {
        let apk = a[[p, k]];
        let aqk = a[[q, k]];
        a[[p, k]] = cos * apk - sin * aqk;
        a[[q, k]] = sin * apk + cos * aqk;
    }
    for k in 0..n {
        let akp = a[[k, p]];
        let akq = a[[k, q]];
        a[[k, p]] = cos * akp - sin * akq;
        a[[k, q]] = sin * akp + cos * akq;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_pair_similarity() -> Array2<f64> {
        // Two tight pairs (0,1) and (2,3), weakly coupled across.
        array![
            [4.0, 3.9, 0.2, 0.1],
            [3.9, 4.1, 0.1, 0.2],
            [0.2, 0.1, 3.8, 3.7],
            [0.1, 0.2, 3.7, 4.0],
        ]
    }

    #[test]
    fn test_builds_full_hierarchy() {
        let model = JacobiTreelets.build(&two_pair_similarity()).unwrap();
        assert_eq!(model.n(), 4);
        assert_eq!(model.rotations().len(), 3);
        assert_eq!(model.tree().len(), 3);
        assert_eq!(model.diagnostics().len(), 3);
    }

    #[test]
    fn test_rotations_are_orthogonal() {
        let model = JacobiTreelets.build(&two_pair_similarity()).unwrap();
        for step in model.rotations() {
            let norm = step.cos * step.cos + step.sin * step.sin;
            assert!((norm - 1.0).abs() < 1e-12, "cos²+sin² = {norm}");
        }
    }

    #[test]
    fn test_tight_pairs_merge_before_cross_links() {
        let model = JacobiTreelets.build(&two_pair_similarity()).unwrap();
        let first_two: Vec<(usize, usize)> = model.tree()[..2]
            .iter()
            .map(|m| {
                let (a, b) = (m.survivor.min(m.absorbed), m.survivor.max(m.absorbed));
                (a, b)
            })
            .collect();
        assert!(first_two.contains(&(0, 1)));
        assert!(first_two.contains(&(2, 3)));
    }

    #[test]
    fn test_root_is_last_survivor() {
        let model = JacobiTreelets.build(&two_pair_similarity()).unwrap();
        let last = model.tree().last().unwrap();
        assert_eq!(model.root(), last.survivor);
    }

    #[test]
    fn test_rejects_non_square_input() {
        let a = Array2::<f64>::zeros((3, 4));
        let err = JacobiTreelets.build(&a).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 3, found: 4 }));
    }

    #[test]
    fn test_single_sample() {
        let a = array![[2.0]];
        let model = JacobiTreelets.build(&a).unwrap();
        assert_eq!(model.n(), 1);
        assert_eq!(model.root(), 0);
        assert!(model.rotations().is_empty());
    }
}
