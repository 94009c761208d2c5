//! Treelet basis: merge tree, rotation sequence, and per-level diagnostics.
//!
//! Building the basis — choosing which two directions to merge at each step
//! and the rotation angle that merges them — is a separate concern behind
//! the [`TreeletBuilder`] trait. The rest of the crate only consumes the
//! returned [`TreeletModel`] and assumes nothing about how it was computed
//! beyond the counts and validity checked in [`TreeletModel::new`].
//!
//! Node identifiers follow the SciPy/kodama convention: leaves are
//! `0..n-1`, and the merge at step `i` creates internal node `n+i`, so a
//! full hierarchy over n samples spans `2n-1` ids with a single root.

mod jacobi;

pub use jacobi::JacobiTreelets;

use ndarray::Array2;

use crate::error::{Error, Result};

/// A single Givens-style rotation mixing exactly two directions.
///
/// Applied to a matrix `v` with n rows as:
/// `v[i]' = cos·v[i] − sin·v[j]`, `v[j]' = sin·v[i] + cos·v[j]`,
/// where `i` is the surviving (merged) slot and `j` the absorbed one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationStep {
    /// Surviving slot index.
    pub i: usize,
    /// Absorbed slot index.
    pub j: usize,
    /// Rotation cosine.
    pub cos: f64,
    /// Rotation sine.
    pub sin: f64,
}

/// One merge in the hierarchy, in slot-index space (both in `0..n`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeStep {
    /// Slot carrying the merged direction forward.
    pub survivor: usize,
    /// Slot retired by this merge; never referenced by a later merge.
    pub absorbed: usize,
}

/// Output of a treelet builder: everything the transform, decomposition,
/// and labeling stages need. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct TreeletModel {
    n: usize,
    rotations: Vec<RotationStep>,
    tree: Vec<MergeStep>,
    root: usize,
    diagnostics: Vec<f64>,
}

impl TreeletModel {
    /// Assemble and validate a model.
    ///
    /// `rotations`, `tree`, and `diagnostics` must each have exactly n−1
    /// aligned entries; every slot index must be below n; each slot may be
    /// absorbed at most once. Orthogonality of the rotations (cos²+sin²=1)
    /// is a precondition asserted in debug builds but not repaired.
    pub fn new(
        n: usize,
        rotations: Vec<RotationStep>,
        tree: Vec<MergeStep>,
        root: usize,
        diagnostics: Vec<f64>,
    ) -> Result<Self> {
        if n == 0 {
            return Err(Error::EmptyInput);
        }
        let merges = n - 1;
        for (name, len) in [
            ("rotations", rotations.len()),
            ("tree", tree.len()),
            ("diagnostics", diagnostics.len()),
        ] {
            if len != merges {
                return Err(Error::Other(format!(
                    "treelet builder returned {len} {name} entries for {n} samples, expected {merges}"
                )));
            }
        }
        if root >= n {
            return Err(Error::Other(format!("root slot {root} out of range for {n} samples")));
        }

        let mut absorbed_seen = vec![false; n];
        for (step, merge) in tree.iter().enumerate() {
            if merge.survivor >= n || merge.absorbed >= n || merge.survivor == merge.absorbed {
                return Err(Error::Other(format!(
                    "merge {step} references invalid slots ({}, {})",
                    merge.survivor, merge.absorbed
                )));
            }
            if absorbed_seen[merge.absorbed] || absorbed_seen[merge.survivor] {
                return Err(Error::Other(format!(
                    "merge {step} references an already-retired slot"
                )));
            }
            absorbed_seen[merge.absorbed] = true;
        }

        for step in &rotations {
            debug_assert!(
                (step.cos * step.cos + step.sin * step.sin - 1.0).abs() < 1e-9,
                "non-orthogonal rotation: cos={}, sin={}",
                step.cos,
                step.sin
            );
        }

        Ok(Self {
            n,
            rotations,
            tree,
            root,
            diagnostics,
        })
    }

    /// Number of samples the basis was built over.
    pub fn n(&self) -> usize {
        self.n
    }

    /// The n−1 rotation steps, finest merge first.
    pub fn rotations(&self) -> &[RotationStep] {
        &self.rotations
    }

    /// The n−1 merges, aligned with [`rotations`](Self::rotations).
    pub fn tree(&self) -> &[MergeStep] {
        &self.tree
    }

    /// Slot holding the last-surviving (coarsest) direction.
    pub fn root(&self) -> usize {
        self.root
    }

    /// Per-merge diagnostic values, monotonically related to merge cost.
    pub fn diagnostics(&self) -> &[f64] {
        &self.diagnostics
    }

    /// Derived children map over 2n−1 node ids.
    ///
    /// Entry `i` names the two nodes joined at merge `i`: a leaf id in
    /// `0..n` or an internal id `n+j` for the node created at merge `j`.
    pub fn children(&self) -> Vec<(usize, usize)> {
        let mut current: Vec<usize> = (0..self.n).collect();
        let mut children = Vec::with_capacity(self.tree.len());
        for (i, merge) in self.tree.iter().enumerate() {
            children.push((current[merge.survivor], current[merge.absorbed]));
            current[merge.survivor] = self.n + i;
        }
        children
    }
}

/// The external-collaborator contract: given a symmetric similarity matrix,
/// produce a full treelet hierarchy.
pub trait TreeletBuilder {
    /// Build the merge tree, rotation sequence, root, and diagnostics for
    /// an n×n similarity matrix.
    fn build(&self, similarity: &Array2<f64>) -> Result<TreeletModel>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(i: usize, j: usize) -> RotationStep {
        RotationStep { i, j, cos: 1.0, sin: 0.0 }
    }

    #[test]
    fn test_model_counts_validated() {
        let err = TreeletModel::new(3, vec![step(0, 1)], vec![], 0, vec![]).unwrap_err();
        assert!(matches!(err, Error::Other(_)));
    }

    #[test]
    fn test_absorbed_slot_never_reused() {
        let rotations = vec![step(0, 1), step(2, 1)];
        let tree = vec![
            MergeStep { survivor: 0, absorbed: 1 },
            MergeStep { survivor: 2, absorbed: 1 },
        ];
        let err = TreeletModel::new(3, rotations, tree, 2, vec![0.0, 0.0]).unwrap_err();
        assert!(matches!(err, Error::Other(_)));
    }

    #[test]
    fn test_children_map() {
        // 4 leaves: merge (0,1), then (2,3), then the two internal nodes.
        let rotations = vec![step(0, 1), step(2, 3), step(0, 2)];
        let tree = vec![
            MergeStep { survivor: 0, absorbed: 1 },
            MergeStep { survivor: 2, absorbed: 3 },
            MergeStep { survivor: 0, absorbed: 2 },
        ];
        let model = TreeletModel::new(4, rotations, tree, 0, vec![0.0; 3]).unwrap();

        let children = model.children();
        assert_eq!(children, vec![(0, 1), (2, 3), (4, 5)]);

        // 2n-1 node ids total; the last child id is the penultimate node,
        // with the root node (2n-2) created by the final merge.
        let max_id = children.iter().map(|&(a, b)| a.max(b)).max().unwrap();
        assert_eq!(max_id, 2 * model.n() - 3);
    }

    #[test]
    fn test_single_sample_model() {
        let model = TreeletModel::new(1, vec![], vec![], 0, vec![]).unwrap();
        assert_eq!(model.n(), 1);
        assert!(model.children().is_empty());
    }
}
